use serde::{Deserialize, Serialize};

/// Fixed intent taxonomy for a turn.
///
/// Classification is fail-safe: anything the classifier cannot place with
/// certainty lands on `Other`, which routes to the free-conversation
/// fallback rather than a riskier category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Create,
    Query,
    Cancel,
    Reschedule,
    Human,
    Other,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Query => "query",
            Self::Cancel => "cancel",
            Self::Reschedule => "reschedule",
            Self::Human => "human",
            Self::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "create" => Some(Self::Create),
            "query" => Some(Self::Query),
            "cancel" => Some(Self::Cancel),
            "reschedule" => Some(Self::Reschedule),
            "human" => Some(Self::Human),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    /// Maps a raw classifier reply to an intent. The classifier is asked for
    /// exactly one uppercase label; anything else degrades to `Other`.
    pub fn parse_label(reply: &str) -> Self {
        match reply.trim().to_ascii_uppercase().as_str() {
            "CREATE" => Self::Create,
            "QUERY" => Self::Query,
            "CANCEL" => Self::Cancel,
            "RESCHEDULE" => Self::Reschedule,
            "HUMAN" => Self::Human,
            "OTHER" => Self::Other,
            _ => Self::Other,
        }
    }

    pub fn is_mutating(&self) -> bool {
        matches!(self, Self::Create | Self::Cancel | Self::Reschedule)
    }
}

#[cfg(test)]
mod tests {
    use super::Intent;

    #[test]
    fn intent_round_trips_from_storage_encoding() {
        for intent in [
            Intent::Create,
            Intent::Query,
            Intent::Cancel,
            Intent::Reschedule,
            Intent::Human,
            Intent::Other,
        ] {
            assert_eq!(Intent::parse(intent.as_str()), Some(intent));
        }
    }

    #[test]
    fn label_parsing_accepts_surrounding_noise() {
        assert_eq!(Intent::parse_label("  CREATE \n"), Intent::Create);
        assert_eq!(Intent::parse_label("cancel"), Intent::Cancel);
    }

    #[test]
    fn unrecognized_label_degrades_to_other() {
        assert_eq!(Intent::parse_label("BOOK ME IN"), Intent::Other);
        assert_eq!(Intent::parse_label(""), Intent::Other);
        assert_eq!(Intent::parse_label("DELETE"), Intent::Other);
    }

    #[test]
    fn mutating_intents_are_exactly_the_calendar_writers() {
        assert!(Intent::Create.is_mutating());
        assert!(Intent::Cancel.is_mutating());
        assert!(Intent::Reschedule.is_mutating());
        assert!(!Intent::Query.is_mutating());
        assert!(!Intent::Human.is_mutating());
        assert!(!Intent::Other.is_mutating());
    }
}
