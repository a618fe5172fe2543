use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::conversation::ConversationId;

/// Direction of a transcript line within a turn.
///
/// The cross-role pair is persisted alongside user-visible traffic so the
/// invariant "an agenda response exists iff the executor ran" is checkable
/// against the stored transcript.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptDirection {
    Inbound,
    Outbound,
    AgendaRequest,
    AgendaResponse,
}

impl TranscriptDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
            Self::AgendaRequest => "agenda_request",
            Self::AgendaResponse => "agenda_response",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "inbound" => Some(Self::Inbound),
            "outbound" => Some(Self::Outbound),
            "agenda_request" => Some(Self::AgendaRequest),
            "agenda_response" => Some(Self::AgendaResponse),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub id: String,
    pub conversation_id: ConversationId,
    pub turn_seq: u32,
    pub direction: TranscriptDirection,
    pub body: String,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::TranscriptDirection;

    #[test]
    fn direction_round_trips_from_storage_encoding() {
        for direction in [
            TranscriptDirection::Inbound,
            TranscriptDirection::Outbound,
            TranscriptDirection::AgendaRequest,
            TranscriptDirection::AgendaResponse,
        ] {
            assert_eq!(TranscriptDirection::parse(direction.as_str()), Some(direction));
        }
    }
}
