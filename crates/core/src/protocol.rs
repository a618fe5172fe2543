use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::appointment::AppointmentCategory;
use crate::domain::conversation::ConversationId;
use crate::errors::ProtocolError;
use crate::schedule::SlotWindow;

/// Wire tags for the Reception↔Agenda message pair. A message carrying
/// neither tag is not a cross-role message; a tagged message that fails to
/// parse is rejected, never interpreted loosely.
pub const REQUEST_TAG: &str = "[AGENDA_REQUEST]";
pub const RESPONSE_TAG: &str = "[AGENDA_RESPONSE]";

const KNOWN_OPERATIONS: [&str; 5] =
    ["list-slots", "find-next-weekday", "check-availability", "create", "cancel"];

/// Idempotency identity of a cross-role request: conversation id plus the
/// turn sequence that produced it. A retried mutation with a known key is
/// replayed, not re-executed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationKey(pub String);

impl CorrelationKey {
    pub fn derive(conversation_id: &ConversationId, turn_seq: u32) -> Self {
        Self(format!("{}#{turn_seq}", conversation_id.0))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "kebab-case")]
pub enum AgendaOperation {
    ListSlots,
    FindNextWeekday { weekday: String },
    CheckAvailability { date: NaiveDate },
    Create { subject: String, category: AppointmentCategory, date: NaiveDate, time: NaiveTime },
    Cancel { date: NaiveDate, time: NaiveTime },
}

impl AgendaOperation {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ListSlots => "list-slots",
            Self::FindNextWeekday { .. } => "find-next-weekday",
            Self::CheckAvailability { .. } => "check-availability",
            Self::Create { .. } => "create",
            Self::Cancel { .. } => "cancel",
        }
    }

    pub fn is_mutating(&self) -> bool {
        matches!(self, Self::Create { .. } | Self::Cancel { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgendaRequest {
    pub correlation: CorrelationKey,
    pub operation: AgendaOperation,
}

impl AgendaRequest {
    pub fn new(correlation: CorrelationKey, operation: AgendaOperation) -> Self {
        Self { correlation, operation }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        encode_tagged(REQUEST_TAG, self)
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let value = decode_tagged(REQUEST_TAG, text)?;
        let name = value
            .get("operation")
            .and_then(|operation| operation.get("name"))
            .and_then(|name| name.as_str())
            .ok_or_else(|| ProtocolError::MalformedPayload("operation name missing".to_owned()))?;
        if !KNOWN_OPERATIONS.contains(&name) {
            return Err(ProtocolError::UnknownOperation(name.to_owned()));
        }
        serde_json::from_value(value)
            .map_err(|error| ProtocolError::MalformedPayload(error.to_string()))
    }

    /// Content fingerprint of the operation payload, used to distinguish a
    /// retry of the same request from key reuse with different content.
    pub fn payload_fingerprint(&self) -> String {
        let payload = serde_json::to_string(&self.operation).unwrap_or_default();
        blake3::hash(payload.as_bytes()).to_hex().to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    pub title: String,
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AgendaResult {
    Events { events: Vec<EventSummary> },
    Dates { weekday: String, dates: Vec<NaiveDate> },
    Availability { date: NaiveDate, slots: Vec<SlotWindow> },
    Created {
        appointment_id: String,
        subject: String,
        category: AppointmentCategory,
        date: NaiveDate,
        time: NaiveTime,
    },
    Cancelled { date: NaiveDate, time: NaiveTime, calendar_removed: bool },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    Validation,
    BusinessRule,
    Conflict,
    NotFound,
    ExternalService,
    Protocol,
}

/// The literal outcome of executing an `AgendaRequest`. Constructed only by
/// the Agenda role, and only after the underlying operation actually ran.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AgendaOutcome {
    Fulfilled { result: AgendaResult },
    /// A replay of an already-fulfilled mutation; carries the original result.
    Duplicate { result: AgendaResult },
    Rejected { kind: RejectionKind, reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgendaResponse {
    pub correlation: CorrelationKey,
    pub outcome: AgendaOutcome,
}

impl AgendaResponse {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        encode_tagged(RESPONSE_TAG, self)
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let value = decode_tagged(RESPONSE_TAG, text)?;
        serde_json::from_value(value)
            .map_err(|error| ProtocolError::MalformedPayload(error.to_string()))
    }
}

/// Fulfilled mutation snapshot for replay detection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub correlation: CorrelationKey,
    pub conversation_id: ConversationId,
    pub operation_kind: String,
    pub payload_fingerprint: String,
    pub result_json: String,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

fn encode_tagged<T: Serialize>(tag: &str, message: &T) -> Result<String, ProtocolError> {
    let payload = serde_json::to_string(message)
        .map_err(|error| ProtocolError::MalformedPayload(error.to_string()))?;
    Ok(format!("{tag} {payload}"))
}

fn decode_tagged(tag: &str, text: &str) -> Result<serde_json::Value, ProtocolError> {
    let trimmed = text.trim();
    let payload = trimmed.strip_prefix(tag).ok_or(ProtocolError::MissingTag)?.trim();
    if payload.is_empty() {
        return Err(ProtocolError::EmptyPayload);
    }
    serde_json::from_str(payload).map_err(|error| ProtocolError::MalformedPayload(error.to_string()))
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::{
        AgendaOperation, AgendaOutcome, AgendaRequest, AgendaResponse, AgendaResult,
        CorrelationKey, RejectionKind, REQUEST_TAG,
    };
    use crate::domain::appointment::AppointmentCategory;
    use crate::domain::conversation::ConversationId;
    use crate::errors::ProtocolError;

    fn create_request() -> AgendaRequest {
        AgendaRequest::new(
            CorrelationKey::derive(&ConversationId("conv-9".to_owned()), 4),
            AgendaOperation::Create {
                subject: "Maria Souza".to_owned(),
                category: AppointmentCategory::Insurance,
                date: NaiveDate::from_ymd_opt(2026, 8, 11).expect("valid date"),
                time: NaiveTime::from_hms_opt(9, 30, 0).expect("valid time"),
            },
        )
    }

    #[test]
    fn correlation_key_is_conversation_and_turn() {
        let key = CorrelationKey::derive(&ConversationId("conv-9".to_owned()), 4);
        assert_eq!(key.0, "conv-9#4");
    }

    #[test]
    fn request_round_trips_through_the_wire_form() {
        let request = create_request();
        let encoded = request.encode().expect("encode");

        assert!(encoded.starts_with(REQUEST_TAG));
        assert_eq!(AgendaRequest::decode(&encoded).expect("decode"), request);
    }

    #[test]
    fn untagged_text_is_not_a_cross_role_message() {
        assert_eq!(
            AgendaRequest::decode("please book me for tomorrow"),
            Err(ProtocolError::MissingTag)
        );
    }

    #[test]
    fn tagged_message_without_payload_is_rejected() {
        assert_eq!(
            AgendaRequest::decode("[AGENDA_REQUEST]   "),
            Err(ProtocolError::EmptyPayload)
        );
    }

    #[test]
    fn garbled_payload_is_rejected_not_guessed() {
        let result = AgendaRequest::decode("[AGENDA_REQUEST] {not json");
        assert!(matches!(result, Err(ProtocolError::MalformedPayload(_))));
    }

    #[test]
    fn named_but_unknown_operation_is_rejected() {
        let result = AgendaRequest::decode(
            "[AGENDA_REQUEST] {\"correlation\":\"c#1\",\"operation\":{\"name\":\"reprice\"}}",
        );
        assert_eq!(result, Err(ProtocolError::UnknownOperation("reprice".to_owned())));
    }

    #[test]
    fn named_operation_with_incomplete_fields_is_rejected() {
        let result = AgendaRequest::decode(
            "[AGENDA_REQUEST] {\"correlation\":\"c#1\",\"operation\":{\"name\":\"create\",\"subject\":\"Maria\"}}",
        );
        assert!(matches!(result, Err(ProtocolError::MalformedPayload(_))));
    }

    #[test]
    fn fingerprint_is_stable_for_identical_payloads_and_differs_otherwise() {
        let first = create_request();
        let second = create_request();
        assert_eq!(first.payload_fingerprint(), second.payload_fingerprint());

        let other = AgendaRequest::new(
            first.correlation.clone(),
            AgendaOperation::Cancel {
                date: NaiveDate::from_ymd_opt(2026, 8, 11).expect("valid date"),
                time: NaiveTime::from_hms_opt(9, 30, 0).expect("valid time"),
            },
        );
        assert_ne!(first.payload_fingerprint(), other.payload_fingerprint());
    }

    #[test]
    fn response_round_trips_through_the_wire_form() {
        let response = AgendaResponse {
            correlation: CorrelationKey("conv-9#4".to_owned()),
            outcome: AgendaOutcome::Rejected {
                kind: RejectionKind::Conflict,
                reason: "slot taken".to_owned(),
            },
        };

        let encoded = response.encode().expect("encode");
        assert_eq!(AgendaResponse::decode(&encoded).expect("decode"), response);
    }

    #[test]
    fn duplicate_outcome_preserves_the_original_result() {
        let response = AgendaResponse {
            correlation: CorrelationKey("conv-9#4".to_owned()),
            outcome: AgendaOutcome::Duplicate {
                result: AgendaResult::Created {
                    appointment_id: "apt-1".to_owned(),
                    subject: "Maria Souza".to_owned(),
                    category: AppointmentCategory::SelfPay,
                    date: NaiveDate::from_ymd_opt(2026, 8, 12).expect("valid date"),
                    time: NaiveTime::from_hms_opt(10, 0, 0).expect("valid time"),
                },
            },
        };

        let decoded =
            AgendaResponse::decode(&response.encode().expect("encode")).expect("decode");
        assert_eq!(decoded, response);
    }

    #[test]
    fn mutating_classification_matches_the_operation_set() {
        assert!(create_request().operation.is_mutating());
        assert!(!AgendaOperation::ListSlots.is_mutating());
        assert!(!AgendaOperation::CheckAvailability {
            date: NaiveDate::from_ymd_opt(2026, 8, 11).expect("valid date")
        }
        .is_mutating());
    }
}
