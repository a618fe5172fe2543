use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use thiserror::Error;

use crate::schedule::weekday_name;

fn weekday_label(weekday: &Weekday) -> &'static str {
    weekday_name(*weekday)
}

fn date_weekday_label(date: &NaiveDate) -> &'static str {
    weekday_name(date.weekday())
}

/// Malformed or incomplete request fields, rejected before any operation runs.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("required field `{0}` is missing")]
    MissingField(&'static str),
    #[error("field `{field}` is malformed: {reason}")]
    Malformed { field: &'static str, reason: String },
}

/// Clinic policy violations, rejected before any mutation is attempted.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BusinessRuleViolation {
    #[error("insurance consultations run on Tuesdays and Thursdays only, not {}", weekday_label(.requested))]
    InsuranceWeekday { requested: Weekday },
    #[error("{date} is not in the future")]
    NotFutureDate { date: NaiveDate },
    #[error("{date} falls on a {}, and the clinic is closed on weekends", date_weekday_label(.date))]
    NotBusinessDay { date: NaiveDate },
    #[error("{time} is not a bookable half-hour slot within business hours (09:00-12:00, 13:00-17:00)")]
    OutsideBusinessHours { time: NaiveTime },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConflictError {
    #[error("the {time} slot on {date} is already booked")]
    SlotTaken { date: NaiveDate, time: NaiveTime },
    #[error("this request was already fulfilled (correlation key `{key}`)")]
    DuplicateRequest { key: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExternalServiceError {
    #[error("{service} is unavailable: {detail}")]
    Unavailable { service: &'static str, detail: String },
    #[error("{service} timed out after {secs}s")]
    Timeout { service: &'static str, secs: u64 },
}

/// A cross-role message that is not well-formed. Fatal to the turn: no
/// partial state is committed and the condition is recorded for operator
/// review. No component may fabricate a response to paper over one of these.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("message does not carry a cross-role tag")]
    MissingTag,
    #[error("tagged message has an empty payload")]
    EmptyPayload,
    #[error("tagged payload is malformed: {0}")]
    MalformedPayload(String),
    #[error("unknown agenda operation `{0}`")]
    UnknownOperation(String),
}

/// Umbrella error for the Agenda role. `user_message` is the single place
/// that turns a typed failure into user-facing wording: recoverable
/// rejections stay specific so the conversation can continue with corrected
/// input, while infrastructure failures get the generic apology.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AgendaError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    BusinessRule(#[from] BusinessRuleViolation),
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    #[error("no appointment found on {date} at {time}")]
    NotFound { date: NaiveDate, time: NaiveTime },
    #[error(transparent)]
    External(#[from] ExternalServiceError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl AgendaError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(error) => {
                format!("I could not process that request: {error}.")
            }
            Self::BusinessRule(violation) => format!("I cannot book that: {violation}."),
            Self::Conflict(ConflictError::SlotTaken { date, time }) => format!(
                "The {time} slot on {date} is already taken. Would another time work for you?"
            ),
            Self::Conflict(ConflictError::DuplicateRequest { .. }) => {
                "That request was already handled; I have not booked it twice.".to_owned()
            }
            Self::NotFound { date, time } => {
                format!("I could not find an appointment on {date} at {time} under your contact.")
            }
            Self::External(_) | Self::Protocol(_) => {
                "Sorry, something went wrong on our side and I could not complete that. \
                 Would you like me to transfer you to a human attendant?"
                    .to_owned()
            }
        }
    }

    /// Recoverable errors keep the collection flow alive; the rest end the
    /// fulfillment attempt for this turn.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::BusinessRule(_) | Self::Conflict(_) | Self::NotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime, Weekday};

    use super::{
        AgendaError, BusinessRuleViolation, ConflictError, ExternalServiceError, ProtocolError,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn business_rule_messages_name_the_specific_violation() {
        let error =
            AgendaError::from(BusinessRuleViolation::InsuranceWeekday { requested: Weekday::Mon });
        let message = error.user_message();

        assert!(message.contains("Tuesdays and Thursdays"));
        assert!(message.contains("Monday"));
    }

    #[test]
    fn slot_conflicts_invite_a_corrected_time() {
        let error = AgendaError::from(ConflictError::SlotTaken {
            date: date(2026, 8, 11),
            time: NaiveTime::from_hms_opt(9, 0, 0).expect("valid time"),
        });

        assert!(error.user_message().contains("already taken"));
        assert!(error.is_recoverable());
    }

    #[test]
    fn infrastructure_failures_get_the_generic_apology() {
        let external = AgendaError::from(ExternalServiceError::Timeout {
            service: "calendar backend",
            secs: 10,
        });
        let protocol = AgendaError::from(ProtocolError::EmptyPayload);

        for error in [external, protocol] {
            assert!(error.user_message().contains("human attendant"));
            assert!(!error.is_recoverable());
        }
    }
}
