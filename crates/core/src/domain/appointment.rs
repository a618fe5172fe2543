use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::contact::ContactId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppointmentId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentCategory {
    SelfPay,
    Insurance,
}

impl AppointmentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelfPay => "self_pay",
            Self::Insurance => "insurance",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "self_pay" => Some(Self::SelfPay),
            "insurance" => Some(Self::Insurance),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::SelfPay => "self-pay",
            Self::Insurance => "insurance",
        }
    }
}

/// A booked consultation slot. Created and cancelled only by the Agenda role.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub contact_id: ContactId,
    pub subject_name: String,
    pub category: AppointmentCategory,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub calendar_event_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
