use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContactId(pub String);

/// A patient identity on the chat channel. Owned by the channel side; the
/// Reception role may update the display name, the Agenda role only reads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub wa_id: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    pub fn new(id: ContactId, wa_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self { id, wa_id: wa_id.into(), display_name: None, created_at: now, updated_at: now }
    }
}
