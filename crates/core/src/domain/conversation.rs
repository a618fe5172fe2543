use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collection::CollectionForm;
use crate::domain::contact::ContactId;
use crate::intent::Intent;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

/// Single source of truth for whether any automated component may act.
///
/// The transition to `Human` is terminal for the core; only an operator
/// action (`ConversationRepository::reset_to_automated`) reverses it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Automated,
    Human,
    Closed,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Automated => "automated",
            Self::Human => "human",
            Self::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "automated" => Some(Self::Automated),
            "human" => Some(Self::Human),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub contact_id: ContactId,
    pub status: ConversationStatus,
    pub turn_seq: u32,
    pub last_intent: Option<Intent>,
    pub collection: Option<CollectionForm>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: ConversationId, contact_id: ContactId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            contact_id,
            status: ConversationStatus::Automated,
            turn_seq: 0,
            last_intent: None,
            collection: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Called once per inbound message before any component runs.
    pub fn begin_turn(&mut self, now: DateTime<Utc>) -> u32 {
        self.turn_seq += 1;
        self.updated_at = now;
        self.turn_seq
    }
}
