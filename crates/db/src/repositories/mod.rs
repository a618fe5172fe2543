use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

use frontdesk_core::domain::appointment::{Appointment, AppointmentId};
use frontdesk_core::domain::contact::{Contact, ContactId};
use frontdesk_core::domain::conversation::{Conversation, ConversationId};
use frontdesk_core::domain::transcript::TranscriptEntry;
use frontdesk_core::protocol::{CorrelationKey, IdempotencyRecord};

pub mod appointment;
pub mod contact;
pub mod conversation;
pub mod idempotency;
pub mod memory;
pub mod transcript;

pub use appointment::SqlAppointmentRepository;
pub use contact::SqlContactRepository;
pub use conversation::SqlConversationRepository;
pub use idempotency::SqlIdempotencyRepository;
pub use memory::{
    InMemoryAppointmentRepository, InMemoryContactRepository, InMemoryConversationRepository,
    InMemoryIdempotencyRepository, InMemoryTranscriptRepository,
};
pub use transcript::SqlTranscriptRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn find_by_id(&self, id: &ConversationId)
        -> Result<Option<Conversation>, RepositoryError>;
    async fn find_by_contact(
        &self,
        contact_id: &ContactId,
    ) -> Result<Option<Conversation>, RepositoryError>;
    async fn save(&self, conversation: &Conversation) -> Result<(), RepositoryError>;
    /// Operator-triggered reset path for the terminal `human` status. The
    /// turn runtime never calls this.
    async fn reset_to_automated(&self, id: &ConversationId) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ContactRepository: Send + Sync {
    async fn find_by_wa_id(&self, wa_id: &str) -> Result<Option<Contact>, RepositoryError>;
    async fn save(&self, contact: &Contact) -> Result<(), RepositoryError>;
    async fn update_display_name(
        &self,
        id: &ContactId,
        display_name: &str,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    /// Ordered by date then time.
    async fn find_by_contact(
        &self,
        contact_id: &ContactId,
    ) -> Result<Vec<Appointment>, RepositoryError>;
    async fn find_by_slot(
        &self,
        contact_id: &ContactId,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Option<Appointment>, RepositoryError>;
    async fn save(&self, appointment: &Appointment) -> Result<(), RepositoryError>;
    async fn delete(&self, id: &AppointmentId) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait IdempotencyRepository: Send + Sync {
    async fn find(
        &self,
        key: &CorrelationKey,
    ) -> Result<Option<IdempotencyRecord>, RepositoryError>;
    /// Insert, or bump `last_seen_at` when the key already exists.
    async fn record(&self, record: &IdempotencyRecord) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait TranscriptRepository: Send + Sync {
    async fn append(&self, entry: &TranscriptEntry) -> Result<(), RepositoryError>;
    /// Last `limit` entries in chronological order.
    async fn recent(
        &self,
        conversation_id: &ConversationId,
        limit: u32,
    ) -> Result<Vec<TranscriptEntry>, RepositoryError>;
}
