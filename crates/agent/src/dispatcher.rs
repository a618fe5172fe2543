use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use frontdesk_core::domain::contact::Contact;
use frontdesk_core::domain::conversation::{Conversation, ConversationId};
use frontdesk_core::domain::transcript::{TranscriptDirection, TranscriptEntry};
use frontdesk_db::repositories::{RepositoryError, TranscriptRepository};

#[derive(Debug, Error)]
pub enum SendError {
    #[error("message delivery failed: {0}")]
    Delivery(String),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Send(#[from] SendError),
    #[error("transcript persistence failed: {0}")]
    Transcript(#[from] RepositoryError),
}

/// Outbound delivery seam; the WhatsApp adapter provides the real one.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_text(&self, wa_id: &str, body: &str) -> Result<(), SendError>;
}

/// Fire-and-forget operator channel used on human handoff. Implementations
/// swallow and log their own failures; a missed notice never breaks a turn.
#[async_trait]
pub trait OperatorNotifier: Send + Sync {
    async fn notify_handoff(&self, conversation_id: &ConversationId, wa_id: &str, reason: &str);
}

#[derive(Default)]
pub struct LoggingOperatorNotifier;

#[async_trait]
impl OperatorNotifier for LoggingOperatorNotifier {
    async fn notify_handoff(&self, conversation_id: &ConversationId, wa_id: &str, reason: &str) {
        info!(
            event_name = "dispatch.handoff_notice",
            conversation_id = %conversation_id.0,
            wa_id,
            reason,
            "conversation handed off to a human attendant"
        );
    }
}

/// Captures outbound traffic for tests and the local simulator.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSender {
    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send_text(&self, wa_id: &str, body: &str) -> Result<(), SendError> {
        self.sent.lock().await.push((wa_id.to_owned(), body.to_owned()));
        Ok(())
    }
}

/// Delivers the single user-visible message of a turn and persists the
/// transcript. Forwards role output verbatim — it never originates claims
/// about operation outcomes.
pub struct ResponseDispatcher {
    sender: Arc<dyn MessageSender>,
    transcript: Arc<dyn TranscriptRepository>,
}

impl ResponseDispatcher {
    pub fn new(sender: Arc<dyn MessageSender>, transcript: Arc<dyn TranscriptRepository>) -> Self {
        Self { sender, transcript }
    }

    pub async fn dispatch(
        &self,
        conversation: &Conversation,
        contact: &Contact,
        body: &str,
    ) -> Result<(), DispatchError> {
        self.sender.send_text(&contact.wa_id, body).await?;
        self.record(conversation, TranscriptDirection::Outbound, body).await?;
        info!(
            event_name = "dispatch.message_sent",
            conversation_id = %conversation.id.0,
            turn = conversation.turn_seq,
            "outbound message delivered"
        );
        Ok(())
    }

    /// Persists a transcript line without delivering anything; used for the
    /// inbound message and the cross-role request/response pair.
    pub async fn record(
        &self,
        conversation: &Conversation,
        direction: TranscriptDirection,
        body: &str,
    ) -> Result<(), DispatchError> {
        self.transcript
            .append(&TranscriptEntry {
                id: format!("te-{}", Uuid::new_v4()),
                conversation_id: conversation.id.clone(),
                turn_seq: conversation.turn_seq,
                direction,
                body: body.to_owned(),
                recorded_at: Utc::now(),
            })
            .await?;
        Ok(())
    }
}
