use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::{info, warn};

use frontdesk_agent::dispatcher::{MessageSender, OperatorNotifier, SendError};
use frontdesk_core::config::WhatsAppConfig;
use frontdesk_core::domain::conversation::ConversationId;

const SEND_TIMEOUT_SECS: u64 = 10;

/// Outbound delivery through the Graph API `messages` endpoint. Also serves
/// as the operator notification channel when an operator number is
/// configured.
pub struct CloudApiSender {
    http: reqwest::Client,
    api_base_url: String,
    phone_number_id: String,
    access_token: SecretString,
    operator_wa_id: Option<String>,
}

impl CloudApiSender {
    pub fn from_config(config: &WhatsAppConfig) -> Result<Self, SendError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(SEND_TIMEOUT_SECS))
            .build()
            .map_err(|error| SendError::Delivery(error.to_string()))?;

        Ok(Self {
            http,
            api_base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            phone_number_id: config.phone_number_id.clone(),
            access_token: config.access_token.clone(),
            operator_wa_id: config.operator_wa_id.clone(),
        })
    }

    async fn post_text(&self, to: &str, body: &str) -> Result<(), SendError> {
        let url = format!("{}/{}/messages", self.api_base_url, self.phone_number_id);
        let response = self
            .http
            .post(url)
            .bearer_auth(self.access_token.expose_secret())
            .json(&json!({
                "messaging_product": "whatsapp",
                "recipient_type": "individual",
                "to": to,
                "type": "text",
                "text": {"body": body},
            }))
            .send()
            .await
            .map_err(|error| SendError::Delivery(error.to_string()))?;

        if !response.status().is_success() {
            return Err(SendError::Delivery(format!("status {}", response.status())));
        }

        info!(event_name = "whatsapp.message_sent", to, "outbound text delivered");
        Ok(())
    }
}

#[async_trait]
impl MessageSender for CloudApiSender {
    async fn send_text(&self, wa_id: &str, body: &str) -> Result<(), SendError> {
        self.post_text(wa_id, body).await
    }
}

#[async_trait]
impl OperatorNotifier for CloudApiSender {
    async fn notify_handoff(&self, conversation_id: &ConversationId, wa_id: &str, reason: &str) {
        let Some(operator) = &self.operator_wa_id else {
            info!(
                event_name = "whatsapp.handoff_unrouted",
                conversation_id = %conversation_id.0,
                reason,
                "no operator number configured; handoff recorded in logs only"
            );
            return;
        };

        let notice = format!(
            "Conversation {} (wa:{wa_id}) was handed off: {reason}",
            conversation_id.0
        );
        if let Err(error) = self.post_text(operator, &notice).await {
            // Fire-and-forget by contract: a missed notice never fails a turn.
            warn!(
                event_name = "whatsapp.handoff_notice_failed",
                conversation_id = %conversation_id.0,
                error = %error,
                "operator handoff notice could not be delivered"
            );
        }
    }
}
