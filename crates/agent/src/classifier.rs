use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use frontdesk_core::domain::transcript::{TranscriptDirection, TranscriptEntry};
use frontdesk_core::intent::Intent;

use crate::llm::LlmClient;

const CLASSIFICATION_INSTRUCTIONS: &str = "\
Classify the user's intent as exactly one of these labels:

CREATE - the user wants to book a new appointment
QUERY - the user wants to see availability or upcoming events
CANCEL - the user wants to cancel an appointment
RESCHEDULE - the user wants to move an existing appointment
HUMAN - the user asks for a human attendant
OTHER - anything else

Reply with exactly one label, nothing else.";

/// Adapter over the LLM seam. Deterministic by policy: zero temperature on
/// the model side, bounded timeout on this side, and every failure mode
/// (error, timeout, off-label reply) degrades to `Other`.
pub struct IntentClassifier {
    client: Arc<dyn LlmClient>,
    history_window: u32,
    timeout_secs: u64,
}

impl IntentClassifier {
    pub fn new(client: Arc<dyn LlmClient>, history_window: u32, timeout_secs: u64) -> Self {
        Self { client, history_window, timeout_secs }
    }

    pub async fn classify(&self, history: &[TranscriptEntry], utterance: &str) -> Intent {
        let prompt = self.prompt(history, utterance);
        let request = self.client.complete(&prompt);

        match tokio::time::timeout(Duration::from_secs(self.timeout_secs.max(1)), request).await {
            Ok(Ok(reply)) => Intent::parse_label(&reply),
            Ok(Err(error)) => {
                warn!(
                    event_name = "classification.llm_error",
                    error = %error,
                    "intent classification failed; defaulting to OTHER"
                );
                Intent::Other
            }
            Err(_) => {
                warn!(
                    event_name = "classification.timeout",
                    timeout_secs = self.timeout_secs,
                    "intent classification timed out; defaulting to OTHER"
                );
                Intent::Other
            }
        }
    }

    fn prompt(&self, history: &[TranscriptEntry], utterance: &str) -> String {
        let mut prompt = String::from(CLASSIFICATION_INSTRUCTIONS);

        let window = history
            .iter()
            .filter(|entry| {
                matches!(
                    entry.direction,
                    TranscriptDirection::Inbound | TranscriptDirection::Outbound
                )
            })
            .collect::<Vec<_>>();
        let skip = window.len().saturating_sub(self.history_window as usize);
        let window = &window[skip..];

        if !window.is_empty() {
            prompt.push_str("\n\nRecent conversation:\n");
            for entry in window {
                let speaker = match entry.direction {
                    TranscriptDirection::Inbound => "User",
                    _ => "Assistant",
                };
                let _ = writeln!(prompt, "{speaker}: {}", entry.body);
            }
        }

        let _ = write!(prompt, "\nUser message:\n{utterance}");
        prompt
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Utc;

    use frontdesk_core::domain::conversation::ConversationId;
    use frontdesk_core::domain::transcript::{TranscriptDirection, TranscriptEntry};
    use frontdesk_core::intent::Intent;

    use super::IntentClassifier;
    use crate::llm::{LlmClient, LlmError, ScriptedLlmClient};

    fn entry(direction: TranscriptDirection, body: &str) -> TranscriptEntry {
        TranscriptEntry {
            id: format!("te-{body}"),
            conversation_id: ConversationId("conv-1".to_owned()),
            turn_seq: 1,
            direction,
            body: body.to_owned(),
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn model_labels_map_to_intents() {
        let classifier =
            IntentClassifier::new(Arc::new(ScriptedLlmClient::with_replies(vec!["CANCEL"])), 6, 5);
        assert_eq!(classifier.classify(&[], "please cancel it").await, Intent::Cancel);
    }

    #[tokio::test]
    async fn off_label_replies_degrade_to_other() {
        let classifier = IntentClassifier::new(
            Arc::new(ScriptedLlmClient::with_replies(vec!["I think the user wants to book"])),
            6,
            5,
        );
        assert_eq!(classifier.classify(&[], "hm").await, Intent::Other);
    }

    #[tokio::test]
    async fn llm_errors_degrade_to_other() {
        let classifier = IntentClassifier::new(
            Arc::new(ScriptedLlmClient::with_script(vec![Err("boom".to_owned())])),
            6,
            5,
        );
        assert_eq!(classifier.classify(&[], "hm").await, Intent::Other);
    }

    #[tokio::test]
    async fn a_hung_model_call_degrades_to_other() {
        struct HungClient;

        #[async_trait]
        impl LlmClient for HungClient {
            async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
                std::future::pending().await
            }
        }

        let classifier = IntentClassifier::new(Arc::new(HungClient), 6, 1);
        assert_eq!(classifier.classify(&[], "hm").await, Intent::Other);
    }

    #[tokio::test]
    async fn prompt_carries_only_the_configured_history_window() {
        let classifier =
            IntentClassifier::new(Arc::new(ScriptedLlmClient::with_replies(vec!["OTHER"])), 2, 5);

        let history = vec![
            entry(TranscriptDirection::Inbound, "oldest line"),
            entry(TranscriptDirection::AgendaRequest, "[AGENDA_REQUEST] {...}"),
            entry(TranscriptDirection::Outbound, "assistant reply"),
            entry(TranscriptDirection::Inbound, "newest line"),
        ];

        let prompt = classifier.prompt(&history, "current");
        assert!(prompt.contains("assistant reply"));
        assert!(prompt.contains("newest line"));
        assert!(!prompt.contains("oldest line"), "older lines fall out of the window");
        assert!(!prompt.contains("AGENDA_REQUEST"), "cross-role traffic never reaches the model");
    }
}
