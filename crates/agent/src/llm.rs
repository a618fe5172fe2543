use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;

use frontdesk_core::config::{LlmConfig, LlmProvider};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm request failed: {0}")]
    Request(String),
    #[error("llm returned an unusable response: {0}")]
    BadResponse(String),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// OpenAI-compatible chat-completions client. Works against OpenAI itself and
/// against local Ollama endpoints; temperature is pinned to zero so the
/// classification policy stays low-variance.
pub struct HttpCompletionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
}

impl HttpCompletionClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let base_url = match (&config.base_url, config.provider) {
            (Some(url), _) => url.trim_end_matches('/').to_owned(),
            (None, LlmProvider::Ollama) => "http://localhost:11434/v1".to_owned(),
            (None, _) => "https://api.openai.com/v1".to_owned(),
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|error| LlmError::Request(error.to_string()))?;

        Ok(Self { http, base_url, api_key: config.api_key.clone(), model: config.model.clone() })
    }
}

#[async_trait]
impl LlmClient for HttpCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let mut request = self.http.post(format!("{}/chat/completions", self.base_url)).json(&json!({
            "model": self.model,
            "temperature": 0,
            "messages": [{"role": "user", "content": prompt}],
        }));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response =
            request.send().await.map_err(|error| LlmError::Request(error.to_string()))?;
        if !response.status().is_success() {
            return Err(LlmError::Request(format!("status {}", response.status())));
        }

        let body: serde_json::Value =
            response.json().await.map_err(|error| LlmError::BadResponse(error.to_string()))?;
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(|content| content.to_owned())
            .ok_or_else(|| LlmError::BadResponse("missing choices[0].message.content".to_owned()))
    }
}

/// Keyword matcher standing in for a model. Used by the `offline` provider
/// (local simulator, deployments without an LLM endpoint) and as the bottom
/// rung of the fail-safe ladder: it only ever answers with a known label.
#[derive(Default)]
pub struct OfflineIntentClient;

impl OfflineIntentClient {
    fn label_for(utterance: &str) -> &'static str {
        let normalized = utterance.to_ascii_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|needle| normalized.contains(needle));

        if has(&["human", "attendant", "real person", "someone real", "operator"]) {
            "HUMAN"
        } else if has(&["resched", "move my", "change my appointment", "another day"]) {
            "RESCHEDULE"
        } else if has(&["cancel"]) {
            "CANCEL"
        } else if has(&["available", "availability", "free slots", "open slots", "which days", "what times"]) {
            "QUERY"
        } else if has(&["book", "schedule", "appointment", "consultation"]) {
            "CREATE"
        } else {
            "OTHER"
        }
    }
}

#[async_trait]
impl LlmClient for OfflineIntentClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        // The classifier prompt ends with the current utterance on its own
        // block; classify from that tail.
        let utterance = prompt.rsplit("User message:").next().unwrap_or(prompt);
        Ok(Self::label_for(utterance).to_owned())
    }
}

/// Replays scripted responses; fails once the script runs out.
#[derive(Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<Result<String, String>>>,
}

impl ScriptedLlmClient {
    pub fn with_replies(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(
                replies.into_iter().map(|reply| Ok(reply.to_owned())).collect(),
            ),
        }
    }

    pub fn with_script(replies: Vec<Result<String, String>>) -> Self {
        Self { replies: Mutex::new(replies.into()) }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        let mut replies = self.replies.lock().await;
        match replies.pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(error)) => Err(LlmError::Request(error)),
            None => Err(LlmError::Request("script exhausted".to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LlmClient, OfflineIntentClient, ScriptedLlmClient};

    #[tokio::test]
    async fn offline_client_maps_common_phrasings_to_labels() {
        let client = OfflineIntentClient;
        let cases = [
            ("I'd like to book a consultation", "CREATE"),
            ("can I schedule an appointment for tuesday?", "CREATE"),
            ("what times are available next week?", "QUERY"),
            ("please cancel my appointment", "CANCEL"),
            ("I need to reschedule", "RESCHEDULE"),
            ("let me talk to a human", "HUMAN"),
            ("thanks, that is all", "OTHER"),
        ];

        for (utterance, expected) in cases {
            let reply = client
                .complete(&format!("...context...\n\nUser message:\n{utterance}"))
                .await
                .expect("offline client never fails");
            assert_eq!(reply, expected, "utterance: {utterance}");
        }
    }

    #[tokio::test]
    async fn scripted_client_replays_then_exhausts() {
        let client = ScriptedLlmClient::with_replies(vec!["CREATE"]);
        assert_eq!(client.complete("x").await.expect("first reply"), "CREATE");
        assert!(client.complete("x").await.is_err());
    }
}
