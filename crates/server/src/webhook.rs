use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Router,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{info, warn};

use frontdesk_agent::TurnRuntime;
use frontdesk_whatsapp::{handshake, parse_webhook, verify_signature, InboundEvent};

#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<TurnRuntime>,
    pub verify_token: String,
    pub app_secret: SecretString,
}

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: String,
    #[serde(rename = "hub.verify_token")]
    verify_token: String,
    #[serde(rename = "hub.challenge")]
    challenge: String,
}

pub fn router(state: AppState) -> Router {
    Router::new().route("/webhook", get(verify).post(receive)).with_state(state)
}

/// Subscribe handshake: echo the challenge for a matching verify token.
pub async fn verify(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> (StatusCode, String) {
    match handshake(&state.verify_token, &params.mode, &params.verify_token, &params.challenge) {
        Ok(challenge) => (StatusCode::OK, challenge),
        Err(error) => {
            warn!(
                event_name = "ingress.webhook_verification_failed",
                error = %error,
                "webhook verification handshake failed"
            );
            (StatusCode::FORBIDDEN, "verification failed".to_owned())
        }
    }
}

/// Signed event ingress. Each text message runs one full turn; everything
/// else is acknowledged and logged.
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, &'static str) {
    let Some(signature) =
        headers.get("x-hub-signature-256").and_then(|value| value.to_str().ok())
    else {
        warn!(event_name = "ingress.signature_missing", "webhook call without signature header");
        return (StatusCode::UNAUTHORIZED, "missing signature");
    };

    if let Err(error) =
        verify_signature(state.app_secret.expose_secret(), body.as_bytes(), signature)
    {
        warn!(
            event_name = "ingress.signature_rejected",
            error = %error,
            "webhook signature rejected"
        );
        return (StatusCode::UNAUTHORIZED, "bad signature");
    }

    let events = match parse_webhook(&body) {
        Ok(events) => events,
        Err(error) => {
            warn!(
                event_name = "ingress.payload_rejected",
                error = %error,
                "webhook payload rejected"
            );
            return (StatusCode::BAD_REQUEST, "malformed payload");
        }
    };

    for event in events {
        match event {
            InboundEvent::Text(message) => {
                info!(
                    event_name = "ingress.message_received",
                    wa_id = %message.wa_id,
                    message_id = %message.message_id,
                    "inbound text message received"
                );
                if let Err(error) =
                    state.runtime.handle_message(&message.wa_id, &message.text).await
                {
                    warn!(
                        event_name = "ingress.turn_failed",
                        wa_id = %message.wa_id,
                        error = %error,
                        "turn processing failed"
                    );
                }
            }
            InboundEvent::Status { message_id, status } => {
                info!(
                    event_name = "ingress.delivery_status",
                    message_id = %message_id,
                    status = %status,
                    "delivery status received"
                );
            }
            InboundEvent::Unsupported { kind } => {
                info!(
                    event_name = "ingress.unsupported_event",
                    kind = %kind,
                    "unsupported webhook event ignored"
                );
            }
        }
    }

    (StatusCode::OK, "EVENT_RECEIVED")
}
