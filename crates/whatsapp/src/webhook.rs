use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("webhook payload is malformed: {0}")]
    MalformedPayload(String),
    #[error("signature header is missing")]
    MissingSignature,
    #[error("signature header is malformed")]
    MalformedSignature,
    #[error("signature does not match the payload")]
    SignatureMismatch,
    #[error("verification handshake failed")]
    VerificationFailed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextMessage {
    pub wa_id: String,
    pub message_id: String,
    pub text: String,
    pub profile_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    Text(TextMessage),
    /// Delivery receipts and read markers; logged, never processed.
    Status { message_id: String, status: String },
    Unsupported { kind: String },
}

/// GET-side subscribe handshake: echo the challenge only for a matching
/// verify token.
pub fn handshake(
    expected_token: &str,
    mode: &str,
    token: &str,
    challenge: &str,
) -> Result<String, WebhookError> {
    if mode == "subscribe" && !expected_token.is_empty() && token == expected_token {
        Ok(challenge.to_owned())
    } else {
        Err(WebhookError::VerificationFailed)
    }
}

/// Verifies `X-Hub-Signature-256: sha256=<hex>` over the raw body.
pub fn verify_signature(
    app_secret: &str,
    body: &[u8],
    signature_header: &str,
) -> Result<(), WebhookError> {
    let hex_digest = signature_header
        .strip_prefix("sha256=")
        .ok_or(WebhookError::MalformedSignature)?;
    let expected = decode_hex(hex_digest).ok_or(WebhookError::MalformedSignature)?;

    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes())
        .map_err(|_| WebhookError::MalformedSignature)?;
    mac.update(body);
    mac.verify_slice(&expected).map_err(|_| WebhookError::SignatureMismatch)
}

/// Normalizes a Cloud API webhook body into typed inbound events. Anything
/// the core does not handle surfaces as `Unsupported` so ingress logging
/// stays complete.
pub fn parse_webhook(body: &str) -> Result<Vec<InboundEvent>, WebhookError> {
    let payload: Value = serde_json::from_str(body)
        .map_err(|error| WebhookError::MalformedPayload(error.to_string()))?;

    if payload["object"] != "whatsapp_business_account" {
        return Err(WebhookError::MalformedPayload(format!(
            "unexpected object `{}`",
            payload["object"]
        )));
    }

    let empty = Vec::new();
    let mut events = Vec::new();
    for entry in payload["entry"].as_array().unwrap_or(&empty) {
        for change in entry["changes"].as_array().unwrap_or(&empty) {
            let value = &change["value"];
            let profile_name = value["contacts"][0]["profile"]["name"]
                .as_str()
                .map(|name| name.to_owned());

            for message in value["messages"].as_array().unwrap_or(&empty) {
                events.push(parse_message(message, profile_name.clone()));
            }
            for status in value["statuses"].as_array().unwrap_or(&empty) {
                events.push(InboundEvent::Status {
                    message_id: status["id"].as_str().unwrap_or_default().to_owned(),
                    status: status["status"].as_str().unwrap_or_default().to_owned(),
                });
            }
        }
    }

    Ok(events)
}

fn parse_message(message: &Value, profile_name: Option<String>) -> InboundEvent {
    let kind = message["type"].as_str().unwrap_or("unknown");
    if kind != "text" {
        return InboundEvent::Unsupported { kind: kind.to_owned() };
    }

    let (Some(wa_id), Some(message_id), Some(text)) = (
        message["from"].as_str(),
        message["id"].as_str(),
        message["text"]["body"].as_str(),
    ) else {
        return InboundEvent::Unsupported { kind: "text-without-body".to_owned() };
    };

    InboundEvent::Text(TextMessage {
        wa_id: wa_id.to_owned(),
        message_id: message_id.to_owned(),
        text: text.to_owned(),
        profile_name,
    })
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|index| u8::from_str_radix(&hex[index..index + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    use super::{handshake, parse_webhook, verify_signature, InboundEvent, WebhookError};

    const MESSAGE_FIXTURE: &str = r#"{
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "100000000000000",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "contacts": [{"profile": {"name": "Maria Souza"}, "wa_id": "5511999990000"}],
                    "messages": [{
                        "from": "5511999990000",
                        "id": "wamid.abc123",
                        "timestamp": "1754400000",
                        "type": "text",
                        "text": {"body": "I'd like to book an appointment"}
                    }]
                }
            }]
        }]
    }"#;

    #[test]
    fn text_messages_parse_into_typed_events() {
        let events = parse_webhook(MESSAGE_FIXTURE).expect("parse");
        assert_eq!(events.len(), 1);
        match &events[0] {
            InboundEvent::Text(message) => {
                assert_eq!(message.wa_id, "5511999990000");
                assert_eq!(message.message_id, "wamid.abc123");
                assert_eq!(message.text, "I'd like to book an appointment");
                assert_eq!(message.profile_name.as_deref(), Some("Maria Souza"));
            }
            other => panic!("expected a text event, got {other:?}"),
        }
    }

    #[test]
    fn statuses_and_unsupported_types_are_surfaced_not_dropped() {
        let body = r#"{
            "object": "whatsapp_business_account",
            "entry": [{"changes": [{"value": {
                "messages": [{"from": "5511", "id": "wamid.audio", "type": "audio"}],
                "statuses": [{"id": "wamid.abc123", "status": "delivered"}]
            }}]}]
        }"#;

        let events = parse_webhook(body).expect("parse");
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], InboundEvent::Unsupported { kind } if kind == "audio"));
        assert!(matches!(&events[1], InboundEvent::Status { status, .. } if status == "delivered"));
    }

    #[test]
    fn foreign_payloads_are_rejected() {
        let result = parse_webhook(r#"{"object": "page", "entry": []}"#);
        assert!(matches!(result, Err(WebhookError::MalformedPayload(_))));
    }

    #[test]
    fn signature_verification_round_trips() {
        let secret = "app-secret";
        let body = MESSAGE_FIXTURE.as_bytes();

        let mut mac =
            Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("hmac accepts any key size");
        mac.update(body);
        let header = format!("sha256={}", hex_encode(&mac.finalize().into_bytes()));

        assert_eq!(verify_signature(secret, body, &header), Ok(()));
        assert_eq!(
            verify_signature("wrong-secret", body, &header),
            Err(WebhookError::SignatureMismatch)
        );
        assert_eq!(
            verify_signature(secret, body, "sha256=zz"),
            Err(WebhookError::MalformedSignature)
        );
        assert_eq!(
            verify_signature(secret, body, "nonsense"),
            Err(WebhookError::MalformedSignature)
        );
    }

    #[test]
    fn handshake_echoes_the_challenge_only_for_the_right_token() {
        assert_eq!(
            handshake("hook-token", "subscribe", "hook-token", "challenge-42"),
            Ok("challenge-42".to_owned())
        );
        assert_eq!(
            handshake("hook-token", "subscribe", "other", "challenge-42"),
            Err(WebhookError::VerificationFailed)
        );
        assert_eq!(
            handshake("hook-token", "unsubscribe", "hook-token", "challenge-42"),
            Err(WebhookError::VerificationFailed)
        );
        assert_eq!(
            handshake("", "subscribe", "", "challenge-42"),
            Err(WebhookError::VerificationFailed),
            "an unset verify token never verifies"
        );
    }

    fn hex_encode(bytes: &[u8]) -> String {
        bytes.iter().map(|byte| format!("{byte:02x}")).collect()
    }
}
