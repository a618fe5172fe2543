//! WhatsApp Cloud API adapter
//!
//! This crate is the chat-channel edge of frontdesk:
//! - **Webhook** (`webhook`) - envelope parsing, the subscribe handshake,
//!   and `X-Hub-Signature-256` verification
//! - **Sender** (`sender`) - outbound text delivery through the Graph API,
//!   plus the operator notification channel
//!
//! # Architecture
//!
//! ```text
//! WhatsApp webhook → verify signature → InboundEvent → TurnRuntime
//!                                                          ↓
//!                        CloudApiSender ← user-visible reply
//! ```
//!
//! The adapter knows nothing about scheduling; it normalizes traffic in and
//! delivers text out.

pub mod sender;
pub mod webhook;

pub use sender::CloudApiSender;
pub use webhook::{handshake, parse_webhook, verify_signature, InboundEvent, TextMessage, WebhookError};
