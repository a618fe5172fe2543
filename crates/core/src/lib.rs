//! Frontdesk Core - deterministic scheduling conversation kernel
//!
//! Pure domain logic for the clinic appointment assistant:
//! - **Domain** (`domain`) - conversations, contacts, appointments
//! - **Intent** (`intent`) - fixed intent taxonomy with fail-safe parsing
//! - **Protocol** (`protocol`) - the tagged Reception↔Agenda message pair
//! - **Collection** (`collection`) - per-operation slot gathering state machine
//! - **Routing** (`routing`) - conversation guard and the turn routing table
//! - **Schedule** (`schedule`) - business-day, shift and slot arithmetic
//! - **Errors** (`errors`) - the turn error taxonomy with user-facing wording
//!
//! Nothing in this crate performs I/O; the channel, the calendar backend and
//! persistence are driven from `frontdesk-agent` and below.

pub mod audit;
pub mod collection;
pub mod config;
pub mod domain;
pub mod errors;
pub mod intent;
pub mod protocol;
pub mod routing;
pub mod schedule;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use collection::{
    Affirmation, CollectionForm, CollectionMachine, CollectionStage, CollectionStep,
    PendingOperation, ProposedSlot, TurnFacts,
};
pub use domain::appointment::{Appointment, AppointmentCategory, AppointmentId};
pub use domain::contact::{Contact, ContactId};
pub use domain::conversation::{Conversation, ConversationId, ConversationStatus};
pub use domain::transcript::{TranscriptDirection, TranscriptEntry};
pub use errors::{
    AgendaError, BusinessRuleViolation, ConflictError, ExternalServiceError, ProtocolError,
    ValidationError,
};
pub use intent::Intent;
pub use protocol::{
    AgendaOperation, AgendaRequest, AgendaResponse, AgendaResult, AgendaOutcome, CorrelationKey,
    EventSummary, IdempotencyRecord, RejectionKind,
};
pub use routing::{guard, route, CollectionReadiness, GuardDecision, RouteTarget};
pub use schedule::SlotWindow;
