//! Frontdesk Agent - the per-turn orchestration runtime
//!
//! Every inbound message runs the same deterministic pipeline:
//!
//! ```text
//! Guard → Intent Classifier → Router → {Reception | Agenda | Handoff} → Dispatcher
//! ```
//!
//! Two conversational roles share one typed message contract:
//! - **Reception** (`reception`) collects fields across turns and never
//!   touches calendar state.
//! - **Agenda** (`agenda`) is the sole calendar authority and reports only
//!   outcomes it actually observed.
//!
//! External collaborators enter through traits: `LlmClient` (classification),
//! `CalendarBackend` (calendar I/O), `MessageSender`/`OperatorNotifier`
//! (delivery). Persistence comes from the `frontdesk-db` repository traits.

pub mod agenda;
pub mod calendar;
pub mod classifier;
pub mod dispatcher;
pub mod extract;
pub mod llm;
pub mod messages;
pub mod reception;
pub mod runtime;

pub use agenda::AgendaExecutor;
pub use calendar::{CalendarBackend, CalendarError, CalendarEvent, InMemoryCalendarBackend};
pub use classifier::IntentClassifier;
pub use dispatcher::{
    LoggingOperatorNotifier, MessageSender, OperatorNotifier, RecordingSender, ResponseDispatcher,
    SendError,
};
pub use extract::TurnExtractor;
pub use llm::{HttpCompletionClient, LlmClient, LlmError, OfflineIntentClient, ScriptedLlmClient};
pub use reception::ReceptionRole;
pub use runtime::{Clock, FixedClock, SystemClock, TurnError, TurnOutcome, TurnRuntime};
