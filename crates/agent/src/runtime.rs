use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use frontdesk_core::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use frontdesk_core::collection::{CollectionForm, CollectionMachine, CollectionStep, PendingOperation, TurnFacts};
use frontdesk_core::domain::contact::{Contact, ContactId};
use frontdesk_core::domain::conversation::{Conversation, ConversationId, ConversationStatus};
use frontdesk_core::domain::transcript::TranscriptDirection;
use frontdesk_core::errors::{AgendaError, ProtocolError};
use frontdesk_core::intent::Intent;
use frontdesk_core::protocol::{AgendaOperation, AgendaOutcome, AgendaRequest, CorrelationKey, RejectionKind};
use frontdesk_core::routing::{guard, route, CollectionReadiness, GuardDecision, RouteTarget};
use frontdesk_db::repositories::{
    ContactRepository, ConversationRepository, RepositoryError, TranscriptRepository,
};

use crate::agenda::AgendaExecutor;
use crate::classifier::IntentClassifier;
use crate::dispatcher::{DispatchError, OperatorNotifier, ResponseDispatcher};
use crate::extract::TurnExtractor;
use crate::messages;
use crate::reception::{ReceptionAction, ReceptionRole};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Pins the clock for tests and replayable simulations.
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnOutcome {
    /// `None` when the guard halted the turn: no automated output at all.
    pub reply: Option<String>,
    pub intent: Intent,
    pub handoff: bool,
}

/// Runs one inbound message to completion:
/// guard → classify → route → role → dispatch. No component executes
/// concurrently within a turn, and nothing runs after a handoff.
pub struct TurnRuntime {
    classifier: IntentClassifier,
    reception: ReceptionRole,
    agenda: AgendaExecutor,
    dispatcher: ResponseDispatcher,
    conversations: Arc<dyn ConversationRepository>,
    contacts: Arc<dyn ContactRepository>,
    transcript: Arc<dyn TranscriptRepository>,
    notifier: Arc<dyn OperatorNotifier>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    history_window: u32,
    max_idle_turns: u32,
}

impl TurnRuntime {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        classifier: IntentClassifier,
        reception: ReceptionRole,
        agenda: AgendaExecutor,
        dispatcher: ResponseDispatcher,
        conversations: Arc<dyn ConversationRepository>,
        contacts: Arc<dyn ContactRepository>,
        transcript: Arc<dyn TranscriptRepository>,
        notifier: Arc<dyn OperatorNotifier>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        history_window: u32,
        max_idle_turns: u32,
    ) -> Self {
        Self {
            classifier,
            reception,
            agenda,
            dispatcher,
            conversations,
            contacts,
            transcript,
            notifier,
            audit,
            clock,
            history_window,
            max_idle_turns,
        }
    }

    pub async fn handle_message(&self, wa_id: &str, text: &str) -> Result<TurnOutcome, TurnError> {
        let now = self.clock.now();
        let today = self.clock.today();

        let contact = self.find_or_create_contact(wa_id, now).await?;
        let mut conversation = match self.conversations.find_by_contact(&contact.id).await? {
            Some(conversation) => conversation,
            None => Conversation::new(
                ConversationId(format!("conv-{}", Uuid::new_v4())),
                contact.id.clone(),
                now,
            ),
        };
        let turn = conversation.begin_turn(now);
        // Persist before transcribing: transcript rows reference the
        // conversation row.
        self.conversations.save(&conversation).await?;
        self.dispatcher.record(&conversation, TranscriptDirection::Inbound, text).await?;

        if let GuardDecision::Halt { status } = guard(conversation.status) {
            self.audit.emit(
                AuditEvent::new(
                    Some(conversation.id.clone()),
                    CorrelationKey::derive(&conversation.id, turn).0,
                    "guard.turn_halted",
                    AuditCategory::Ingress,
                    "guard",
                    AuditOutcome::Rejected,
                )
                .with_metadata("status", status.as_str()),
            );
            info!(
                event_name = "guard.turn_halted",
                conversation_id = %conversation.id.0,
                status = status.as_str(),
                reason = messages::guard_silence_reason(),
                "turn halted before any component ran"
            );
            self.conversations.save(&conversation).await?;
            return Ok(TurnOutcome { reply: None, intent: Intent::Other, handoff: false });
        }

        // Abandonment policy: an idle half-collected form is discarded, and
        // a dispatched form from an earlier turn has served its purpose.
        if conversation
            .collection
            .as_ref()
            .is_some_and(|form| form.is_stale(turn, self.max_idle_turns) || form.dispatched)
        {
            conversation.collection = None;
        }

        let history =
            self.transcript.recent(&conversation.id, (self.history_window * 3).max(12)).await?;
        let mut intent = self.classifier.classify(&history, text).await;

        // Continuation: an open form keeps its operation when the classifier
        // sees nothing more specific in this turn.
        if let Some(form) = &conversation.collection {
            if intent == Intent::Other {
                intent = form.operation.intent();
            }
        }

        let facts = TurnExtractor::new(today).extract(text);
        let readiness = readiness(&conversation, intent, &facts, turn, today);
        let target = route(conversation.status, intent, readiness);
        info!(
            event_name = "router.turn_routed",
            conversation_id = %conversation.id.0,
            turn,
            intent = intent.as_str(),
            target = ?target,
            "turn routed"
        );

        let pre_turn_collection = conversation.collection.clone();

        let reply = match target {
            RouteTarget::Halt => {
                // Defensive twin of the guard; nothing else runs.
                self.conversations.save(&conversation).await?;
                return Ok(TurnOutcome { reply: None, intent, handoff: false });
            }
            RouteTarget::HumanHandoff => {
                return self.handoff(conversation, &contact, intent).await;
            }
            RouteTarget::Fallback => messages::fallback(),
            RouteTarget::Reception | RouteTarget::Agenda if intent.is_mutating() => {
                match self
                    .reception
                    .collect(&mut conversation, &contact, intent, &facts, turn, today)
                    .await?
                {
                    ReceptionAction::Reply(reply) => reply,
                    ReceptionAction::Dispatch { operation, pending } => {
                        self.fulfill(
                            &mut conversation,
                            &contact,
                            operation,
                            pending,
                            turn,
                            today,
                            pre_turn_collection,
                        )
                        .await?
                    }
                }
            }
            RouteTarget::Reception | RouteTarget::Agenda => {
                // Read-only path: Reception formulates, Agenda executes.
                let operation = ReceptionRole::query_operation(&facts);
                self.fulfill(
                    &mut conversation,
                    &contact,
                    operation,
                    PendingOperation::Create,
                    turn,
                    today,
                    pre_turn_collection,
                )
                .await?
            }
        };

        conversation.last_intent = Some(intent);
        self.conversations.save(&conversation).await?;
        self.dispatcher.dispatch(&conversation, &contact, &reply).await?;

        Ok(TurnOutcome { reply: Some(reply), intent, handoff: false })
    }

    async fn find_or_create_contact(
        &self,
        wa_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Contact, RepositoryError> {
        if let Some(contact) = self.contacts.find_by_wa_id(wa_id).await? {
            return Ok(contact);
        }
        let contact = Contact::new(ContactId(format!("ct-{}", Uuid::new_v4())), wa_id, now);
        self.contacts.save(&contact).await?;
        Ok(contact)
    }

    /// Terminal exit from automated control. No automated component may
    /// process this conversation again until an operator resets the status.
    async fn handoff(
        &self,
        mut conversation: Conversation,
        contact: &Contact,
        intent: Intent,
    ) -> Result<TurnOutcome, TurnError> {
        conversation.status = ConversationStatus::Human;
        conversation.collection = None;
        conversation.last_intent = Some(intent);
        self.conversations.save(&conversation).await?;

        let notice = messages::handoff_notice();
        self.dispatcher.dispatch(&conversation, contact, &notice).await?;
        self.notifier
            .notify_handoff(&conversation.id, &contact.wa_id, "user requested a human attendant")
            .await;

        Ok(TurnOutcome { reply: Some(notice), intent, handoff: true })
    }

    /// Carries one cross-role request through its wire form, executes it,
    /// transcribes both halves of the exchange, and renders the literal
    /// outcome.
    #[allow(clippy::too_many_arguments)]
    async fn fulfill(
        &self,
        conversation: &mut Conversation,
        contact: &Contact,
        operation: AgendaOperation,
        pending: PendingOperation,
        turn: u32,
        today: NaiveDate,
        pre_turn_collection: Option<CollectionForm>,
    ) -> Result<String, TurnError> {
        let request =
            AgendaRequest::new(CorrelationKey::derive(&conversation.id, turn), operation);

        // The request travels in its wire form and is validated on the way
        // back in; a malformed instance is fatal to the turn.
        let wire = match request.encode() {
            Ok(wire) => wire,
            Err(error) => {
                return Ok(self.protocol_failure(conversation, error, pre_turn_collection));
            }
        };
        self.dispatcher.record(conversation, TranscriptDirection::AgendaRequest, &wire).await?;
        let request = match AgendaRequest::decode(&wire) {
            Ok(request) => request,
            Err(error) => {
                return Ok(self.protocol_failure(conversation, error, pre_turn_collection));
            }
        };

        let mutating = request.operation.is_mutating();
        let response = self.agenda.execute(contact, &request, today).await;
        match response.encode() {
            Ok(wire) => {
                self.dispatcher
                    .record(conversation, TranscriptDirection::AgendaResponse, &wire)
                    .await?;
            }
            Err(error) => {
                // The operation ran; its outcome stands even if the wire
                // snapshot could not be written.
                warn!(
                    event_name = "protocol.response_snapshot_failed",
                    conversation_id = %conversation.id.0,
                    error = %error,
                    "could not transcribe agenda response"
                );
            }
        }

        // Read-only queries leave any half-collected form alone.
        if mutating {
            match &response.outcome {
                AgendaOutcome::Fulfilled { .. } | AgendaOutcome::Duplicate { .. } => {
                    conversation.collection = None;
                }
                AgendaOutcome::Rejected { kind, .. } => {
                    reopen_collection(conversation, *kind);
                }
            }
        }

        Ok(messages::render_outcome(&response.outcome, pending))
    }

    /// A malformed cross-role message commits nothing: the collection state
    /// is restored, the condition is recorded for operator review, and the
    /// user gets the generic apology.
    fn protocol_failure(
        &self,
        conversation: &mut Conversation,
        error: ProtocolError,
        pre_turn_collection: Option<CollectionForm>,
    ) -> String {
        conversation.collection = pre_turn_collection;
        self.audit.emit(
            AuditEvent::new(
                Some(conversation.id.clone()),
                CorrelationKey::derive(&conversation.id, conversation.turn_seq).0,
                "protocol.malformed_message",
                AuditCategory::Protocol,
                "runtime",
                AuditOutcome::Failed,
            )
            .with_metadata("error", error.to_string()),
        );
        warn!(
            event_name = "protocol.malformed_message",
            conversation_id = %conversation.id.0,
            error = %error,
            "cross-role message rejected"
        );
        AgendaError::from(error).user_message()
    }
}

/// Routing probe: would this turn's facts complete the collection including
/// the explicit confirmation? Runs the pure machine against a copy, so the
/// router stays side-effect free.
fn readiness(
    conversation: &Conversation,
    intent: Intent,
    facts: &TurnFacts,
    turn: u32,
    today: NaiveDate,
) -> CollectionReadiness {
    let open = conversation.collection.is_some();
    let Some(mut probe) = ReceptionRole::resolve_form(conversation, intent, turn) else {
        return if open { CollectionReadiness::Collecting } else { CollectionReadiness::None };
    };

    match CollectionMachine::new(today).apply(&mut probe, facts, turn) {
        CollectionStep::Dispatched { .. } => CollectionReadiness::ConfirmedComplete,
        _ if open => CollectionReadiness::Collecting,
        _ => CollectionReadiness::None,
    }
}

/// After a specific rejection the conversation keeps collecting corrected
/// input instead of starting over: only the fields the rejection invalidated
/// are cleared.
fn reopen_collection(conversation: &mut Conversation, kind: RejectionKind) {
    let Some(form) = conversation.collection.as_mut() else {
        return;
    };
    form.dispatched = false;
    form.proposed = None;
    match kind {
        RejectionKind::Conflict => form.time = None,
        RejectionKind::Validation
        | RejectionKind::BusinessRule
        | RejectionKind::NotFound => {
            form.date = None;
            form.time = None;
        }
        // Transient failures keep the chosen slot; the user can simply
        // confirm again once the backend recovers.
        RejectionKind::ExternalService | RejectionKind::Protocol => {}
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime, Utc};

    use frontdesk_core::collection::{Affirmation, CollectionForm, PendingOperation, TurnFacts};
    use frontdesk_core::domain::appointment::AppointmentCategory;
    use frontdesk_core::domain::contact::ContactId;
    use frontdesk_core::domain::conversation::{Conversation, ConversationId};
    use frontdesk_core::intent::Intent;
    use frontdesk_core::protocol::RejectionKind;
    use frontdesk_core::routing::CollectionReadiness;

    use super::{readiness, reopen_collection};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 6).expect("valid date")
    }

    fn conversation() -> Conversation {
        Conversation::new(
            ConversationId("conv-1".to_owned()),
            ContactId("ct-1".to_owned()),
            Utc::now(),
        )
    }

    fn complete_form() -> CollectionForm {
        let mut form = CollectionForm::new(PendingOperation::Create, 1);
        form.full_name = Some("Maria Souza".to_owned());
        form.category = Some(AppointmentCategory::SelfPay);
        form.date = Some(NaiveDate::from_ymd_opt(2026, 8, 12).expect("valid date"));
        form.time = Some(NaiveTime::from_hms_opt(10, 0, 0).expect("valid time"));
        form
    }

    #[test]
    fn readiness_is_confirmed_only_with_an_explicit_affirmative() {
        let mut conversation = conversation();
        conversation.collection = Some(complete_form());

        let affirmed = TurnFacts { affirmation: Affirmation::Affirmative, ..TurnFacts::default() };
        assert_eq!(
            readiness(&conversation, Intent::Create, &affirmed, 2, today()),
            CollectionReadiness::ConfirmedComplete
        );

        assert_eq!(
            readiness(&conversation, Intent::Create, &TurnFacts::default(), 2, today()),
            CollectionReadiness::Collecting
        );
    }

    #[test]
    fn readiness_probe_leaves_the_conversation_untouched() {
        let mut conversation = conversation();
        conversation.collection = Some(complete_form());
        let before = conversation.clone();

        let affirmed = TurnFacts { affirmation: Affirmation::Affirmative, ..TurnFacts::default() };
        readiness(&conversation, Intent::Create, &affirmed, 2, today());

        assert_eq!(conversation, before);
    }

    #[test]
    fn conflict_rejection_reopens_only_the_time_slot() {
        let mut conversation = conversation();
        let mut form = complete_form();
        form.dispatched = true;
        conversation.collection = Some(form);

        reopen_collection(&mut conversation, RejectionKind::Conflict);

        let form = conversation.collection.as_ref().expect("form stays open");
        assert!(!form.dispatched);
        assert!(form.date.is_some());
        assert!(form.time.is_none());
    }

    #[test]
    fn business_rule_rejection_reopens_the_date_too() {
        let mut conversation = conversation();
        let mut form = complete_form();
        form.dispatched = true;
        conversation.collection = Some(form);

        reopen_collection(&mut conversation, RejectionKind::BusinessRule);

        let form = conversation.collection.as_ref().expect("form stays open");
        assert!(form.date.is_none());
        assert!(form.time.is_none());
    }
}
