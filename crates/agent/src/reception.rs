use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use frontdesk_core::collection::{
    CollectionForm, CollectionMachine, CollectionStep, PendingOperation, TurnFacts,
};
use frontdesk_core::domain::contact::Contact;
use frontdesk_core::domain::conversation::Conversation;
use frontdesk_core::intent::Intent;
use frontdesk_core::protocol::AgendaOperation;
use frontdesk_core::schedule::weekday_name;
use frontdesk_db::repositories::{AppointmentRepository, ContactRepository, RepositoryError};

use crate::messages;

/// What the Reception role produced for this turn: either a user-visible
/// reply, or exactly one cross-role operation ready for the Agenda role.
#[derive(Clone, Debug, PartialEq)]
pub enum ReceptionAction {
    Reply(String),
    Dispatch { operation: AgendaOperation, pending: PendingOperation },
}

/// The Reception role: converses to fill the collection form, may update the
/// contact's name and list the contact's appointments, and never calls a
/// calendar-mutating operation itself.
pub struct ReceptionRole {
    contacts: Arc<dyn ContactRepository>,
    appointments: Arc<dyn AppointmentRepository>,
}

impl ReceptionRole {
    pub fn new(
        contacts: Arc<dyn ContactRepository>,
        appointments: Arc<dyn AppointmentRepository>,
    ) -> Self {
        Self { contacts, appointments }
    }

    /// The form the machine will run against this turn: the open one,
    /// restarted when the user switched to a different operation, or a fresh
    /// one for a newly classified mutating intent.
    pub fn resolve_form(
        conversation: &Conversation,
        intent: Intent,
        turn: u32,
    ) -> Option<CollectionForm> {
        let requested = PendingOperation::from_intent(intent);
        match (&conversation.collection, requested) {
            (Some(form), Some(operation)) if form.operation != operation && !form.dispatched => {
                Some(CollectionForm::new(operation, turn))
            }
            (Some(form), _) if !form.dispatched => Some(form.clone()),
            (Some(_), Some(operation)) | (None, Some(operation)) => {
                Some(CollectionForm::new(operation, turn))
            }
            (_, None) => None,
        }
    }

    pub async fn collect(
        &self,
        conversation: &mut Conversation,
        contact: &Contact,
        intent: Intent,
        facts: &TurnFacts,
        turn: u32,
        today: NaiveDate,
    ) -> Result<ReceptionAction, RepositoryError> {
        // Non-mutating contact tool: a captured full name is stored right
        // away, whatever else the turn does.
        if let Some(name) = &facts.full_name {
            if contact.display_name.as_deref() != Some(name) {
                self.contacts.update_display_name(&contact.id, name).await?;
                info!(
                    event_name = "reception.contact_name_updated",
                    conversation_id = %conversation.id.0,
                    "contact display name updated"
                );
            }
        }

        let Some(mut form) = Self::resolve_form(conversation, intent, turn) else {
            return Ok(ReceptionAction::Reply(messages::fallback()));
        };

        // Cancel and reschedule start from what is actually booked: list the
        // contact's appointments so the user can name the one they mean.
        if form.operation != PendingOperation::Create
            && form.date.is_none()
            && facts.date.is_none()
        {
            let appointments = self.appointments.find_by_contact(&contact.id).await?;
            if appointments.is_empty() {
                conversation.collection = None;
                return Ok(ReceptionAction::Reply(messages::no_appointments()));
            }
            conversation.collection = Some(form);
            return Ok(ReceptionAction::Reply(messages::appointments_list(&appointments)));
        }

        let machine = CollectionMachine::new(today);
        let step = machine.apply(&mut form, facts, turn);
        let pending = form.operation;
        conversation.collection = Some(form);

        Ok(match step {
            CollectionStep::NeedField { stage } => {
                ReceptionAction::Reply(messages::prompt_for(stage, pending))
            }
            CollectionStep::Refused { violation, suggested_dates } => {
                ReceptionAction::Reply(messages::refused_reply(&violation, &suggested_dates))
            }
            CollectionStep::Confirm { proposed } => {
                ReceptionAction::Reply(messages::confirm_prompt(pending, &proposed))
            }
            CollectionStep::Declined { stage } => {
                ReceptionAction::Reply(messages::declined_reply(stage))
            }
            CollectionStep::Dispatched { operation } => {
                info!(
                    event_name = "reception.request_dispatched",
                    conversation_id = %conversation.id.0,
                    operation = operation.kind(),
                    "collection complete; emitting cross-role request"
                );
                ReceptionAction::Dispatch { operation, pending }
            }
        })
    }

    /// Builds the read-only request a `QUERY` turn asks the Agenda role to
    /// run. Requests always originate from Reception.
    pub fn query_operation(facts: &TurnFacts) -> AgendaOperation {
        if let Some(date) = facts.date {
            AgendaOperation::CheckAvailability { date }
        } else if let Some(weekday) = facts.weekday {
            AgendaOperation::FindNextWeekday { weekday: weekday_name(weekday).to_lowercase() }
        } else {
            AgendaOperation::ListSlots
        }
    }
}
