use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use tokio::sync::RwLock;

use frontdesk_core::domain::appointment::{Appointment, AppointmentId};
use frontdesk_core::domain::contact::{Contact, ContactId};
use frontdesk_core::domain::conversation::{Conversation, ConversationId, ConversationStatus};
use frontdesk_core::domain::transcript::TranscriptEntry;
use frontdesk_core::protocol::{CorrelationKey, IdempotencyRecord};

use super::{
    AppointmentRepository, ContactRepository, ConversationRepository, IdempotencyRepository,
    RepositoryError, TranscriptRepository,
};

#[derive(Default)]
pub struct InMemoryConversationRepository {
    conversations: RwLock<HashMap<String, Conversation>>,
}

#[async_trait::async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn find_by_id(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let conversations = self.conversations.read().await;
        Ok(conversations.get(&id.0).cloned())
    }

    async fn find_by_contact(
        &self,
        contact_id: &ContactId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let conversations = self.conversations.read().await;
        Ok(conversations
            .values()
            .find(|conversation| conversation.contact_id == *contact_id)
            .cloned())
    }

    async fn save(&self, conversation: &Conversation) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.write().await;
        conversations.insert(conversation.id.0.clone(), conversation.clone());
        Ok(())
    }

    async fn reset_to_automated(&self, id: &ConversationId) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.write().await;
        if let Some(conversation) = conversations.get_mut(&id.0) {
            conversation.status = ConversationStatus::Automated;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryContactRepository {
    contacts: RwLock<HashMap<String, Contact>>,
}

#[async_trait::async_trait]
impl ContactRepository for InMemoryContactRepository {
    async fn find_by_wa_id(&self, wa_id: &str) -> Result<Option<Contact>, RepositoryError> {
        let contacts = self.contacts.read().await;
        Ok(contacts.values().find(|contact| contact.wa_id == wa_id).cloned())
    }

    async fn save(&self, contact: &Contact) -> Result<(), RepositoryError> {
        let mut contacts = self.contacts.write().await;
        contacts.insert(contact.id.0.clone(), contact.clone());
        Ok(())
    }

    async fn update_display_name(
        &self,
        id: &ContactId,
        display_name: &str,
    ) -> Result<(), RepositoryError> {
        let mut contacts = self.contacts.write().await;
        if let Some(contact) = contacts.get_mut(&id.0) {
            contact.display_name = Some(display_name.to_owned());
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryAppointmentRepository {
    appointments: RwLock<HashMap<String, Appointment>>,
}

#[async_trait::async_trait]
impl AppointmentRepository for InMemoryAppointmentRepository {
    async fn find_by_contact(
        &self,
        contact_id: &ContactId,
    ) -> Result<Vec<Appointment>, RepositoryError> {
        let appointments = self.appointments.read().await;
        let mut found: Vec<Appointment> = appointments
            .values()
            .filter(|appointment| appointment.contact_id == *contact_id)
            .cloned()
            .collect();
        found.sort_by_key(|appointment| (appointment.date, appointment.time));
        Ok(found)
    }

    async fn find_by_slot(
        &self,
        contact_id: &ContactId,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Option<Appointment>, RepositoryError> {
        let appointments = self.appointments.read().await;
        Ok(appointments
            .values()
            .find(|appointment| {
                appointment.contact_id == *contact_id
                    && appointment.date == date
                    && appointment.time == time
            })
            .cloned())
    }

    async fn save(&self, appointment: &Appointment) -> Result<(), RepositoryError> {
        let mut appointments = self.appointments.write().await;
        let clash = appointments.values().any(|existing| {
            existing.id != appointment.id
                && existing.contact_id == appointment.contact_id
                && existing.date == appointment.date
                && existing.time == appointment.time
        });
        if clash {
            return Err(RepositoryError::Decode(format!(
                "unique constraint violated for (contact, {}, {})",
                appointment.date, appointment.time
            )));
        }
        appointments.insert(appointment.id.0.clone(), appointment.clone());
        Ok(())
    }

    async fn delete(&self, id: &AppointmentId) -> Result<(), RepositoryError> {
        let mut appointments = self.appointments.write().await;
        appointments.remove(&id.0);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryIdempotencyRepository {
    records: RwLock<HashMap<String, IdempotencyRecord>>,
}

#[async_trait::async_trait]
impl IdempotencyRepository for InMemoryIdempotencyRepository {
    async fn find(
        &self,
        key: &CorrelationKey,
    ) -> Result<Option<IdempotencyRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.get(&key.0).cloned())
    }

    async fn record(&self, record: &IdempotencyRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.correlation.0) {
            Some(existing) => existing.last_seen_at = record.last_seen_at,
            None => {
                records.insert(record.correlation.0.clone(), record.clone());
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryTranscriptRepository {
    entries: RwLock<Vec<TranscriptEntry>>,
}

impl InMemoryTranscriptRepository {
    /// Full transcript snapshot, used by tests asserting on turn shape.
    pub async fn entries(&self) -> Vec<TranscriptEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait::async_trait]
impl TranscriptRepository for InMemoryTranscriptRepository {
    async fn append(&self, entry: &TranscriptEntry) -> Result<(), RepositoryError> {
        let mut entries = self.entries.write().await;
        entries.push(entry.clone());
        Ok(())
    }

    async fn recent(
        &self,
        conversation_id: &ConversationId,
        limit: u32,
    ) -> Result<Vec<TranscriptEntry>, RepositoryError> {
        let entries = self.entries.read().await;
        let matching: Vec<TranscriptEntry> = entries
            .iter()
            .filter(|entry| entry.conversation_id == *conversation_id)
            .cloned()
            .collect();
        let skip = matching.len().saturating_sub(limit as usize);
        Ok(matching.into_iter().skip(skip).collect())
    }
}
