use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use frontdesk_core::collection::CollectionForm;
use frontdesk_core::domain::contact::ContactId;
use frontdesk_core::domain::conversation::{Conversation, ConversationId, ConversationStatus};
use frontdesk_core::intent::Intent;

use super::{ConversationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlConversationRepository {
    pool: DbPool,
}

impl SqlConversationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ConversationRepository for SqlConversationRepository {
    async fn find_by_id(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, contact_id, status, turn_seq, last_intent, collection_json,
                    created_at, updated_at
             FROM conversation
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(conversation_from_row).transpose()
    }

    async fn find_by_contact(
        &self,
        contact_id: &ContactId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, contact_id, status, turn_seq, last_intent, collection_json,
                    created_at, updated_at
             FROM conversation
             WHERE contact_id = ?
             ORDER BY created_at DESC
             LIMIT 1",
        )
        .bind(&contact_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(conversation_from_row).transpose()
    }

    async fn save(&self, conversation: &Conversation) -> Result<(), RepositoryError> {
        let collection_json = conversation
            .collection
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(
            "INSERT INTO conversation
                (id, contact_id, status, turn_seq, last_intent, collection_json, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                status = excluded.status,
                turn_seq = excluded.turn_seq,
                last_intent = excluded.last_intent,
                collection_json = excluded.collection_json,
                updated_at = excluded.updated_at",
        )
        .bind(&conversation.id.0)
        .bind(&conversation.contact_id.0)
        .bind(conversation.status.as_str())
        .bind(i64::from(conversation.turn_seq))
        .bind(conversation.last_intent.map(|intent| intent.as_str()))
        .bind(collection_json)
        .bind(conversation.created_at.to_rfc3339())
        .bind(conversation.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn reset_to_automated(&self, id: &ConversationId) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE conversation SET status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(ConversationStatus::Automated.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn conversation_from_row(row: SqliteRow) -> Result<Conversation, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = ConversationStatus::parse(&status_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown conversation status `{status_raw}`"))
    })?;

    let last_intent = row
        .try_get::<Option<String>, _>("last_intent")?
        .map(|value| {
            Intent::parse(&value)
                .ok_or_else(|| RepositoryError::Decode(format!("unknown intent `{value}`")))
        })
        .transpose()?;

    let collection = row
        .try_get::<Option<String>, _>("collection_json")?
        .map(|value| {
            serde_json::from_str::<CollectionForm>(&value)
                .map_err(|error| RepositoryError::Decode(error.to_string()))
        })
        .transpose()?;

    Ok(Conversation {
        id: ConversationId(row.try_get("id")?),
        contact_id: ContactId(row.try_get("contact_id")?),
        status,
        turn_seq: parse_u32("turn_seq", row.try_get("turn_seq")?)?,
        last_intent,
        collection,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

pub(crate) fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::Decode(format!("column `{column}` out of range: {value}")))
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| RepositoryError::Decode(format!("column `{column}` is not rfc3339: {error}")),
    )
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use frontdesk_core::collection::{CollectionForm, PendingOperation};
    use frontdesk_core::domain::contact::{Contact, ContactId};
    use frontdesk_core::domain::conversation::{Conversation, ConversationId, ConversationStatus};
    use frontdesk_core::intent::Intent;

    use crate::connect_with_settings;
    use crate::migrations::run_pending;
    use crate::repositories::{
        ContactRepository, ConversationRepository, SqlContactRepository, SqlConversationRepository,
    };

    async fn pool_with_contact() -> (crate::DbPool, ContactId) {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrate");

        let contact_id = ContactId("ct-1".to_owned());
        SqlContactRepository::new(pool.clone())
            .save(&Contact::new(contact_id.clone(), "5511999990000", Utc::now()))
            .await
            .expect("save contact");

        (pool, contact_id)
    }

    #[tokio::test]
    async fn conversation_round_trips_with_collection_state() {
        let (pool, contact_id) = pool_with_contact().await;
        let repo = SqlConversationRepository::new(pool);

        let mut conversation =
            Conversation::new(ConversationId("conv-1".to_owned()), contact_id.clone(), Utc::now());
        conversation.turn_seq = 3;
        conversation.last_intent = Some(Intent::Create);
        conversation.collection = Some(CollectionForm::new(PendingOperation::Create, 3));

        repo.save(&conversation).await.expect("save conversation");

        let found = repo
            .find_by_contact(&contact_id)
            .await
            .expect("find conversation")
            .expect("conversation exists");

        assert_eq!(found.id, conversation.id);
        assert_eq!(found.turn_seq, 3);
        assert_eq!(found.last_intent, Some(Intent::Create));
        assert_eq!(
            found.collection.as_ref().map(|form| form.operation),
            Some(PendingOperation::Create)
        );
    }

    #[tokio::test]
    async fn reset_to_automated_reverses_the_terminal_human_status() {
        let (pool, contact_id) = pool_with_contact().await;
        let repo = SqlConversationRepository::new(pool);

        let mut conversation =
            Conversation::new(ConversationId("conv-2".to_owned()), contact_id, Utc::now());
        conversation.status = ConversationStatus::Human;
        repo.save(&conversation).await.expect("save conversation");

        repo.reset_to_automated(&conversation.id).await.expect("reset");

        let found =
            repo.find_by_id(&conversation.id).await.expect("find").expect("conversation exists");
        assert_eq!(found.status, ConversationStatus::Automated);
    }

    #[tokio::test]
    async fn save_is_an_upsert() {
        let (pool, contact_id) = pool_with_contact().await;
        let repo = SqlConversationRepository::new(pool);

        let mut conversation =
            Conversation::new(ConversationId("conv-3".to_owned()), contact_id, Utc::now());
        repo.save(&conversation).await.expect("insert");

        conversation.turn_seq = 9;
        conversation.collection = None;
        repo.save(&conversation).await.expect("update");

        let found =
            repo.find_by_id(&conversation.id).await.expect("find").expect("conversation exists");
        assert_eq!(found.turn_seq, 9);
        assert!(found.collection.is_none());
    }
}
