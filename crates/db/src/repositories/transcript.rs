use sqlx::{sqlite::SqliteRow, Row};

use frontdesk_core::domain::conversation::ConversationId;
use frontdesk_core::domain::transcript::{TranscriptDirection, TranscriptEntry};

use super::conversation::{parse_timestamp, parse_u32};
use super::{RepositoryError, TranscriptRepository};
use crate::DbPool;

pub struct SqlTranscriptRepository {
    pool: DbPool,
}

impl SqlTranscriptRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TranscriptRepository for SqlTranscriptRepository {
    async fn append(&self, entry: &TranscriptEntry) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO transcript_entry (id, conversation_id, turn_seq, direction, body, recorded_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(&entry.conversation_id.0)
        .bind(i64::from(entry.turn_seq))
        .bind(entry.direction.as_str())
        .bind(&entry.body)
        .bind(entry.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent(
        &self,
        conversation_id: &ConversationId,
        limit: u32,
    ) -> Result<Vec<TranscriptEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, conversation_id, turn_seq, direction, body, recorded_at
             FROM transcript_entry
             WHERE conversation_id = ?
             ORDER BY rowid DESC
             LIMIT ?",
        )
        .bind(&conversation_id.0)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut entries = rows
            .into_iter()
            .map(entry_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        entries.reverse();
        Ok(entries)
    }
}

fn entry_from_row(row: SqliteRow) -> Result<TranscriptEntry, RepositoryError> {
    let direction_raw = row.try_get::<String, _>("direction")?;
    let direction = TranscriptDirection::parse(&direction_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown transcript direction `{direction_raw}`"))
    })?;

    Ok(TranscriptEntry {
        id: row.try_get("id")?,
        conversation_id: ConversationId(row.try_get("conversation_id")?),
        turn_seq: parse_u32("turn_seq", row.try_get("turn_seq")?)?,
        direction,
        body: row.try_get("body")?,
        recorded_at: parse_timestamp("recorded_at", row.try_get("recorded_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use frontdesk_core::domain::contact::{Contact, ContactId};
    use frontdesk_core::domain::conversation::{Conversation, ConversationId};
    use frontdesk_core::domain::transcript::{TranscriptDirection, TranscriptEntry};

    use crate::connect_with_settings;
    use crate::migrations::run_pending;
    use crate::repositories::{
        ContactRepository, ConversationRepository, SqlContactRepository, SqlConversationRepository,
        SqlTranscriptRepository, TranscriptRepository,
    };

    fn entry(conversation_id: &ConversationId, turn: u32, body: &str) -> TranscriptEntry {
        TranscriptEntry {
            id: format!("te-{turn}-{body}"),
            conversation_id: conversation_id.clone(),
            turn_seq: turn,
            direction: TranscriptDirection::Inbound,
            body: body.to_owned(),
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn recent_returns_the_tail_in_chronological_order() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrate");

        let contact_id = ContactId("ct-1".to_owned());
        SqlContactRepository::new(pool.clone())
            .save(&Contact::new(contact_id.clone(), "5511999990000", Utc::now()))
            .await
            .expect("save contact");
        let conversation_id = ConversationId("conv-1".to_owned());
        SqlConversationRepository::new(pool.clone())
            .save(&Conversation::new(conversation_id.clone(), contact_id, Utc::now()))
            .await
            .expect("save conversation");

        let repo = SqlTranscriptRepository::new(pool);
        for (turn, body) in [(1, "hello"), (2, "book me"), (3, "tuesday")] {
            repo.append(&entry(&conversation_id, turn, body)).await.expect("append");
        }

        let recent = repo.recent(&conversation_id, 2).await.expect("recent");
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].body, "book me");
        assert_eq!(recent[1].body, "tuesday");
    }
}
