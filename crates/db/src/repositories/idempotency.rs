use sqlx::{sqlite::SqliteRow, Row};

use frontdesk_core::domain::conversation::ConversationId;
use frontdesk_core::protocol::{CorrelationKey, IdempotencyRecord};

use super::conversation::parse_timestamp;
use super::{IdempotencyRepository, RepositoryError};
use crate::DbPool;

pub struct SqlIdempotencyRepository {
    pool: DbPool,
}

impl SqlIdempotencyRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl IdempotencyRepository for SqlIdempotencyRepository {
    async fn find(
        &self,
        key: &CorrelationKey,
    ) -> Result<Option<IdempotencyRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT correlation_key, conversation_id, operation_kind, payload_fingerprint,
                    result_json, first_seen_at, last_seen_at
             FROM idempotency_record
             WHERE correlation_key = ?",
        )
        .bind(&key.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(record_from_row).transpose()
    }

    async fn record(&self, record: &IdempotencyRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO idempotency_record
                (correlation_key, conversation_id, operation_kind, payload_fingerprint,
                 result_json, first_seen_at, last_seen_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (correlation_key) DO UPDATE SET
                last_seen_at = excluded.last_seen_at",
        )
        .bind(&record.correlation.0)
        .bind(&record.conversation_id.0)
        .bind(&record.operation_kind)
        .bind(&record.payload_fingerprint)
        .bind(&record.result_json)
        .bind(record.first_seen_at.to_rfc3339())
        .bind(record.last_seen_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn record_from_row(row: SqliteRow) -> Result<IdempotencyRecord, RepositoryError> {
    Ok(IdempotencyRecord {
        correlation: CorrelationKey(row.try_get("correlation_key")?),
        conversation_id: ConversationId(row.try_get("conversation_id")?),
        operation_kind: row.try_get("operation_kind")?,
        payload_fingerprint: row.try_get("payload_fingerprint")?,
        result_json: row.try_get("result_json")?,
        first_seen_at: parse_timestamp("first_seen_at", row.try_get("first_seen_at")?)?,
        last_seen_at: parse_timestamp("last_seen_at", row.try_get("last_seen_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use frontdesk_core::domain::conversation::ConversationId;
    use frontdesk_core::protocol::{CorrelationKey, IdempotencyRecord};

    use crate::connect_with_settings;
    use crate::migrations::run_pending;
    use crate::repositories::{IdempotencyRepository, SqlIdempotencyRepository};

    #[tokio::test]
    async fn record_round_trips_and_replays_keep_first_seen() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrate");
        let repo = SqlIdempotencyRepository::new(pool);

        let first_seen = Utc::now();
        let record = IdempotencyRecord {
            correlation: CorrelationKey("conv-1#4".to_owned()),
            conversation_id: ConversationId("conv-1".to_owned()),
            operation_kind: "create".to_owned(),
            payload_fingerprint: "fp-1".to_owned(),
            result_json: "{\"result\":\"created\"}".to_owned(),
            first_seen_at: first_seen,
            last_seen_at: first_seen,
        };
        repo.record(&record).await.expect("insert");

        let replay = IdempotencyRecord { last_seen_at: Utc::now(), ..record.clone() };
        repo.record(&replay).await.expect("replay upsert");

        let found = repo
            .find(&record.correlation)
            .await
            .expect("find")
            .expect("record exists");
        assert_eq!(found.result_json, record.result_json);
        assert_eq!(found.first_seen_at, record.first_seen_at, "replay must not rewrite history");
        assert!(found.last_seen_at >= found.first_seen_at);
    }
}
