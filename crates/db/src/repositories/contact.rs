use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use frontdesk_core::domain::contact::{Contact, ContactId};

use super::conversation::parse_timestamp;
use super::{ContactRepository, RepositoryError};
use crate::DbPool;

pub struct SqlContactRepository {
    pool: DbPool,
}

impl SqlContactRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ContactRepository for SqlContactRepository {
    async fn find_by_wa_id(&self, wa_id: &str) -> Result<Option<Contact>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, wa_id, display_name, created_at, updated_at
             FROM contact
             WHERE wa_id = ?",
        )
        .bind(wa_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(contact_from_row).transpose()
    }

    async fn save(&self, contact: &Contact) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO contact (id, wa_id, display_name, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                display_name = excluded.display_name,
                updated_at = excluded.updated_at",
        )
        .bind(&contact.id.0)
        .bind(&contact.wa_id)
        .bind(&contact.display_name)
        .bind(contact.created_at.to_rfc3339())
        .bind(contact.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_display_name(
        &self,
        id: &ContactId,
        display_name: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE contact SET display_name = ?, updated_at = ? WHERE id = ?")
            .bind(display_name)
            .bind(Utc::now().to_rfc3339())
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn contact_from_row(row: SqliteRow) -> Result<Contact, RepositoryError> {
    Ok(Contact {
        id: ContactId(row.try_get("id")?),
        wa_id: row.try_get("wa_id")?,
        display_name: row.try_get("display_name")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use frontdesk_core::domain::contact::{Contact, ContactId};

    use crate::connect_with_settings;
    use crate::migrations::run_pending;
    use crate::repositories::{ContactRepository, SqlContactRepository};

    #[tokio::test]
    async fn contact_round_trips_and_name_updates_apply() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrate");
        let repo = SqlContactRepository::new(pool);

        let contact = Contact::new(ContactId("ct-1".to_owned()), "5511988887777", Utc::now());
        repo.save(&contact).await.expect("save contact");

        repo.update_display_name(&contact.id, "Maria Souza").await.expect("update name");

        let found =
            repo.find_by_wa_id("5511988887777").await.expect("find").expect("contact exists");
        assert_eq!(found.id, contact.id);
        assert_eq!(found.display_name.as_deref(), Some("Maria Souza"));
    }
}
