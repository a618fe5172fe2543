use chrono::{NaiveDate, NaiveTime};
use sqlx::{sqlite::SqliteRow, Row};

use frontdesk_core::domain::appointment::{Appointment, AppointmentCategory, AppointmentId};
use frontdesk_core::domain::contact::ContactId;

use super::conversation::parse_timestamp;
use super::{AppointmentRepository, RepositoryError};
use crate::DbPool;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

pub struct SqlAppointmentRepository {
    pool: DbPool,
}

impl SqlAppointmentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AppointmentRepository for SqlAppointmentRepository {
    async fn find_by_contact(
        &self,
        contact_id: &ContactId,
    ) -> Result<Vec<Appointment>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, contact_id, subject_name, category, date, time, calendar_event_id, created_at
             FROM appointment
             WHERE contact_id = ?
             ORDER BY date, time",
        )
        .bind(&contact_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(appointment_from_row).collect()
    }

    async fn find_by_slot(
        &self,
        contact_id: &ContactId,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Option<Appointment>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, contact_id, subject_name, category, date, time, calendar_event_id, created_at
             FROM appointment
             WHERE contact_id = ? AND date = ? AND time = ?",
        )
        .bind(&contact_id.0)
        .bind(date.format(DATE_FORMAT).to_string())
        .bind(time.format(TIME_FORMAT).to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(appointment_from_row).transpose()
    }

    async fn save(&self, appointment: &Appointment) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO appointment
                (id, contact_id, subject_name, category, date, time, calendar_event_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&appointment.id.0)
        .bind(&appointment.contact_id.0)
        .bind(&appointment.subject_name)
        .bind(appointment.category.as_str())
        .bind(appointment.date.format(DATE_FORMAT).to_string())
        .bind(appointment.time.format(TIME_FORMAT).to_string())
        .bind(&appointment.calendar_event_id)
        .bind(appointment.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: &AppointmentId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM appointment WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn appointment_from_row(row: SqliteRow) -> Result<Appointment, RepositoryError> {
    let category_raw = row.try_get::<String, _>("category")?;
    let category = AppointmentCategory::parse(&category_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown appointment category `{category_raw}`"))
    })?;

    let date_raw = row.try_get::<String, _>("date")?;
    let date = NaiveDate::parse_from_str(&date_raw, DATE_FORMAT)
        .map_err(|error| RepositoryError::Decode(format!("bad date `{date_raw}`: {error}")))?;

    let time_raw = row.try_get::<String, _>("time")?;
    let time = NaiveTime::parse_from_str(&time_raw, TIME_FORMAT)
        .map_err(|error| RepositoryError::Decode(format!("bad time `{time_raw}`: {error}")))?;

    Ok(Appointment {
        id: AppointmentId(row.try_get("id")?),
        contact_id: ContactId(row.try_get("contact_id")?),
        subject_name: row.try_get("subject_name")?,
        category,
        date,
        time,
        calendar_event_id: row.try_get("calendar_event_id")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime, Utc};

    use frontdesk_core::domain::appointment::{Appointment, AppointmentCategory, AppointmentId};
    use frontdesk_core::domain::contact::{Contact, ContactId};

    use crate::connect_with_settings;
    use crate::migrations::run_pending;
    use crate::repositories::{
        AppointmentRepository, ContactRepository, SqlAppointmentRepository, SqlContactRepository,
    };

    fn fixture(contact_id: &ContactId, day: u32, hour: u32) -> Appointment {
        Appointment {
            id: AppointmentId(format!("apt-{day}-{hour}")),
            contact_id: contact_id.clone(),
            subject_name: "Maria Souza".to_owned(),
            category: AppointmentCategory::SelfPay,
            date: NaiveDate::from_ymd_opt(2026, 8, day).expect("valid date"),
            time: NaiveTime::from_hms_opt(hour, 0, 0).expect("valid time"),
            calendar_event_id: Some("evt-1".to_owned()),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn appointments_round_trip_ordered_by_date_and_time() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrate");

        let contact_id = ContactId("ct-1".to_owned());
        SqlContactRepository::new(pool.clone())
            .save(&Contact::new(contact_id.clone(), "5511999990000", Utc::now()))
            .await
            .expect("save contact");

        let repo = SqlAppointmentRepository::new(pool);
        repo.save(&fixture(&contact_id, 20, 10)).await.expect("save second");
        repo.save(&fixture(&contact_id, 12, 9)).await.expect("save first");

        let found = repo.find_by_contact(&contact_id).await.expect("list");
        assert_eq!(found.len(), 2);
        assert!(found[0].date < found[1].date);

        let by_slot = repo
            .find_by_slot(
                &contact_id,
                NaiveDate::from_ymd_opt(2026, 8, 12).expect("valid date"),
                NaiveTime::from_hms_opt(9, 0, 0).expect("valid time"),
            )
            .await
            .expect("find by slot")
            .expect("appointment exists");
        assert_eq!(by_slot.id.0, "apt-12-9");

        repo.delete(&by_slot.id).await.expect("delete");
        assert_eq!(repo.find_by_contact(&contact_id).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn duplicate_slot_for_the_same_contact_is_rejected_by_the_schema() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrate");

        let contact_id = ContactId("ct-1".to_owned());
        SqlContactRepository::new(pool.clone())
            .save(&Contact::new(contact_id.clone(), "5511999990000", Utc::now()))
            .await
            .expect("save contact");

        let repo = SqlAppointmentRepository::new(pool);
        repo.save(&fixture(&contact_id, 12, 9)).await.expect("first save");

        let mut duplicate = fixture(&contact_id, 12, 9);
        duplicate.id = AppointmentId("apt-other".to_owned());
        assert!(repo.save(&duplicate).await.is_err());
    }
}
