use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use thiserror::Error;
use tokio::sync::RwLock;

use frontdesk_core::config::CalendarConfig;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CalendarError {
    #[error("calendar backend unavailable: {0}")]
    Unavailable(String),
    #[error("calendar backend timed out after {0}s")]
    Timeout(u64),
    #[error("calendar backend rejected the request: {0}")]
    Rejected(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CalendarEvent {
    pub id: String,
    pub summary: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub all_day: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewCalendarEvent {
    pub summary: String,
    pub description: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// The only doorway to calendar state. Solely the Agenda role holds one.
#[async_trait]
pub trait CalendarBackend: Send + Sync {
    async fn list_events(&self, max_results: u32) -> Result<Vec<CalendarEvent>, CalendarError>;
    async fn create_event(&self, event: &NewCalendarEvent)
        -> Result<CalendarEvent, CalendarError>;
    async fn delete_event(&self, event_id: &str) -> Result<(), CalendarError>;
}

/// Google Calendar v3 REST client with a bounded timeout per call.
pub struct HttpCalendarBackend {
    http: reqwest::Client,
    base_url: String,
    calendar_id: String,
    access_token: SecretString,
    timezone: String,
    timeout_secs: u64,
}

impl HttpCalendarBackend {
    pub fn from_config(config: &CalendarConfig) -> Result<Self, CalendarError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|error| CalendarError::Unavailable(error.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            calendar_id: config.calendar_id.clone(),
            access_token: config.access_token.clone(),
            timezone: config.timezone.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    fn events_url(&self) -> String {
        format!("{}/calendars/{}/events", self.base_url, self.calendar_id)
    }

    fn map_request_error(&self, error: reqwest::Error) -> CalendarError {
        if error.is_timeout() {
            CalendarError::Timeout(self.timeout_secs)
        } else {
            CalendarError::Unavailable(error.to_string())
        }
    }

    fn check_status(response: &reqwest::Response) -> Result<(), CalendarError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status.is_client_error() {
            Err(CalendarError::Rejected(format!("status {status}")))
        } else {
            Err(CalendarError::Unavailable(format!("status {status}")))
        }
    }
}

#[async_trait]
impl CalendarBackend for HttpCalendarBackend {
    async fn list_events(&self, max_results: u32) -> Result<Vec<CalendarEvent>, CalendarError> {
        let response = self
            .http
            .get(self.events_url())
            .bearer_auth(self.access_token.expose_secret())
            .query(&[
                ("maxResults", max_results.to_string()),
                ("singleEvents", "true".to_owned()),
                ("orderBy", "startTime".to_owned()),
                ("timeMin", Utc::now().to_rfc3339()),
            ])
            .send()
            .await
            .map_err(|error| self.map_request_error(error))?;
        Self::check_status(&response)?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|error| CalendarError::Unavailable(error.to_string()))?;
        let items = body["items"].as_array().cloned().unwrap_or_default();
        Ok(items.iter().filter_map(event_from_item).collect())
    }

    async fn create_event(
        &self,
        event: &NewCalendarEvent,
    ) -> Result<CalendarEvent, CalendarError> {
        let response = self
            .http
            .post(self.events_url())
            .bearer_auth(self.access_token.expose_secret())
            .json(&json!({
                "summary": event.summary,
                "description": event.description,
                "start": {"dateTime": event.start.format("%Y-%m-%dT%H:%M:%S").to_string(), "timeZone": self.timezone},
                "end": {"dateTime": event.end.format("%Y-%m-%dT%H:%M:%S").to_string(), "timeZone": self.timezone},
            }))
            .send()
            .await
            .map_err(|error| self.map_request_error(error))?;
        Self::check_status(&response)?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|error| CalendarError::Unavailable(error.to_string()))?;
        let id = body["id"]
            .as_str()
            .ok_or_else(|| CalendarError::Unavailable("created event has no id".to_owned()))?;

        Ok(CalendarEvent {
            id: id.to_owned(),
            summary: event.summary.clone(),
            start: event.start,
            end: event.end,
            all_day: false,
        })
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), CalendarError> {
        let response = self
            .http
            .delete(format!("{}/{event_id}", self.events_url()))
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .map_err(|error| self.map_request_error(error))?;
        Self::check_status(&response)
    }
}

fn event_from_item(item: &serde_json::Value) -> Option<CalendarEvent> {
    let id = item["id"].as_str()?.to_owned();
    let summary = item["summary"].as_str().unwrap_or("(untitled)").to_owned();

    if let Some(start_raw) = item["start"]["dateTime"].as_str() {
        let start = parse_event_datetime(start_raw)?;
        let end = item["end"]["dateTime"]
            .as_str()
            .and_then(parse_event_datetime)
            .unwrap_or(start);
        return Some(CalendarEvent { id, summary, start, end, all_day: false });
    }

    let date = item["start"]["date"].as_str()?;
    let start = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?.and_hms_opt(0, 0, 0)?;
    Some(CalendarEvent { id, summary, start, end: start, all_day: true })
}

fn parse_event_datetime(raw: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(raw).map(|timestamp| timestamp.naive_local()).ok()
}

/// Backend used by tests and the local simulator. Can be scripted to fail so
/// round-trip truthfulness is testable.
#[derive(Default)]
pub struct InMemoryCalendarBackend {
    events: RwLock<Vec<CalendarEvent>>,
    next_id: AtomicU64,
    fail_with: RwLock<Option<CalendarError>>,
}

impl InMemoryCalendarBackend {
    pub async fn seed_event(&self, summary: &str, start: NaiveDateTime, end: NaiveDateTime) {
        let id = format!("evt-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut events = self.events.write().await;
        events.push(CalendarEvent {
            id,
            summary: summary.to_owned(),
            start,
            end,
            all_day: false,
        });
    }

    /// Every subsequent call fails with `error` until cleared with `heal`.
    pub async fn fail_with(&self, error: CalendarError) {
        *self.fail_with.write().await = Some(error);
    }

    pub async fn heal(&self) {
        *self.fail_with.write().await = None;
    }

    pub async fn events(&self) -> Vec<CalendarEvent> {
        self.events.read().await.clone()
    }

    async fn check_failure(&self) -> Result<(), CalendarError> {
        match self.fail_with.read().await.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CalendarBackend for InMemoryCalendarBackend {
    async fn list_events(&self, max_results: u32) -> Result<Vec<CalendarEvent>, CalendarError> {
        self.check_failure().await?;
        let mut events = self.events.read().await.clone();
        events.sort_by_key(|event| event.start);
        events.truncate(max_results as usize);
        Ok(events)
    }

    async fn create_event(
        &self,
        event: &NewCalendarEvent,
    ) -> Result<CalendarEvent, CalendarError> {
        self.check_failure().await?;
        let id = format!("evt-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let created = CalendarEvent {
            id,
            summary: event.summary.clone(),
            start: event.start,
            end: event.end,
            all_day: false,
        };
        self.events.write().await.push(created.clone());
        Ok(created)
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), CalendarError> {
        self.check_failure().await?;
        let mut events = self.events.write().await;
        let before = events.len();
        events.retain(|event| event.id != event_id);
        if events.len() == before {
            return Err(CalendarError::Rejected(format!("unknown event `{event_id}`")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{
        CalendarBackend, CalendarError, InMemoryCalendarBackend, NewCalendarEvent,
    };

    fn at(day: u32, hour: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, day)
            .expect("valid date")
            .and_hms_opt(hour, 0, 0)
            .expect("valid time")
    }

    #[tokio::test]
    async fn in_memory_backend_creates_lists_and_deletes() {
        let backend = InMemoryCalendarBackend::default();
        let created = backend
            .create_event(&NewCalendarEvent {
                summary: "[SELF_PAY] wa:5511 — Maria Souza".to_owned(),
                description: String::new(),
                start: at(11, 9),
                end: at(11, 9) + chrono::Duration::minutes(29),
            })
            .await
            .expect("create");

        let listed = backend.list_events(10).await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.id);

        backend.delete_event(&created.id).await.expect("delete");
        assert!(backend.list_events(10).await.expect("list").is_empty());
        assert!(matches!(
            backend.delete_event(&created.id).await,
            Err(CalendarError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn scripted_failure_surfaces_on_every_call_until_healed() {
        let backend = InMemoryCalendarBackend::default();
        backend.fail_with(CalendarError::Timeout(10)).await;

        assert_eq!(backend.list_events(5).await, Err(CalendarError::Timeout(10)));

        backend.heal().await;
        assert!(backend.list_events(5).await.is_ok());
    }

    #[test]
    fn event_items_parse_timed_and_all_day_forms() {
        let timed = serde_json::json!({
            "id": "evt-1",
            "summary": "Consultation",
            "start": {"dateTime": "2026-08-11T09:00:00-03:00"},
            "end": {"dateTime": "2026-08-11T09:29:00-03:00"},
        });
        let parsed = super::event_from_item(&timed).expect("timed event parses");
        assert!(!parsed.all_day);
        assert_eq!(parsed.start, at(11, 9));

        let all_day = serde_json::json!({
            "id": "evt-2",
            "start": {"date": "2026-08-12"},
            "end": {"date": "2026-08-13"},
        });
        let parsed = super::event_from_item(&all_day).expect("all-day event parses");
        assert!(parsed.all_day);
        assert_eq!(parsed.summary, "(untitled)");
    }
}
