use std::future::Future;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use frontdesk_core::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use frontdesk_core::domain::appointment::{Appointment, AppointmentCategory, AppointmentId};
use frontdesk_core::domain::contact::Contact;
use frontdesk_core::errors::{
    AgendaError, BusinessRuleViolation, ConflictError, ExternalServiceError, ValidationError,
};
use frontdesk_core::protocol::{
    AgendaOperation, AgendaOutcome, AgendaRequest, AgendaResponse, AgendaResult, EventSummary,
    IdempotencyRecord, RejectionKind,
};
use frontdesk_core::schedule;
use frontdesk_db::repositories::{AppointmentRepository, IdempotencyRepository};

use crate::calendar::{CalendarBackend, CalendarError, CalendarEvent, NewCalendarEvent};

/// Booked events run one minute short of the slot so adjacent slots never
/// overlap on the backend.
const EVENT_MINUTES: i64 = 29;

/// The Agenda role: the only component that reads or writes calendar state.
/// Every response carries the literal outcome of the operation it actually
/// performed — never an assumption.
pub struct AgendaExecutor {
    calendar: Arc<dyn CalendarBackend>,
    appointments: Arc<dyn AppointmentRepository>,
    idempotency: Arc<dyn IdempotencyRepository>,
    audit: Arc<dyn AuditSink>,
    listing_limit: u32,
    max_retries: u32,
}

impl AgendaExecutor {
    pub fn new(
        calendar: Arc<dyn CalendarBackend>,
        appointments: Arc<dyn AppointmentRepository>,
        idempotency: Arc<dyn IdempotencyRepository>,
        audit: Arc<dyn AuditSink>,
        listing_limit: u32,
        max_retries: u32,
    ) -> Self {
        Self { calendar, appointments, idempotency, audit, listing_limit, max_retries }
    }

    pub async fn execute(
        &self,
        contact: &Contact,
        request: &AgendaRequest,
        today: NaiveDate,
    ) -> AgendaResponse {
        if request.operation.is_mutating() {
            if let Some(outcome) = self.replay_if_fulfilled(request).await {
                return AgendaResponse { correlation: request.correlation.clone(), outcome };
            }
        }

        // One fulfillment cycle shares a single event listing; no operation
        // refetches within the same turn.
        let mut events_cache: Option<Vec<CalendarEvent>> = None;
        let result = self.run(contact, &request.operation, today, &mut events_cache).await;

        let outcome = match result {
            Ok(result) => {
                if request.operation.is_mutating() {
                    self.record_fulfillment(contact, request, &result).await;
                }
                info!(
                    event_name = "agenda.operation_executed",
                    correlation_id = %request.correlation.0,
                    operation = request.operation.kind(),
                    "agenda operation fulfilled"
                );
                AgendaOutcome::Fulfilled { result }
            }
            Err(error) => {
                self.audit.emit(
                    AuditEvent::new(
                        None,
                        request.correlation.0.clone(),
                        "agenda.operation_rejected",
                        audit_category(&error),
                        "agenda",
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("operation", request.operation.kind())
                    .with_metadata("error", error.to_string()),
                );
                warn!(
                    event_name = "agenda.operation_rejected",
                    correlation_id = %request.correlation.0,
                    operation = request.operation.kind(),
                    error = %error,
                    "agenda operation rejected"
                );
                AgendaOutcome::Rejected {
                    kind: rejection_kind(&error),
                    reason: error.user_message(),
                }
            }
        };

        AgendaResponse { correlation: request.correlation.clone(), outcome }
    }

    /// A mutating request whose correlation key is already fulfilled returns
    /// the recorded outcome instead of running again.
    async fn replay_if_fulfilled(&self, request: &AgendaRequest) -> Option<AgendaOutcome> {
        let record = match self.idempotency.find(&request.correlation).await {
            Ok(found) => found?,
            Err(error) => {
                warn!(
                    event_name = "agenda.idempotency_lookup_failed",
                    correlation_id = %request.correlation.0,
                    error = %error,
                    "idempotency lookup failed; treating request as new"
                );
                return None;
            }
        };

        if record.payload_fingerprint != request.payload_fingerprint() {
            let error = AgendaError::from(ConflictError::DuplicateRequest {
                key: request.correlation.0.clone(),
            });
            return Some(AgendaOutcome::Rejected {
                kind: RejectionKind::Conflict,
                reason: error.user_message(),
            });
        }

        match serde_json::from_str::<AgendaResult>(&record.result_json) {
            Ok(result) => {
                info!(
                    event_name = "agenda.duplicate_replayed",
                    correlation_id = %request.correlation.0,
                    operation = record.operation_kind,
                    "replayed previously fulfilled mutation"
                );
                Some(AgendaOutcome::Duplicate { result })
            }
            Err(error) => {
                self.audit.emit(
                    AuditEvent::new(
                        Some(record.conversation_id.clone()),
                        request.correlation.0.clone(),
                        "agenda.result_snapshot_corrupt",
                        AuditCategory::Protocol,
                        "agenda",
                        AuditOutcome::Failed,
                    )
                    .with_metadata("error", error.to_string()),
                );
                let error = AgendaError::from(ConflictError::DuplicateRequest {
                    key: request.correlation.0.clone(),
                });
                Some(AgendaOutcome::Rejected {
                    kind: RejectionKind::Conflict,
                    reason: error.user_message(),
                })
            }
        }
    }

    async fn record_fulfillment(
        &self,
        contact: &Contact,
        request: &AgendaRequest,
        result: &AgendaResult,
    ) {
        let result_json = match serde_json::to_string(result) {
            Ok(json) => json,
            Err(error) => {
                warn!(
                    event_name = "agenda.result_snapshot_failed",
                    correlation_id = %request.correlation.0,
                    error = %error,
                    "could not snapshot fulfilled result"
                );
                return;
            }
        };

        let now = Utc::now();
        let conversation_id = frontdesk_core::domain::conversation::ConversationId(
            request.correlation.0.split('#').next().unwrap_or_default().to_owned(),
        );
        let record = IdempotencyRecord {
            correlation: request.correlation.clone(),
            conversation_id,
            operation_kind: request.operation.kind().to_owned(),
            payload_fingerprint: request.payload_fingerprint(),
            result_json,
            first_seen_at: now,
            last_seen_at: now,
        };

        if let Err(error) = self.idempotency.record(&record).await {
            warn!(
                event_name = "agenda.idempotency_record_failed",
                correlation_id = %request.correlation.0,
                contact = %contact.wa_id,
                error = %error,
                "could not persist idempotency record"
            );
        }
    }

    async fn run(
        &self,
        contact: &Contact,
        operation: &AgendaOperation,
        today: NaiveDate,
        events_cache: &mut Option<Vec<CalendarEvent>>,
    ) -> Result<AgendaResult, AgendaError> {
        match operation {
            AgendaOperation::ListSlots => {
                let events = self.cached_events(events_cache).await?;
                let events = events
                    .iter()
                    .map(|event| EventSummary {
                        title: event.summary.clone(),
                        date: event.start.date(),
                        time: (!event.all_day).then(|| event.start.time()),
                    })
                    .take(self.listing_limit as usize)
                    .collect();
                Ok(AgendaResult::Events { events })
            }
            AgendaOperation::FindNextWeekday { weekday } => {
                let parsed = schedule::parse_weekday(weekday).ok_or_else(|| {
                    ValidationError::Malformed {
                        field: "weekday",
                        reason: format!("`{weekday}` is not a weekday"),
                    }
                })?;
                // Pure computation, no calendar I/O.
                let dates =
                    schedule::next_weekday_dates(today, parsed, schedule::WEEKDAY_SEARCH_COUNT);
                Ok(AgendaResult::Dates {
                    weekday: schedule::weekday_name(parsed).to_owned(),
                    dates,
                })
            }
            AgendaOperation::CheckAvailability { date } => {
                let busy = self.busy_intervals(*date, events_cache).await?;
                Ok(AgendaResult::Availability {
                    date: *date,
                    slots: schedule::partition_day(*date, &busy),
                })
            }
            AgendaOperation::Create { subject, category, date, time } => {
                if *date <= today {
                    return Err(BusinessRuleViolation::NotFutureDate { date: *date }.into());
                }
                if !schedule::is_business_day(*date) {
                    return Err(BusinessRuleViolation::NotBusinessDay { date: *date }.into());
                }
                if *category == AppointmentCategory::Insurance
                    && !schedule::insurance_day(date.weekday())
                {
                    return Err(BusinessRuleViolation::InsuranceWeekday {
                        requested: date.weekday(),
                    }
                    .into());
                }
                if !schedule::slot_aligned(*time) {
                    return Err(BusinessRuleViolation::OutsideBusinessHours { time: *time }.into());
                }

                let busy = self.busy_intervals(*date, events_cache).await?;
                let slot_start = date.and_time(*time);
                let occupied = busy
                    .iter()
                    .any(|(start, end)| *start <= slot_start && slot_start < *end);
                if occupied {
                    return Err(ConflictError::SlotTaken { date: *date, time: *time }.into());
                }

                let event = NewCalendarEvent {
                    summary: format!(
                        "[{}] wa:{} — {subject}",
                        category.label().to_uppercase(),
                        contact.wa_id
                    ),
                    description: format!(
                        "Booked via WhatsApp\nPatient: {subject}\nType: {}",
                        category.label()
                    ),
                    start: slot_start,
                    end: slot_start + Duration::minutes(EVENT_MINUTES),
                };
                let created = self
                    .with_retry(|| self.calendar.create_event(&event))
                    .await
                    .map_err(external_error)?;

                let appointment = Appointment {
                    id: AppointmentId(format!("apt-{}", Uuid::new_v4())),
                    contact_id: contact.id.clone(),
                    subject_name: subject.clone(),
                    category: *category,
                    date: *date,
                    time: *time,
                    calendar_event_id: Some(created.id.clone()),
                    created_at: Utc::now(),
                };
                if let Err(error) = self.appointments.save(&appointment).await {
                    // The calendar write is committed; the clinic record is
                    // reconciled by operators from the audit trail.
                    warn!(
                        event_name = "agenda.local_record_failed",
                        calendar_event_id = %created.id,
                        error = %error,
                        "calendar event created but local appointment save failed"
                    );
                    self.audit.emit(
                        AuditEvent::new(
                            None,
                            created.id.clone(),
                            "agenda.local_record_failed",
                            AuditCategory::Scheduling,
                            "agenda",
                            AuditOutcome::Failed,
                        )
                        .with_metadata("error", error.to_string()),
                    );
                }

                Ok(AgendaResult::Created {
                    appointment_id: appointment.id.0,
                    subject: subject.clone(),
                    category: *category,
                    date: *date,
                    time: *time,
                })
            }
            AgendaOperation::Cancel { date, time } => {
                let appointment = self
                    .appointments
                    .find_by_slot(&contact.id, *date, *time)
                    .await
                    .map_err(|error| {
                        AgendaError::from(ExternalServiceError::Unavailable {
                            service: "appointment store",
                            detail: error.to_string(),
                        })
                    })?
                    .ok_or(AgendaError::NotFound { date: *date, time: *time })?;

                let mut calendar_removed = false;
                if let Some(event_id) = &appointment.calendar_event_id {
                    match self.with_retry(|| self.calendar.delete_event(event_id)).await {
                        Ok(()) => calendar_removed = true,
                        Err(error) => {
                            // The clinic record is authoritative; keep going
                            // and say so in the outcome.
                            warn!(
                                event_name = "agenda.calendar_delete_failed",
                                calendar_event_id = %event_id,
                                error = %error,
                                "calendar delete failed during cancellation"
                            );
                        }
                    }
                }

                self.appointments.delete(&appointment.id).await.map_err(|error| {
                    AgendaError::from(ExternalServiceError::Unavailable {
                        service: "appointment store",
                        detail: error.to_string(),
                    })
                })?;

                Ok(AgendaResult::Cancelled { date: *date, time: *time, calendar_removed })
            }
        }
    }

    async fn cached_events(
        &self,
        events_cache: &mut Option<Vec<CalendarEvent>>,
    ) -> Result<Vec<CalendarEvent>, AgendaError> {
        if events_cache.is_none() {
            let fetched = self
                .with_retry(|| self.calendar.list_events(50))
                .await
                .map_err(external_error)?;
            *events_cache = Some(fetched);
        }
        Ok(events_cache.clone().unwrap_or_default())
    }

    async fn busy_intervals(
        &self,
        date: NaiveDate,
        events_cache: &mut Option<Vec<CalendarEvent>>,
    ) -> Result<Vec<(chrono::NaiveDateTime, chrono::NaiveDateTime)>, AgendaError> {
        let events = self.cached_events(events_cache).await?;
        Ok(events
            .iter()
            .filter(|event| !event.all_day && event.start.date() == date)
            .map(|event| (event.start, event.end))
            .collect())
    }

    /// Bounded retry for transient backend failures. A definitive rejection
    /// is returned as-is: a failed write is authoritative, never retried
    /// into a different outcome.
    async fn with_retry<T, F, Fut>(&self, call: F) -> Result<T, CalendarError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, CalendarError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(error @ (CalendarError::Unavailable(_) | CalendarError::Timeout(_)))
                    if attempt < self.max_retries =>
                {
                    attempt += 1;
                    warn!(
                        event_name = "agenda.backend_retry",
                        attempt,
                        max_retries = self.max_retries,
                        error = %error,
                        "retrying calendar backend call"
                    );
                }
                Err(error) => return Err(error),
            }
        }
    }
}

fn external_error(error: CalendarError) -> AgendaError {
    match error {
        CalendarError::Timeout(secs) => {
            ExternalServiceError::Timeout { service: "calendar backend", secs }.into()
        }
        CalendarError::Unavailable(detail) | CalendarError::Rejected(detail) => {
            ExternalServiceError::Unavailable { service: "calendar backend", detail }.into()
        }
    }
}

fn rejection_kind(error: &AgendaError) -> RejectionKind {
    match error {
        AgendaError::Validation(_) => RejectionKind::Validation,
        AgendaError::BusinessRule(_) => RejectionKind::BusinessRule,
        AgendaError::Conflict(_) => RejectionKind::Conflict,
        AgendaError::NotFound { .. } => RejectionKind::NotFound,
        AgendaError::External(_) => RejectionKind::ExternalService,
        AgendaError::Protocol(_) => RejectionKind::Protocol,
    }
}

fn audit_category(error: &AgendaError) -> AuditCategory {
    match error {
        AgendaError::Protocol(_) => AuditCategory::Protocol,
        _ => AuditCategory::Scheduling,
    }
}
