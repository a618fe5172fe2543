//! All user-visible copy. Roles build their replies here so the dispatcher
//! can forward text verbatim and tests can pin the wording that matters
//! (confirmations must name the exact slot, rejections must stay specific).

use chrono::{NaiveDate, NaiveTime};

use frontdesk_core::collection::{CollectionStage, PendingOperation, ProposedSlot};
use frontdesk_core::domain::appointment::Appointment;
use frontdesk_core::errors::BusinessRuleViolation;
use frontdesk_core::protocol::{AgendaOutcome, AgendaResult, EventSummary};
use frontdesk_core::schedule::{weekday_name, SlotWindow};
use chrono::Datelike;

pub fn format_date(date: NaiveDate) -> String {
    format!("{} ({})", date.format("%d/%m/%Y"), weekday_name(date.weekday()))
}

pub fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

pub fn fallback() -> String {
    "I didn't quite understand. I can book, check, cancel or move clinic appointments — \
     how can I help?"
        .to_owned()
}

pub fn handoff_notice() -> String {
    "I'm transferring you to a human attendant now. Someone will reply here shortly."
        .to_owned()
}

pub fn guard_silence_reason() -> &'static str {
    "conversation is not under automated control"
}

pub fn prompt_for(stage: CollectionStage, operation: PendingOperation) -> String {
    match (operation, stage) {
        (_, CollectionStage::AwaitingName) => {
            "To get your booking started, what is the patient's full name?".to_owned()
        }
        (_, CollectionStage::AwaitingCategory) => {
            "Will this consultation be self-pay or through insurance?".to_owned()
        }
        (PendingOperation::Create, CollectionStage::AwaitingDate) => {
            "Which date works for you? (DD/MM/YYYY — insurance runs Tuesdays and Thursdays only)"
                .to_owned()
        }
        (_, CollectionStage::AwaitingDate) => {
            "Which date is the appointment you mean? (DD/MM/YYYY)".to_owned()
        }
        (PendingOperation::Create, CollectionStage::AwaitingTime) => {
            "And what time? Slots are every 30 minutes, 09:00-12:00 and 13:00-17:00.".to_owned()
        }
        (_, CollectionStage::AwaitingTime) => {
            "And at what time is that appointment? (HH:MM)".to_owned()
        }
        (operation, _) => confirm_wording(operation, None),
    }
}

pub fn confirm_prompt(operation: PendingOperation, proposed: &ProposedSlot) -> String {
    confirm_wording(operation, Some(proposed))
}

fn confirm_wording(operation: PendingOperation, proposed: Option<&ProposedSlot>) -> String {
    let slot = proposed
        .map(|slot| format!("{} at {}", format_date(slot.date), format_time(slot.time)))
        .unwrap_or_else(|| "that slot".to_owned());
    match operation {
        PendingOperation::Create => {
            format!("Can I confirm your appointment for {slot}? Reply \"yes\" to book it.")
        }
        PendingOperation::Cancel => {
            format!("You want to cancel the appointment on {slot} — is that right? Reply \"yes\" to confirm.")
        }
        PendingOperation::Reschedule => format!(
            "I'll release your current appointment on {slot} so we can pick a new one — \
             confirm? Reply \"yes\" to go ahead."
        ),
    }
}

pub fn declined_reply(stage: CollectionStage) -> String {
    match stage {
        CollectionStage::AwaitingTime => {
            "No problem, we'll keep the date. What time would suit you instead?".to_owned()
        }
        _ => "No problem, nothing was booked. Which date would you prefer?".to_owned(),
    }
}

pub fn refused_reply(violation: &BusinessRuleViolation, suggested_dates: &[NaiveDate]) -> String {
    let mut reply = format!("I'm afraid {violation}.");
    if !suggested_dates.is_empty() {
        reply.push_str(" The next options are:\n");
        for (index, date) in suggested_dates.iter().enumerate() {
            reply.push_str(&format!("{}. {}\n", index + 1, format_date(*date)));
        }
        reply.push_str("Would one of these work?");
    }
    reply
}

pub fn appointments_list(appointments: &[Appointment]) -> String {
    if appointments.is_empty() {
        return no_appointments();
    }
    let mut lines = vec!["📅 Your upcoming appointments:".to_owned()];
    for (index, appointment) in appointments.iter().enumerate() {
        lines.push(format!(
            "{}. {} at {} — {}",
            index + 1,
            format_date(appointment.date),
            format_time(appointment.time),
            appointment.category.label(),
        ));
    }
    lines.push(String::new());
    lines.push("Tell me the date and time of the one you mean.".to_owned());
    lines.join("\n")
}

pub fn no_appointments() -> String {
    "You have no appointments booked at the moment.".to_owned()
}

/// Renders the Agenda role's literal outcome for the user. The wording never
/// upgrades an outcome: only a `Fulfilled`/`Duplicate` create reads as a
/// booking confirmation, and rejections surface their specific reason.
pub fn render_outcome(outcome: &AgendaOutcome, operation: PendingOperation) -> String {
    match outcome {
        AgendaOutcome::Fulfilled { result } => render_result(result, operation),
        AgendaOutcome::Duplicate { result } => format!(
            "That request was already handled — here is the original outcome.\n\n{}",
            render_result(result, operation)
        ),
        AgendaOutcome::Rejected { reason, .. } => reason.clone(),
    }
}

fn render_result(result: &AgendaResult, operation: PendingOperation) -> String {
    match result {
        AgendaResult::Events { events } => events_list(events),
        AgendaResult::Dates { weekday, dates } => {
            let mut lines = vec![format!("📅 Next {weekday}s:")];
            for (index, date) in dates.iter().enumerate() {
                lines.push(format!("{}. {}", index + 1, date.format("%d/%m/%Y")));
            }
            lines.join("\n")
        }
        AgendaResult::Availability { date, slots } => availability_list(*date, slots),
        AgendaResult::Created { subject, category, date, time, .. } => format!(
            "✅ Appointment booked!\n📅 Date: {}\n⏰ Time: {}\n👤 Patient: {subject}\n📋 Type: {}",
            format_date(*date),
            format_time(*time),
            category.label(),
        ),
        AgendaResult::Cancelled { date, time, calendar_removed } => {
            let mut reply = format!(
                "✅ Appointment cancelled.\n📅 Date: {}\n⏰ Time: {}",
                format_date(*date),
                format_time(*time),
            );
            if !*calendar_removed {
                reply.push_str(
                    "\n\nThe clinic record is removed; the calendar entry will be cleaned up \
                     by the team.",
                );
            }
            if operation == PendingOperation::Reschedule {
                reply.push_str(
                    "\n\nNow let's find the new slot — which date would you like instead?",
                );
            }
            reply
        }
    }
}

fn events_list(events: &[EventSummary]) -> String {
    if events.is_empty() {
        return "📅 No upcoming events on the clinic calendar.".to_owned();
    }
    let mut lines = vec!["📅 Upcoming events:".to_owned()];
    for (index, event) in events.iter().enumerate() {
        let when = match event.time {
            Some(time) => format!("{} at {}", event.date.format("%d/%m/%Y"), format_time(time)),
            None => event.date.format("%d/%m/%Y").to_string(),
        };
        lines.push(format!("{}. {} — {when}", index + 1, event.title));
    }
    lines.join("\n")
}

fn availability_list(date: NaiveDate, slots: &[SlotWindow]) -> String {
    let free: Vec<&SlotWindow> = slots.iter().filter(|slot| slot.free).collect();
    if free.is_empty() {
        return format!("No free slots on {}. Want to try another date?", format_date(date));
    }
    let mut lines = vec![format!("✅ Free slots on {}:", format_date(date))];
    for slot in free {
        lines.push(format!("• {} - {}", format_time(slot.start), format_time(slot.end)));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use frontdesk_core::collection::{PendingOperation, ProposedSlot};
    use frontdesk_core::domain::appointment::AppointmentCategory;
    use frontdesk_core::protocol::{AgendaOutcome, AgendaResult};
    use frontdesk_core::schedule::SlotWindow;

    use super::{availability_list, confirm_prompt, render_outcome};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, d).expect("valid date")
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).expect("valid time")
    }

    #[test]
    fn confirmation_prompt_names_the_exact_slot() {
        let prompt = confirm_prompt(
            PendingOperation::Create,
            &ProposedSlot { date: date(11), time: time(9, 30) },
        );
        assert!(prompt.contains("11/08/2026"));
        assert!(prompt.contains("09:30"));
        assert!(prompt.contains("Tuesday"));
    }

    #[test]
    fn created_outcome_reads_back_the_booked_slot() {
        let reply = render_outcome(
            &AgendaOutcome::Fulfilled {
                result: AgendaResult::Created {
                    appointment_id: "apt-1".to_owned(),
                    subject: "Maria Souza".to_owned(),
                    category: AppointmentCategory::Insurance,
                    date: date(11),
                    time: time(9, 30),
                },
            },
            PendingOperation::Create,
        );
        assert!(reply.contains("Appointment booked"));
        assert!(reply.contains("11/08/2026"));
        assert!(reply.contains("09:30"));
        assert!(reply.contains("insurance"));
    }

    #[test]
    fn duplicate_outcome_never_reads_as_a_second_booking() {
        let reply = render_outcome(
            &AgendaOutcome::Duplicate {
                result: AgendaResult::Created {
                    appointment_id: "apt-1".to_owned(),
                    subject: "Maria Souza".to_owned(),
                    category: AppointmentCategory::SelfPay,
                    date: date(11),
                    time: time(9, 30),
                },
            },
            PendingOperation::Create,
        );
        assert!(reply.starts_with("That request was already handled"));
    }

    #[test]
    fn rejected_outcome_surfaces_the_specific_reason_verbatim() {
        let reply = render_outcome(
            &AgendaOutcome::Rejected {
                kind: frontdesk_core::protocol::RejectionKind::BusinessRule,
                reason: "I cannot book that: insurance consultations run on Tuesdays and Thursdays only, not Monday.".to_owned(),
            },
            PendingOperation::Create,
        );
        assert!(reply.contains("Tuesdays and Thursdays"));
    }

    #[test]
    fn reschedule_cancellation_invites_the_replacement_booking() {
        let reply = render_outcome(
            &AgendaOutcome::Fulfilled {
                result: AgendaResult::Cancelled {
                    date: date(11),
                    time: time(9, 30),
                    calendar_removed: true,
                },
            },
            PendingOperation::Reschedule,
        );
        assert!(reply.contains("Appointment cancelled"));
        assert!(reply.contains("new slot"));
    }

    #[test]
    fn availability_listing_shows_only_free_slots() {
        let listing = availability_list(
            date(11),
            &[
                SlotWindow { start: time(9, 0), end: time(9, 30), free: false },
                SlotWindow { start: time(9, 30), end: time(10, 0), free: true },
            ],
        );
        assert!(!listing.contains("09:00 - 09:30"));
        assert!(listing.contains("09:30 - 10:00"));
    }
}
