use std::io::{self, BufRead, Write};
use std::sync::Arc;

use chrono::{Duration, Utc};

use frontdesk_agent::{
    AgendaExecutor, InMemoryCalendarBackend, IntentClassifier, LoggingOperatorNotifier,
    OfflineIntentClient, ReceptionRole, RecordingSender, ResponseDispatcher, SystemClock,
    TurnRuntime,
};
use frontdesk_core::audit::InMemoryAuditSink;
use frontdesk_db::repositories::{
    InMemoryAppointmentRepository, InMemoryContactRepository, InMemoryConversationRepository,
    InMemoryIdempotencyRepository, InMemoryTranscriptRepository,
};

use super::CommandResult;

const LOCAL_WA_ID: &str = "local-user";

/// The assistant wired entirely to in-memory backends: no database, no
/// WhatsApp, no calendar account. The calendar starts with one demo booking
/// so availability answers have something to show.
pub struct Simulator {
    runtime: TurnRuntime,
}

impl Simulator {
    pub async fn new() -> Self {
        let sender = Arc::new(RecordingSender::default());
        let calendar = Arc::new(InMemoryCalendarBackend::default());
        let contacts = Arc::new(InMemoryContactRepository::default());
        let appointments = Arc::new(InMemoryAppointmentRepository::default());
        let transcript = Arc::new(InMemoryTranscriptRepository::default());
        let audit = Arc::new(InMemoryAuditSink::default());

        let tomorrow_morning = (Utc::now() + Duration::days(1))
            .date_naive()
            .and_hms_opt(9, 0, 0)
            .unwrap_or_else(|| Utc::now().naive_utc());
        calendar
            .seed_event(
                "[SELF-PAY] wa:demo — Demo Patient",
                tomorrow_morning,
                tomorrow_morning + Duration::minutes(29),
            )
            .await;

        let runtime = TurnRuntime::new(
            IntentClassifier::new(Arc::new(OfflineIntentClient), 6, 5),
            ReceptionRole::new(contacts.clone(), appointments.clone()),
            AgendaExecutor::new(
                calendar,
                appointments,
                Arc::new(InMemoryIdempotencyRepository::default()),
                audit.clone(),
                10,
                1,
            ),
            ResponseDispatcher::new(sender, transcript.clone()),
            Arc::new(InMemoryConversationRepository::default()),
            contacts,
            transcript,
            Arc::new(LoggingOperatorNotifier),
            audit,
            Arc::new(SystemClock),
            6,
            8,
        );

        Self { runtime }
    }

    pub async fn send(&self, text: &str) -> String {
        match self.runtime.handle_message(LOCAL_WA_ID, text).await {
            Ok(outcome) => outcome
                .reply
                .unwrap_or_else(|| "(no reply: the conversation is with a human attendant)".to_owned()),
            Err(error) => format!("(turn failed: {error})"),
        }
    }
}

pub async fn run(message: Option<String>) -> CommandResult {
    let simulator = Simulator::new().await;

    if let Some(text) = message {
        let reply = simulator.send(&text).await;
        return CommandResult::plain(reply);
    }

    println!("frontdesk chat simulator — in-memory backends, type `exit` to leave");
    let stdin = io::stdin();
    loop {
        print!("you> ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(error) => {
                return CommandResult::failure("chat", "stdin", error.to_string(), 3);
            }
        }

        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text.eq_ignore_ascii_case("exit") || text.eq_ignore_ascii_case("quit") {
            break;
        }

        println!("assistant> {}\n", simulator.send(text).await);
    }

    CommandResult::plain("chat session ended")
}
