use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use frontdesk_agent::dispatcher::{
    LoggingOperatorNotifier, MessageSender, OperatorNotifier, SendError,
};
use frontdesk_agent::{
    AgendaExecutor, HttpCompletionClient, IntentClassifier, LlmClient, OfflineIntentClient,
    ReceptionRole, ResponseDispatcher, SystemClock, TurnRuntime,
};
use frontdesk_agent::calendar::HttpCalendarBackend;
use frontdesk_core::audit::{AuditEvent, AuditSink};
use frontdesk_core::config::{AppConfig, ConfigError, LlmProvider, LoadOptions};
use frontdesk_db::repositories::{
    SqlAppointmentRepository, SqlContactRepository, SqlConversationRepository,
    SqlIdempotencyRepository, SqlTranscriptRepository,
};
use frontdesk_db::{connect_with_settings, migrations, DbPool};
use frontdesk_whatsapp::CloudApiSender;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub runtime: Arc<TurnRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("llm client setup failed: {0}")]
    Llm(String),
    #[error("calendar backend setup failed: {0}")]
    Calendar(String),
    #[error("whatsapp sender setup failed: {0}")]
    Sender(String),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let conversations = Arc::new(SqlConversationRepository::new(db_pool.clone()));
    let contacts = Arc::new(SqlContactRepository::new(db_pool.clone()));
    let appointments = Arc::new(SqlAppointmentRepository::new(db_pool.clone()));
    let idempotency = Arc::new(SqlIdempotencyRepository::new(db_pool.clone()));
    let transcript = Arc::new(SqlTranscriptRepository::new(db_pool.clone()));

    let llm: Arc<dyn LlmClient> = match config.llm.provider {
        LlmProvider::Offline => Arc::new(OfflineIntentClient),
        LlmProvider::OpenAi | LlmProvider::Ollama => Arc::new(
            HttpCompletionClient::from_config(&config.llm)
                .map_err(|error| BootstrapError::Llm(error.to_string()))?,
        ),
    };

    let calendar = Arc::new(
        HttpCalendarBackend::from_config(&config.calendar)
            .map_err(|error| BootstrapError::Calendar(error.to_string()))?,
    );

    let (sender, notifier): (Arc<dyn MessageSender>, Arc<dyn OperatorNotifier>) =
        if config.whatsapp.enabled {
            let cloud = Arc::new(
                CloudApiSender::from_config(&config.whatsapp)
                    .map_err(|error| BootstrapError::Sender(error.to_string()))?,
            );
            (cloud.clone(), cloud)
        } else {
            (Arc::new(LogOnlySender), Arc::new(LoggingOperatorNotifier))
        };

    let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);

    let runtime = Arc::new(TurnRuntime::new(
        IntentClassifier::new(llm, config.clinic.history_window, config.llm.timeout_secs),
        ReceptionRole::new(contacts.clone(), appointments.clone()),
        AgendaExecutor::new(
            calendar,
            appointments,
            idempotency,
            audit.clone(),
            config.clinic.listing_limit,
            config.calendar.max_retries,
        ),
        ResponseDispatcher::new(sender, transcript.clone()),
        conversations,
        contacts,
        transcript,
        notifier,
        audit,
        Arc::new(SystemClock),
        config.clinic.history_window,
        config.clinic.collection_max_idle_turns,
    ));

    Ok(Application { config, db_pool, runtime })
}

/// Audit events go to the structured log stream; operators review them with
/// the same tooling as the rest of the telemetry.
struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        info!(
            event_name = "audit.event",
            audit_event_type = %event.event_type,
            category = ?event.category,
            outcome = ?event.outcome,
            conversation_id = event.conversation_id.as_ref().map(|id| id.0.as_str()).unwrap_or("unknown"),
            correlation_id = %event.correlation_id,
            actor = %event.actor,
            metadata = ?event.metadata,
            "audit event recorded"
        );
    }
}

/// Stands in for the channel when WhatsApp delivery is disabled: outbound
/// messages land in the logs instead of a chat.
struct LogOnlySender;

#[async_trait]
impl MessageSender for LogOnlySender {
    async fn send_text(&self, wa_id: &str, body: &str) -> Result<(), SendError> {
        info!(
            event_name = "dispatch.channel_disabled",
            wa_id,
            body,
            "whatsapp delivery disabled; message logged only"
        );
        Ok(())
    }
}
