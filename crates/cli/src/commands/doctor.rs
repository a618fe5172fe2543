use secrecy::ExposeSecret;
use serde::Serialize;

use frontdesk_core::config::{AppConfig, LlmProvider, LoadOptions};
use frontdesk_db::connect_with_settings;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: &'static str,
    detail: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    status: &'static str,
    checks: Vec<DoctorCheck>,
}

pub async fn run(options: LoadOptions, json: bool) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return CommandResult::failure("doctor", "config", error.to_string(), 2),
    };

    let mut checks = vec![DoctorCheck {
        name: "config",
        status: "ok",
        detail: "configuration loaded and validated".to_string(),
    }];

    checks.push(database_check(&config).await);
    checks.push(channel_check(&config));
    checks.push(llm_check(&config));

    let healthy = checks.iter().all(|check| check.status == "ok");
    let report = DoctorReport { status: if healthy { "ok" } else { "degraded" }, checks };

    let output = if json {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| error.to_string())
    } else {
        render_report(&report)
    };

    CommandResult { exit_code: if healthy { 0 } else { 1 }, output }
}

async fn database_check(config: &AppConfig) -> DoctorCheck {
    match connect_with_settings(&config.database.url, 1, 5).await {
        Ok(pool) => {
            let probe = sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&pool).await;
            pool.close().await;
            match probe {
                Ok(_) => DoctorCheck {
                    name: "database",
                    status: "ok",
                    detail: format!("connected to {}", config.database.url),
                },
                Err(error) => DoctorCheck {
                    name: "database",
                    status: "failed",
                    detail: format!("probe query failed: {error}"),
                },
            }
        }
        Err(error) => DoctorCheck {
            name: "database",
            status: "failed",
            detail: format!("connection failed: {error}"),
        },
    }
}

fn channel_check(config: &AppConfig) -> DoctorCheck {
    if !config.whatsapp.enabled {
        return DoctorCheck {
            name: "whatsapp",
            status: "ok",
            detail: "channel disabled; outbound messages go to logs".to_string(),
        };
    }
    if config.whatsapp.access_token.expose_secret().is_empty()
        || config.whatsapp.phone_number_id.is_empty()
    {
        return DoctorCheck {
            name: "whatsapp",
            status: "failed",
            detail: "channel enabled but access token or phone number id is missing".to_string(),
        };
    }
    DoctorCheck {
        name: "whatsapp",
        status: "ok",
        detail: format!("channel enabled for phone number {}", config.whatsapp.phone_number_id),
    }
}

fn llm_check(config: &AppConfig) -> DoctorCheck {
    match config.llm.provider {
        LlmProvider::Offline => DoctorCheck {
            name: "llm",
            status: "ok",
            detail: "offline keyword classifier in use".to_string(),
        },
        LlmProvider::OpenAi | LlmProvider::Ollama => DoctorCheck {
            name: "llm",
            status: "ok",
            detail: format!("model `{}` over http", config.llm.model),
        },
    }
}

fn render_report(report: &DoctorReport) -> String {
    let mut lines = vec![format!("frontdesk doctor: {}", report.status)];
    for check in &report.checks {
        lines.push(format!("  [{}] {} - {}", check.status, check.name, check.detail));
    }
    lines.join("\n")
}
