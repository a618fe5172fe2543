use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub whatsapp: WhatsAppConfig,
    pub calendar: CalendarConfig,
    pub llm: LlmConfig,
    pub clinic: ClinicConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct WhatsAppConfig {
    pub enabled: bool,
    pub access_token: SecretString,
    pub verify_token: String,
    pub app_secret: SecretString,
    pub phone_number_id: String,
    pub api_base_url: String,
    pub operator_wa_id: Option<String>,
}

#[derive(Clone, Debug)]
pub struct CalendarConfig {
    pub base_url: String,
    pub calendar_id: String,
    pub access_token: SecretString,
    pub timezone: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct ClinicConfig {
    /// Near-term events returned by `list-slots`.
    pub listing_limit: u32,
    /// Idle turns before a half-collected form is abandoned.
    pub collection_max_idle_turns: u32,
    /// Transcript lines fed to the intent classifier as context.
    pub history_window: u32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Ollama,
    /// Keyword matching instead of a model call; used by the local simulator
    /// and by deployments without an LLM endpoint.
    Offline,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub whatsapp_enabled: Option<bool>,
    pub whatsapp_access_token: Option<String>,
    pub whatsapp_verify_token: Option<String>,
    pub whatsapp_app_secret: Option<String>,
    pub whatsapp_phone_number_id: Option<String>,
    pub calendar_base_url: Option<String>,
    pub calendar_access_token: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://frontdesk.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            whatsapp: WhatsAppConfig {
                enabled: false,
                access_token: String::new().into(),
                verify_token: String::new(),
                app_secret: String::new().into(),
                phone_number_id: String::new(),
                api_base_url: "https://graph.facebook.com/v21.0".to_string(),
                operator_wa_id: None,
            },
            calendar: CalendarConfig {
                base_url: "https://www.googleapis.com/calendar/v3".to_string(),
                calendar_id: "primary".to_string(),
                access_token: String::new().into(),
                timezone: "America/Sao_Paulo".to_string(),
                timeout_secs: 10,
                max_retries: 1,
            },
            llm: LlmConfig {
                provider: LlmProvider::Offline,
                api_key: None,
                base_url: None,
                model: "gpt-4o-mini".to_string(),
                timeout_secs: 15,
                max_retries: 2,
            },
            clinic: ClinicConfig {
                listing_limit: 10,
                collection_max_idle_turns: 8,
                history_window: 6,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            "offline" => Ok(Self::Offline),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|ollama|offline)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    whatsapp: Option<WhatsAppPatch>,
    calendar: Option<CalendarPatch>,
    llm: Option<LlmPatch>,
    clinic: Option<ClinicPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct WhatsAppPatch {
    enabled: Option<bool>,
    access_token: Option<String>,
    verify_token: Option<String>,
    app_secret: Option<String>,
    phone_number_id: Option<String>,
    api_base_url: Option<String>,
    operator_wa_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CalendarPatch {
    base_url: Option<String>,
    calendar_id: Option<String>,
    access_token: Option<String>,
    timezone: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ClinicPatch {
    listing_limit: Option<u32>,
    collection_max_idle_turns: Option<u32>,
    history_window: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("frontdesk.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(whatsapp) = patch.whatsapp {
            if let Some(enabled) = whatsapp.enabled {
                self.whatsapp.enabled = enabled;
            }
            if let Some(token) = whatsapp.access_token {
                self.whatsapp.access_token = token.into();
            }
            if let Some(token) = whatsapp.verify_token {
                self.whatsapp.verify_token = token;
            }
            if let Some(secret) = whatsapp.app_secret {
                self.whatsapp.app_secret = secret.into();
            }
            if let Some(id) = whatsapp.phone_number_id {
                self.whatsapp.phone_number_id = id;
            }
            if let Some(url) = whatsapp.api_base_url {
                self.whatsapp.api_base_url = url;
            }
            if let Some(operator) = whatsapp.operator_wa_id {
                self.whatsapp.operator_wa_id = Some(operator);
            }
        }

        if let Some(calendar) = patch.calendar {
            if let Some(url) = calendar.base_url {
                self.calendar.base_url = url;
            }
            if let Some(id) = calendar.calendar_id {
                self.calendar.calendar_id = id;
            }
            if let Some(token) = calendar.access_token {
                self.calendar.access_token = token.into();
            }
            if let Some(timezone) = calendar.timezone {
                self.calendar.timezone = timezone;
            }
            if let Some(timeout_secs) = calendar.timeout_secs {
                self.calendar.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = calendar.max_retries {
                self.calendar.max_retries = max_retries;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(api_key.into());
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(clinic) = patch.clinic {
            if let Some(listing_limit) = clinic.listing_limit {
                self.clinic.listing_limit = listing_limit;
            }
            if let Some(max_idle) = clinic.collection_max_idle_turns {
                self.clinic.collection_max_idle_turns = max_idle;
            }
            if let Some(history_window) = clinic.history_window {
                self.clinic.history_window = history_window;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(url) = env::var("FRONTDESK_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(level) = env::var("FRONTDESK_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = env::var("FRONTDESK_LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }
        if let Ok(provider) = env::var("FRONTDESK_LLM_PROVIDER") {
            self.llm.provider = provider.parse()?;
        }
        if let Ok(api_key) = env::var("FRONTDESK_LLM_API_KEY") {
            self.llm.api_key = Some(api_key.into());
        }
        if let Ok(model) = env::var("FRONTDESK_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Ok(value) = env::var("FRONTDESK_WA_ENABLED") {
            self.whatsapp.enabled = parse_bool("FRONTDESK_WA_ENABLED", &value)?;
        }
        if let Ok(token) = env::var("FRONTDESK_WA_ACCESS_TOKEN") {
            self.whatsapp.access_token = token.into();
        }
        if let Ok(token) = env::var("FRONTDESK_WA_VERIFY_TOKEN") {
            self.whatsapp.verify_token = token;
        }
        if let Ok(secret) = env::var("FRONTDESK_WA_APP_SECRET") {
            self.whatsapp.app_secret = secret.into();
        }
        if let Ok(id) = env::var("FRONTDESK_WA_PHONE_NUMBER_ID") {
            self.whatsapp.phone_number_id = id;
        }
        if let Ok(url) = env::var("FRONTDESK_CALENDAR_BASE_URL") {
            self.calendar.base_url = url;
        }
        if let Ok(id) = env::var("FRONTDESK_CALENDAR_ID") {
            self.calendar.calendar_id = id;
        }
        if let Ok(token) = env::var("FRONTDESK_CALENDAR_TOKEN") {
            self.calendar.access_token = token.into();
        }
        if let Ok(address) = env::var("FRONTDESK_BIND_ADDRESS") {
            self.server.bind_address = address;
        }
        if let Ok(port) = env::var("FRONTDESK_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: "FRONTDESK_PORT".to_string(),
                value: port,
            })?;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(url) = overrides.database_url {
            self.database.url = url;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if let Some(provider) = overrides.llm_provider {
            self.llm.provider = provider;
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(enabled) = overrides.whatsapp_enabled {
            self.whatsapp.enabled = enabled;
        }
        if let Some(token) = overrides.whatsapp_access_token {
            self.whatsapp.access_token = token.into();
        }
        if let Some(token) = overrides.whatsapp_verify_token {
            self.whatsapp.verify_token = token;
        }
        if let Some(secret) = overrides.whatsapp_app_secret {
            self.whatsapp.app_secret = secret.into();
        }
        if let Some(id) = overrides.whatsapp_phone_number_id {
            self.whatsapp.phone_number_id = id;
        }
        if let Some(url) = overrides.calendar_base_url {
            self.calendar.base_url = url;
        }
        if let Some(token) = overrides.calendar_access_token {
            self.calendar.access_token = token.into();
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database.url must not be empty".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.clinic.listing_limit == 0 {
            return Err(ConfigError::Validation(
                "clinic.listing_limit must be at least 1".to_string(),
            ));
        }
        if self.clinic.collection_max_idle_turns == 0 {
            return Err(ConfigError::Validation(
                "clinic.collection_max_idle_turns must be at least 1".to_string(),
            ));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Validation("server.port must not be 0".to_string()));
        }
        if self.whatsapp.enabled {
            if self.whatsapp.access_token.expose_secret().is_empty() {
                return Err(ConfigError::Validation(
                    "whatsapp.access_token is required when whatsapp is enabled".to_string(),
                ));
            }
            if self.whatsapp.verify_token.is_empty() {
                return Err(ConfigError::Validation(
                    "whatsapp.verify_token is required when whatsapp is enabled".to_string(),
                ));
            }
            if self.whatsapp.app_secret.expose_secret().is_empty() {
                return Err(ConfigError::Validation(
                    "whatsapp.app_secret is required when whatsapp is enabled".to_string(),
                ));
            }
            if self.whatsapp.phone_number_id.is_empty() {
                return Err(ConfigError::Validation(
                    "whatsapp.phone_number_id is required when whatsapp is enabled".to_string(),
                ));
            }
        }
        if self.llm.provider == LlmProvider::OpenAi && self.llm.api_key.is_none() {
            return Err(ConfigError::Validation(
                "llm.api_key is required for the openai provider".to_string(),
            ));
        }
        Ok(())
    }

    /// Effective configuration with secrets redacted, for operator tooling.
    pub fn redacted(&self) -> serde_json::Value {
        serde_json::json!({
            "database": {
                "url": self.database.url,
                "max_connections": self.database.max_connections,
                "timeout_secs": self.database.timeout_secs,
            },
            "whatsapp": {
                "enabled": self.whatsapp.enabled,
                "access_token": redact(self.whatsapp.access_token.expose_secret()),
                "verify_token": redact(&self.whatsapp.verify_token),
                "app_secret": redact(self.whatsapp.app_secret.expose_secret()),
                "phone_number_id": self.whatsapp.phone_number_id,
                "api_base_url": self.whatsapp.api_base_url,
                "operator_wa_id": self.whatsapp.operator_wa_id,
            },
            "calendar": {
                "base_url": self.calendar.base_url,
                "calendar_id": self.calendar.calendar_id,
                "access_token": redact(self.calendar.access_token.expose_secret()),
                "timezone": self.calendar.timezone,
                "timeout_secs": self.calendar.timeout_secs,
                "max_retries": self.calendar.max_retries,
            },
            "llm": {
                "provider": format!("{:?}", self.llm.provider).to_lowercase(),
                "api_key": self.llm.api_key.as_ref().map(|key| redact(key.expose_secret())),
                "base_url": self.llm.base_url,
                "model": self.llm.model,
                "timeout_secs": self.llm.timeout_secs,
                "max_retries": self.llm.max_retries,
            },
            "clinic": {
                "listing_limit": self.clinic.listing_limit,
                "collection_max_idle_turns": self.clinic.collection_max_idle_turns,
                "history_window": self.clinic.history_window,
            },
            "server": {
                "bind_address": self.server.bind_address,
                "port": self.server.port,
                "graceful_shutdown_secs": self.server.graceful_shutdown_secs,
            },
            "logging": {
                "level": self.logging.level,
                "format": format!("{:?}", self.logging.format).to_lowercase(),
            },
        })
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        "(unset)"
    } else {
        "(redacted)"
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }),
    }
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }
    if let Ok(from_env) = env::var("FRONTDESK_CONFIG") {
        let path = PathBuf::from(from_env);
        return path.exists().then_some(path);
    }
    let default = PathBuf::from("frontdesk.toml");
    default.exists().then_some(default)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use secrecy::ExposeSecret;

    use super::{AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions, LogFormat};

    #[test]
    fn defaults_validate_cleanly() {
        let config = AppConfig::load(LoadOptions::default()).expect("defaults load");
        assert_eq!(config.clinic.listing_limit, 10);
        assert_eq!(config.clinic.collection_max_idle_turns, 8);
        assert_eq!(config.llm.provider, LlmProvider::Offline);
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn file_patch_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "[database]\nurl = \"sqlite::memory:\"\n\n[clinic]\nlisting_limit = 3\n\n[whatsapp]\nverify_token = \"hook-token\""
        )
        .expect("write patch");

        let config = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            overrides: ConfigOverrides::default(),
        })
        .expect("load with patch");

        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.clinic.listing_limit, 3);
        assert_eq!(config.whatsapp.verify_token, "hook-token");
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let result = AppConfig::load(LoadOptions {
            config_path: Some("does-not-exist.toml".into()),
            require_file: true,
            overrides: ConfigOverrides::default(),
        });

        assert!(matches!(result, Err(ConfigError::MissingConfigFile(_))));
    }

    #[test]
    fn enabling_whatsapp_without_tokens_fails_validation() {
        let result = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                whatsapp_enabled: Some(true),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });

        let message = result.err().expect("validation error").to_string();
        assert!(message.contains("whatsapp.access_token"));
    }

    #[test]
    fn openai_provider_requires_an_api_key() {
        let result = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                llm_provider: Some(LlmProvider::OpenAi),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });

        let message = result.err().expect("validation error").to_string();
        assert!(message.contains("llm.api_key"));
    }

    #[test]
    fn overrides_win_over_defaults_and_secrets_are_redacted() {
        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                whatsapp_access_token: Some("wa-token".to_string()),
                database_url: Some("sqlite::memory:".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("load with overrides");

        assert_eq!(config.whatsapp.access_token.expose_secret(), "wa-token");

        let redacted = config.redacted();
        assert_eq!(redacted["whatsapp"]["access_token"], "(redacted)");
        assert_eq!(redacted["database"]["url"], "sqlite::memory:");
    }
}
