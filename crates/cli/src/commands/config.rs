use frontdesk_core::config::{AppConfig, LoadOptions};

use super::CommandResult;

pub fn run(options: LoadOptions) -> CommandResult {
    match AppConfig::load(options) {
        Ok(config) => {
            let redacted = config.redacted();
            CommandResult::plain(
                serde_json::to_string_pretty(&redacted).unwrap_or_else(|_| redacted.to_string()),
            )
        }
        Err(error) => CommandResult::failure("config", "config", error.to_string(), 2),
    }
}
