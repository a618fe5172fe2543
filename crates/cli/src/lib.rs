pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use frontdesk_core::config::LoadOptions;

#[derive(Debug, Parser)]
#[command(
    name = "frontdesk",
    about = "Frontdesk operator CLI",
    long_about = "Operate frontdesk migrations, readiness checks, config inspection, and a local chat simulator.",
    after_help = "Examples:\n  frontdesk doctor --json\n  frontdesk config\n  frontdesk chat"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Validate config, database connectivity, and channel/LLM readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Inspect effective configuration values with secrets redacted")]
    Config,
    #[command(about = "Chat with the assistant locally over in-memory backends")]
    Chat {
        #[arg(long, help = "Send a single message instead of starting the interactive loop")]
        message: Option<String>,
    },
}

pub async fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions::default();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(options).await,
        Command::Doctor { json } => commands::doctor::run(options, json).await,
        Command::Config => commands::config::run(options),
        Command::Chat { message } => commands::chat::run(message).await,
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
