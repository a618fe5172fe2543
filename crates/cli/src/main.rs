use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    frontdesk_cli::run().await
}
