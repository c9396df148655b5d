//! Example: Wait for a confirmation code with tracing enabled.
//!
//! Every step (tunnel, TLS, login, each polling round) emits tracing spans
//! and events; this example prints them to stderr.
//!
//! # Usage
//!
//! ```bash
//! export EMAIL_ADDRESS="your@email.com"
//! export EMAIL_PASSWORD="your-app-password"
//! # Seconds to wait for the code (default 30)
//! export TWS_WAIT_EMAIL_CODE=60
//! # Set log level (trace, debug, info, warn, error)
//! export RUST_LOG=email_code=debug
//!
//! cargo run --example wait_for_code
//! ```

use chrono::Utc;
use email_code::{login, LoginConfig, MailboxGuard};
use std::env;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> email_code::Result<()> {
    // Use RUST_LOG to control log levels, e.g. RUST_LOG=email_code=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("email_code=info")),
        )
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let email = env::var("EMAIL_ADDRESS").expect("EMAIL_ADDRESS environment variable required");
    let password =
        env::var("EMAIL_PASSWORD").expect("EMAIL_PASSWORD environment variable required");

    // Polling timeout comes from TWS_WAIT_EMAIL_CODE / LOGIN_CODE_TIMEOUT
    let config = LoginConfig::builder().build()?;
    tracing::info!(
        email = %email,
        timeout_secs = config.polling.timeout.as_secs(),
        "Starting email-code example"
    );

    let started = Utc::now();
    let session = login(&email, &password, &config).await?;
    let mut guard = MailboxGuard::new(session, config.polling.clone());

    tracing::info!("Logged in, trigger the confirmation email now");

    match guard.wait_for_code(Some(started)).await {
        Ok(code) => {
            tracing::info!(code = %code, "Found confirmation code");
            println!("\nGot code: {code}");
        }
        Err(e) => {
            tracing::warn!(error = %e, category = %e.category(), "No confirmation code");
            println!("\nNo code: {e}");
        }
    }

    guard.logout().await?;

    tracing::info!("Example completed successfully");
    Ok(())
}
