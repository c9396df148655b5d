//! # email-code
//!
//! Async IMAP helper that logs into a mailbox and waits for a confirmation-code
//! email to arrive.
//!
//! This crate provides:
//! - Mailbox login over TLS, directly or tunneled through an HTTP proxy with `CONNECT`
//! - IMAP host discovery from the email domain ([`ServerRegistry`])
//! - A polling loop that scans the inbox newest-first for a confirmation code,
//!   with a cutoff timestamp and an overall timeout
//!
//! ## Quick Start
//!
//! ```no_run
//! use email_code::{login, wait_for_code, LoginConfig};
//! use chrono::Utc;
//!
//! # async fn example() -> email_code::Result<()> {
//! let config = LoginConfig::builder().build()?;
//! let started = Utc::now();
//!
//! let mut session = login("user@outlook.com", "app-password", &config).await?;
//! let code = wait_for_code(&mut session, "user@outlook.com", Some(started), &config.polling).await?;
//! println!("Got code: {code}");
//!
//! session.logout().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Using an HTTP Proxy
//!
//! ```no_run
//! use email_code::{login, LoginConfig};
//!
//! # async fn example() -> email_code::Result<()> {
//! let config = LoginConfig::builder()
//!     .imap_proxy_host("proxy.example.com")
//!     .imap_proxy_port(8080)
//!     .imap_proxy_user("user")
//!     .imap_proxy_pass("pass")
//!     .build()?;
//!
//! let session = login("user@yahoo.com", "app-password", &config).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Timeout Configuration
//!
//! The code wait gives up after 30 seconds by default. The
//! `TWS_WAIT_EMAIL_CODE` environment variable (or its legacy alias
//! `LOGIN_CODE_TIMEOUT`) overrides this with a number of seconds.
//!
//! ## RAII Guard for Automatic Cleanup
//!
//! ```no_run
//! use email_code::{login, LoginConfig, MailboxGuard};
//!
//! # async fn example() -> email_code::Result<()> {
//! # let config = LoginConfig::builder().build()?;
//! let session = login("user@icloud.com", "app-password", &config).await?;
//! let mut guard = MailboxGuard::new(session, config.polling.clone());
//!
//! let code = guard.wait_for_code(None).await?;
//! // Guard logs out when dropped, even if the task is cancelled mid-wait
//! # Ok(())
//! # }
//! ```
//!
//! ## Observability
//!
//! The crate uses `tracing` for instrumentation. Spans:
//!
//! - `login` - connect, authenticate and select the inbox
//! - `wait_for_code` - the polling loop
//! - `scanner::scan_for_code` - one pass over the inbox
//! - `proxy::open_tunnel` - HTTP CONNECT negotiation
//! - `connection::establish_tls` - TLS handshake
//! - `session::authenticate`, `session::select`, `session::close`, `session::logout`

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
pub mod config;
pub mod error;
pub mod known_servers;
pub mod matcher;
pub mod parser;
pub mod proxy;
pub mod scanner;
pub mod session;

// Internal modules
mod client;
mod connection;

// Re-exports for ergonomic API
pub use client::{login, wait_for_code, wait_for_code_with, MailboxGuard};
pub use config::{LoginConfig, LoginConfigBuilder, PollingConfig, TimeoutConfig};
pub use error::{Error, ErrorCategory, Result};
pub use known_servers::ServerRegistry;
pub use parser::ParsedMessage;
pub use proxy::{HttpProxy, ProxyAuth};
pub use session::{Mailbox, MailboxSession};
