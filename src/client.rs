//! Mailbox login and the confirmation-code wait loop.
//!
//! # Example
//!
//! ```no_run
//! use email_code::{login, wait_for_code, LoginConfig};
//! use chrono::Utc;
//!
//! # async fn example() -> email_code::Result<()> {
//! let config = LoginConfig::builder().build()?;
//! let started = Utc::now();
//!
//! let mut session = login("user@icloud.com", "app-password", &config).await?;
//! // ... trigger the confirmation email ...
//! let code = wait_for_code(&mut session, "user@icloud.com", Some(started), &config.polling).await?;
//! println!("Got code: {code}");
//!
//! session.logout().await?;
//! # Ok(())
//! # }
//! ```

use crate::config::{LoginConfig, PollingConfig};
use crate::connection::Transport;
use crate::error::{Error, Result};
use crate::matcher::{CodeMatcher, ConfirmationCodeMatcher};
use crate::scanner::scan_for_code;
use crate::session::{self, Mailbox, MailboxSession};
use chrono::{DateTime, Utc};
use email_address::EmailAddress;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn, Span};

/// Logs into the mailbox for `email` and selects the inbox read-only.
///
/// The IMAP host is resolved from the email domain unless the config sets
/// one. When the config has a proxy, the connection is tunneled through it
/// with HTTP CONNECT before the TLS handshake.
///
/// # Errors
///
/// - [`Error::InvalidEmailFormat`] for a malformed address
/// - [`Error::Tunnel`], [`Error::TcpConnect`], [`Error::TlsConnect`],
///   [`Error::ConnectTimeout`] when the connection cannot be established
/// - [`Error::MailboxLogin`] when authentication or inbox selection is refused
#[instrument(
    name = "login",
    skip_all,
    fields(
        email = %email,
        imap_host = tracing::field::Empty,
        proxy_enabled = config.proxy().is_some()
    )
)]
pub async fn login(email: &str, password: &str, config: &LoginConfig) -> Result<MailboxSession> {
    validate_email(email)?;

    let imap_host = config.imap_host_for(email)?;
    Span::current().record("imap_host", imap_host.as_str());

    let transport = Transport::new(config.proxy().cloned(), config.tls_config.clone());
    let connect_timeout = config.timeouts.connect;

    let tls_stream = tokio::time::timeout(
        connect_timeout,
        transport.connect(&imap_host, config.imap_port),
    )
    .await
    .map_err(|_| Error::ConnectTimeout {
        target: format!("{imap_host}:{}", config.imap_port),
        timeout: connect_timeout,
    })??;

    debug!("TLS connection established");

    let mut session =
        session::authenticate(tls_stream, email, password, &imap_host, &config.timeouts)
            .await
            .inspect_err(|e| log_login_failure(email, &imap_host, e))?;

    select_after_login(&mut session, email, &imap_host).await?;
    Ok(session)
}

/// Selects the inbox read-only right after authentication.
///
/// Any failure is logged with the email and domain and the session is logged
/// out before the error is returned; a refused select becomes
/// [`Error::MailboxLogin`].
async fn select_after_login<M: Mailbox>(
    mailbox: &mut M,
    email: &str,
    imap_host: &str,
) -> Result<()> {
    let err = match mailbox.select_inbox(true).await {
        Ok(count) => {
            debug!(count, "Logged in and selected INBOX");
            return Ok(());
        }
        Err(Error::SelectMailbox { source, .. }) => Error::MailboxLogin {
            email: email.to_string(),
            domain: imap_host.to_string(),
            source,
        },
        Err(e) => e,
    };

    log_login_failure(email, imap_host, &err);
    if let Err(e) = mailbox.logout().await {
        debug!(error = %e, "Logout after failed select also failed");
    }
    Err(err)
}

/// Polls the inbox until a confirmation code arrives or the timeout passes.
///
/// Uses [`ConfirmationCodeMatcher::default`]. See [`wait_for_code_with`].
///
/// # Errors
///
/// Returns [`Error::CodeTimeout`] when no code arrives in time, or the first
/// error raised while scanning.
pub async fn wait_for_code<M: Mailbox>(
    mailbox: &mut M,
    email: &str,
    min_t: Option<DateTime<Utc>>,
    polling: &PollingConfig,
) -> Result<String> {
    let matcher = ConfirmationCodeMatcher::default();
    wait_for_code_with(mailbox, email, min_t, polling, &matcher).await
}

/// Polls the inbox until `matcher` finds a code or the timeout passes.
///
/// Each round re-selects the inbox for a fresh message count and scans it
/// newest-first, skipping messages older than `min_t`. Between rounds the
/// task sleeps for `polling.interval`.
///
/// Whatever the outcome, the inbox is re-selected and closed before this
/// returns. Cleanup failures are logged and never replace the outcome.
///
/// # Errors
///
/// Returns [`Error::CodeTimeout`] when no code arrives in time, or the first
/// error raised while scanning.
#[instrument(
    name = "wait_for_code",
    skip(mailbox, polling, matcher),
    fields(
        matcher = %matcher.description(),
        timeout_secs = polling.timeout.as_secs()
    )
)]
pub async fn wait_for_code_with<M: Mailbox>(
    mailbox: &mut M,
    email: &str,
    min_t: Option<DateTime<Utc>>,
    polling: &PollingConfig,
    matcher: &dyn CodeMatcher,
) -> Result<String> {
    let mut release_pending = false;
    wait_and_release(mailbox, email, min_t, polling, matcher, &mut release_pending).await
}

/// Polls, then releases the inbox.
///
/// `release_pending` is true only while polling: once the release starts, a
/// cancelled caller must not run it again.
async fn wait_and_release<M: Mailbox>(
    mailbox: &mut M,
    email: &str,
    min_t: Option<DateTime<Utc>>,
    polling: &PollingConfig,
    matcher: &dyn CodeMatcher,
    release_pending: &mut bool,
) -> Result<String> {
    info!("Waiting for confirmation code for {email}...");

    *release_pending = true;
    let outcome = poll_for_code(mailbox, min_t, polling, matcher).await;
    *release_pending = false;
    release_inbox(mailbox).await;

    match &outcome {
        Ok(_) => info!("Confirmation code received"),
        Err(e) => warn!(error = %e, "Gave up waiting for confirmation code"),
    }
    outcome
}

async fn poll_for_code<M: Mailbox>(
    mailbox: &mut M,
    min_t: Option<DateTime<Utc>>,
    polling: &PollingConfig,
    matcher: &dyn CodeMatcher,
) -> Result<String> {
    let started = Instant::now();

    loop {
        let count = mailbox.select_inbox(true).await?;
        if let Some(code) = scan_for_code(mailbox, count, min_t, matcher).await? {
            return Ok(code);
        }

        if started.elapsed() > polling.timeout {
            return Err(Error::CodeTimeout {
                timeout: polling.timeout,
            });
        }

        debug!(
            elapsed_secs = started.elapsed().as_secs(),
            "No code yet, sleeping"
        );
        tokio::time::sleep(polling.interval).await;
    }
}

/// Re-selects the inbox and closes it. Best effort.
async fn release_inbox<M: Mailbox>(mailbox: &mut M) {
    if let Err(e) = mailbox.select_inbox(true).await {
        warn!(error = %e, "Failed to re-select INBOX before close");
    }
    if let Err(e) = mailbox.close().await {
        warn!(error = %e, "Failed to close INBOX");
    }
}

fn log_login_failure(email: &str, imap_host: &str, err: &Error) {
    error!(email, domain = imap_host, error = %err, "Error logging into mailbox");
}

fn validate_email(email: &str) -> Result<()> {
    EmailAddress::parse_with_options(email, email_address::Options::default())
        .map(|_| ())
        .map_err(|_| Error::InvalidEmailFormat {
            email: email.to_string(),
        })
}

/// RAII guard for a [`Mailbox`] that logs out on drop.
///
/// If the guard is dropped while [`wait_for_code`](Self::wait_for_code) is
/// still polling (the enclosing task was cancelled), the inbox is re-selected
/// and closed before the logout.
pub struct MailboxGuard<M: Mailbox + 'static = MailboxSession> {
    inner: Option<M>,
    email: String,
    polling: PollingConfig,
    release_pending: bool,
}

impl MailboxGuard<MailboxSession> {
    /// Wraps a logged-in session; waits use `polling`.
    #[must_use]
    pub fn new(session: MailboxSession, polling: PollingConfig) -> Self {
        let email = session.email().to_string();
        Self::from_mailbox(session, email, polling)
    }
}

impl<M: Mailbox + 'static> MailboxGuard<M> {
    /// Wraps any mailbox backend logged in as `email`.
    #[must_use]
    pub fn from_mailbox(mailbox: M, email: impl Into<String>, polling: PollingConfig) -> Self {
        Self {
            inner: Some(mailbox),
            email: email.into(),
            polling,
            release_pending: false,
        }
    }

    /// Waits for a confirmation code. See [`wait_for_code`](crate::wait_for_code).
    ///
    /// # Panics
    ///
    /// Panics if the guard has already been consumed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CodeTimeout`] or the first scan error.
    #[instrument(
        name = "wait_for_code",
        skip(self),
        fields(email = %self.email, timeout_secs = self.polling.timeout.as_secs())
    )]
    pub async fn wait_for_code(&mut self, min_t: Option<DateTime<Utc>>) -> Result<String> {
        let mailbox = self.inner.as_mut().expect("guard already consumed");
        let matcher = ConfirmationCodeMatcher::default();

        wait_and_release(
            mailbox,
            &self.email,
            min_t,
            &self.polling,
            &matcher,
            &mut self.release_pending,
        )
        .await
    }

    /// Explicitly logs out and consumes the guard.
    ///
    /// # Errors
    ///
    /// Returns an error if the logout command fails.
    pub async fn logout(mut self) -> Result<()> {
        match self.inner.take() {
            Some(mut mailbox) => mailbox.logout().await,
            None => Ok(()),
        }
    }

    /// Returns the email address of the guarded mailbox.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }
}

impl<M: Mailbox + 'static> Drop for MailboxGuard<M> {
    fn drop(&mut self) {
        let Some(mut mailbox) = self.inner.take() else {
            return;
        };
        let release = self.release_pending;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if release {
                        release_inbox(&mut mailbox).await;
                    }
                    match mailbox.logout().await {
                        Ok(()) => debug!("Session logged out"),
                        Err(e) => warn!(error = %e, "Session logout failed"),
                    }
                });
            }
            Err(_) => {
                warn!(
                    "MailboxGuard dropped outside of tokio runtime context. \
                     Connection will be closed without IMAP CLOSE/LOGOUT. \
                     Consider calling .logout().await explicitly before dropping."
                );
            }
        }
    }
}

impl<M: Mailbox + 'static> std::fmt::Debug for MailboxGuard<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailboxGuard")
            .field("email", &self.email)
            .field("active", &self.inner.is_some())
            .field("release_pending", &self.release_pending)
            .finish_non_exhaustive()
    }
}
