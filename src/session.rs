//! IMAP session management.
//!
//! [`Mailbox`] is the set of operations the code search needs. [`MailboxSession`]
//! implements it over an authenticated async-imap session; tests and callers
//! with other backends can provide their own implementation.

use crate::config::TimeoutConfig;
use crate::connection::TlsStream;
use crate::error::{Error, Result};
use async_imap::types::Fetch;
use async_imap::Session;
use futures::TryStreamExt;
use std::future::Future;
use tracing::{debug, instrument};

/// Name of the folder the codes arrive in.
pub const INBOX: &str = "INBOX";

/// Fetch data item requesting the full message.
const FETCH_QUERY: &str = "BODY[]";

/// Type alias for IMAP session over TLS.
pub(crate) type ImapSession = Session<TlsStream>;

/// Mailbox operations used by the code search.
///
/// Lifecycle: `select_inbox` before any `fetch`; `close` leaves the selected
/// folder; `logout` ends the session. Callers re-select before closing, even
/// on error paths.
pub trait Mailbox: Send {
    /// Selects the inbox and returns its message count.
    fn select_inbox(&mut self, read_only: bool) -> impl Future<Output = Result<u32>> + Send;

    /// Fetches message `index` (1-based sequence number).
    ///
    /// Returns the raw RFC 5322 bytes of every message part in the reply;
    /// reply items without message data are left out.
    fn fetch(&mut self, index: u32) -> impl Future<Output = Result<Vec<Vec<u8>>>> + Send;

    /// Closes the selected folder.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Ends the session. The default does nothing.
    fn logout(&mut self) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }
}

/// An authenticated IMAP session bound to one TLS connection.
///
/// Created by [`login`](crate::login). Valid until [`logout`](Self::logout).
pub struct MailboxSession {
    session: Box<ImapSession>,
    email: String,
    imap_host: String,
    timeouts: TimeoutConfig,
}

impl MailboxSession {
    /// Returns the email address this session is logged in as.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the IMAP host this session is connected to.
    #[must_use]
    pub fn imap_host(&self) -> &str {
        &self.imap_host
    }

    /// Logs out and ends the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the logout command fails or times out.
    #[instrument(name = "session::logout", skip(self), fields(email = %self.email))]
    pub async fn logout(&mut self) -> Result<()> {
        debug!("Logging out");
        let timeout = self.timeouts.logout;

        tokio::time::timeout(timeout, self.session.logout())
            .await
            .map_err(|_| Error::LogoutTimeout { timeout })?
            .map_err(|source| Error::ImapLogout { source })
    }
}

impl Mailbox for MailboxSession {
    #[instrument(name = "session::select", skip(self), fields(mailbox = INBOX))]
    async fn select_inbox(&mut self, read_only: bool) -> Result<u32> {
        let timeout = self.timeouts.select;
        let session = &mut self.session;

        let selected = tokio::time::timeout(timeout, async {
            if read_only {
                session.examine(INBOX).await
            } else {
                session.select(INBOX).await
            }
        })
        .await
        .map_err(|_| Error::SelectTimeout {
            mailbox: INBOX.to_string(),
            timeout,
        })?
        .map_err(|source| Error::SelectMailbox {
            mailbox: INBOX.to_string(),
            source,
        })?;

        debug!(exists = selected.exists, "Selected mailbox");
        Ok(selected.exists)
    }

    async fn fetch(&mut self, index: u32) -> Result<Vec<Vec<u8>>> {
        let timeout = self.timeouts.fetch;

        tokio::time::timeout(timeout, fetch_bodies(&mut self.session, index))
            .await
            .map_err(|_| Error::FetchTimeout { index, timeout })?
    }

    #[instrument(name = "session::close", skip(self))]
    async fn close(&mut self) -> Result<()> {
        let timeout = self.timeouts.close;

        tokio::time::timeout(timeout, self.session.close())
            .await
            .map_err(|_| Error::CloseTimeout { timeout })?
            .map_err(|source| Error::ImapClose { source })
    }

    async fn logout(&mut self) -> Result<()> {
        MailboxSession::logout(self).await
    }
}

impl std::fmt::Debug for MailboxSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailboxSession")
            .field("email", &self.email)
            .field("imap_host", &self.imap_host)
            .finish_non_exhaustive()
    }
}

/// Authenticates to the IMAP server and returns a session.
#[instrument(
    name = "session::authenticate",
    skip_all,
    fields(email = %email, imap_host = %imap_host)
)]
pub(crate) async fn authenticate(
    tls_stream: TlsStream,
    email: &str,
    password: &str,
    imap_host: &str,
    timeouts: &TimeoutConfig,
) -> Result<MailboxSession> {
    let client = async_imap::Client::new(tls_stream);

    debug!("Authenticating to IMAP server");

    let session = tokio::time::timeout(timeouts.auth, client.login(email, password))
        .await
        .map_err(|_| Error::AuthTimeout {
            email: email.to_string(),
            timeout: timeouts.auth,
        })?
        .map_err(|e| Error::MailboxLogin {
            email: email.to_string(),
            domain: imap_host.to_string(),
            source: e.0,
        })?;

    Ok(MailboxSession {
        session: Box::new(session),
        email: email.to_string(),
        imap_host: imap_host.to_string(),
        timeouts: timeouts.clone(),
    })
}

/// Fetches one message and keeps the parts that carry message data.
async fn fetch_bodies(session: &mut ImapSession, index: u32) -> Result<Vec<Vec<u8>>> {
    let stream = session
        .fetch(index.to_string(), FETCH_QUERY)
        .await
        .map_err(|source| Error::ImapFetch { index, source })?;

    let fetches: Vec<Fetch> = stream
        .try_collect()
        .await
        .map_err(|source| Error::FetchMessage { source })?;

    let bodies: Vec<Vec<u8>> = fetches
        .iter()
        .filter_map(|fetch| fetch.body().map(<[u8]>::to_vec))
        .collect();

    debug!(index, parts = bodies.len(), "Fetched message");
    Ok(bodies)
}
