//! Error types for the email-code crate.
//!
//! All errors implement [`std::error::Error`] and carry enough context to
//! diagnose the failing step. Use [`Error::category`] for metrics and
//! [`Error::is_retryable`] as a hint for caller-side retry policies; nothing
//! inside this crate retries an error on its own.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while logging in or waiting for a confirmation code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────
    // Configuration / validation errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Invalid email address format.
    #[error("invalid email format: {email}")]
    InvalidEmailFormat {
        /// The invalid email address.
        email: String,
    },

    /// Invalid configuration provided.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// Invalid DNS name for TLS.
    #[error("invalid DNS name for host '{host}'")]
    InvalidDnsName {
        /// The invalid hostname.
        host: String,
        /// The underlying DNS name error.
        #[source]
        source: rustls::client::InvalidDnsNameError,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Network / transport errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Failed to establish TCP connection (to the proxy or the mail server).
    #[error("failed to connect to {target}")]
    TcpConnect {
        /// The target address that failed.
        target: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The proxy answered the CONNECT request with something other than success.
    #[error("failed to establish a tunnel through {proxy}: {response}")]
    Tunnel {
        /// The proxy address.
        proxy: String,
        /// The raw proxy response, kept for diagnostics.
        response: String,
    },

    /// I/O failure while sending the CONNECT request or reading the reply.
    #[error("I/O error while negotiating tunnel through {proxy}")]
    TunnelIo {
        /// The proxy address.
        proxy: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to establish TLS session with the mail server.
    #[error("failed to establish TLS connection to {target}")]
    TlsConnect {
        /// The target address that failed.
        target: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Timeout errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Connection (TCP + tunnel + TLS) timeout.
    #[error("connection timeout to {target} after {timeout:?}")]
    ConnectTimeout {
        /// The target address.
        target: String,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Authentication timeout.
    #[error("authentication timeout for {email} after {timeout:?}")]
    AuthTimeout {
        /// The email address used for authentication.
        email: String,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Mailbox selection timeout.
    #[error("mailbox selection timeout for '{mailbox}' after {timeout:?}")]
    SelectTimeout {
        /// The mailbox name.
        mailbox: String,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Message fetch timeout.
    #[error("message fetch timeout for message {index} after {timeout:?}")]
    FetchTimeout {
        /// The message sequence number being fetched.
        index: u32,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Mailbox close timeout.
    #[error("mailbox close timeout after {timeout:?}")]
    CloseTimeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// No confirmation code arrived within the configured window.
    #[error("email code timeout ({} sec)", timeout.as_secs())]
    CodeTimeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Logout timeout (not critical).
    #[error("logout timeout after {timeout:?}")]
    LogoutTimeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // IMAP protocol errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Login or initial inbox selection failed.
    #[error("error logging into {email} on {domain}")]
    MailboxLogin {
        /// The email address used for login.
        email: String,
        /// The mail server hostname.
        domain: String,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// Failed to select mailbox.
    #[error("failed to select mailbox '{mailbox}'")]
    SelectMailbox {
        /// The mailbox name.
        mailbox: String,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// IMAP fetch failed.
    #[error("IMAP fetch failed for message {index}")]
    ImapFetch {
        /// The message sequence number that failed.
        index: u32,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// Failed to read a fetched message from the response stream.
    #[error("failed to fetch message from stream")]
    FetchMessage {
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// IMAP CLOSE failed.
    #[error("IMAP close failed")]
    ImapClose {
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// IMAP logout failed.
    #[error("IMAP logout failed")]
    ImapLogout {
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Message parsing errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Failed to parse message headers.
    #[error("failed to parse email")]
    ParseEmail {
        /// The underlying parse error.
        #[source]
        source: mailparse::MailParseError,
    },

    /// The `Date` header is missing or does not follow RFC 5322 layout.
    #[error("failed to parse message date '{value}'")]
    ParseDate {
        /// The date text after comment stripping.
        value: String,
        /// The underlying chrono error.
        #[source]
        source: chrono::ParseError,
    },
}

impl Error {
    /// Returns `true` if this error represents a transient failure that might succeed on retry.
    ///
    /// Proxy, TLS and login failures are treated as permanent for the attempt:
    /// credentials and network route do not change between tries.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::TcpConnect { .. }
            | Error::TunnelIo { .. }
            | Error::ConnectTimeout { .. }
            | Error::AuthTimeout { .. }
            | Error::SelectTimeout { .. }
            | Error::FetchTimeout { .. }
            | Error::SelectMailbox { .. }
            | Error::ImapFetch { .. }
            | Error::FetchMessage { .. } => true,

            Error::InvalidEmailFormat { .. }
            | Error::InvalidConfig { .. }
            | Error::InvalidDnsName { .. }
            | Error::Tunnel { .. }
            | Error::TlsConnect { .. }
            | Error::CloseTimeout { .. }
            | Error::CodeTimeout { .. }
            | Error::LogoutTimeout { .. }
            | Error::MailboxLogin { .. }
            | Error::ImapClose { .. }
            | Error::ImapLogout { .. }
            | Error::ParseEmail { .. }
            | Error::ParseDate { .. } => false,
        }
    }

    /// Returns the error category for metrics/logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidEmailFormat { .. }
            | Error::InvalidConfig { .. }
            | Error::InvalidDnsName { .. } => ErrorCategory::Configuration,

            Error::TcpConnect { .. }
            | Error::Tunnel { .. }
            | Error::TunnelIo { .. }
            | Error::TlsConnect { .. } => ErrorCategory::Network,

            Error::ConnectTimeout { .. }
            | Error::AuthTimeout { .. }
            | Error::SelectTimeout { .. }
            | Error::FetchTimeout { .. }
            | Error::CloseTimeout { .. }
            | Error::LogoutTimeout { .. } => ErrorCategory::Timeout,

            Error::MailboxLogin { .. }
            | Error::SelectMailbox { .. }
            | Error::ImapFetch { .. }
            | Error::FetchMessage { .. }
            | Error::ImapClose { .. }
            | Error::ImapLogout { .. } => ErrorCategory::Protocol,

            Error::ParseEmail { .. } | Error::ParseDate { .. } => ErrorCategory::Parse,

            Error::CodeTimeout { .. } => ErrorCategory::NotFound,
        }
    }
}

/// Error categories for metrics and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Configuration or validation errors.
    Configuration,
    /// Proxy, TCP and TLS errors.
    Network,
    /// Per-step timeouts.
    Timeout,
    /// IMAP protocol errors.
    Protocol,
    /// Message parsing errors.
    Parse,
    /// No confirmation code arrived in time.
    NotFound,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::Timeout => write!(f, "timeout"),
            ErrorCategory::Protocol => write!(f, "protocol"),
            ErrorCategory::Parse => write!(f, "parse"),
            ErrorCategory::NotFound => write!(f, "not_found"),
        }
    }
}
