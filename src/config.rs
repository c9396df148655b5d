//! Configuration for the mailbox login and code-wait flow.
//!
//! Use [`LoginConfigBuilder`] to create a configuration with sensible defaults:
//!
//! ```
//! use email_code::LoginConfig;
//!
//! let config = LoginConfig::builder()
//!     .imap_proxy_host("proxy.example.com")
//!     .imap_proxy_port(8080)
//!     .imap_proxy_user("user")
//!     .imap_proxy_pass("pass")
//!     .build()
//!     .expect("valid config");
//!
//! assert!(config.proxy().is_some());
//! ```

use crate::error::{Error, Result};
use crate::known_servers::ServerRegistry;
use crate::proxy::HttpProxy;
use std::sync::Arc;
use std::time::Duration;

/// Environment variables holding the code-wait timeout in seconds, in
/// precedence order.
pub const CODE_TIMEOUT_ENV_VARS: [&str; 2] = ["TWS_WAIT_EMAIL_CODE", "LOGIN_CODE_TIMEOUT"];

/// Default IMAPS port.
pub const DEFAULT_IMAP_PORT: u16 = 993;

/// Login configuration supplied by the caller.
///
/// Immutable once built. Create using [`LoginConfig::builder()`].
#[derive(Clone)]
pub struct LoginConfig {
    /// Ask for the email before the username in the login flow.
    pub email_first: bool,
    /// Codes are entered manually; the mailbox is not polled.
    pub manual: bool,
    proxy: Option<HttpProxy>,
    /// IMAP server hostname (resolved from the email domain if not set).
    pub imap_host: Option<String>,
    /// IMAP server port (default: 993 for IMAPS).
    pub imap_port: u16,
    /// Domain-to-host table used when `imap_host` is not set.
    pub server_registry: ServerRegistry,
    /// TLS client configuration overriding the bundled trust store.
    pub tls_config: Option<Arc<rustls::ClientConfig>>,
    /// Timeout configuration.
    pub timeouts: TimeoutConfig,
    /// Polling configuration for the code wait.
    pub polling: PollingConfig,
}

impl std::fmt::Debug for LoginConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginConfig")
            .field("email_first", &self.email_first)
            .field("manual", &self.manual)
            .field("proxy", &self.proxy.as_ref().map(ToString::to_string))
            .field("imap_host", &self.imap_host)
            .field("imap_port", &self.imap_port)
            .field("server_registry", &self.server_registry)
            .field("custom_tls", &self.tls_config.is_some())
            .field("timeouts", &self.timeouts)
            .field("polling", &self.polling)
            .finish()
    }
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            email_first: false,
            manual: false,
            proxy: None,
            imap_host: None,
            imap_port: DEFAULT_IMAP_PORT,
            server_registry: ServerRegistry::with_defaults(),
            tls_config: None,
            timeouts: TimeoutConfig::default(),
            polling: PollingConfig::default(),
        }
    }
}

impl LoginConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> LoginConfigBuilder {
        LoginConfigBuilder::default()
    }

    /// Returns the HTTP proxy the IMAP connection is tunneled through, if any.
    #[must_use]
    pub fn proxy(&self) -> Option<&HttpProxy> {
        self.proxy.as_ref()
    }

    /// Returns the IMAP host for `email`: the explicit override, or the
    /// registry's answer for its domain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEmailFormat`] if `email` has no domain part.
    pub fn imap_host_for(&self, email: &str) -> Result<String> {
        match &self.imap_host {
            Some(host) => Ok(host.clone()),
            None => self.server_registry.resolve(email),
        }
    }
}

/// Timeout configuration for individual network steps.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Timeout for TCP connect, proxy tunnel and TLS handshake together.
    pub connect: Duration,
    /// Timeout for IMAP authentication.
    pub auth: Duration,
    /// Timeout for selecting a mailbox.
    pub select: Duration,
    /// Timeout for fetching one message.
    pub fetch: Duration,
    /// Timeout for closing the selected mailbox.
    pub close: Duration,
    /// Timeout for logout.
    pub logout: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            auth: Duration::from_secs(30),
            select: Duration::from_secs(10),
            fetch: Duration::from_secs(30),
            close: Duration::from_secs(5),
            logout: Duration::from_secs(5),
        }
    }
}

/// Polling configuration for the code wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingConfig {
    /// Pause between inbox scans.
    pub interval: Duration,
    /// Give up once this much time has passed without a code.
    pub timeout: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(30),
        }
    }
}

impl PollingConfig {
    /// Defaults with the timeout taken from the process environment.
    ///
    /// See [`CODE_TIMEOUT_ENV_VARS`]; the first variable that is set wins.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the chosen variable is not an integer.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads variables through `lookup`.
    ///
    /// ```
    /// use email_code::PollingConfig;
    /// use std::time::Duration;
    ///
    /// let polling = PollingConfig::from_lookup(|key| match key {
    ///     "TWS_WAIT_EMAIL_CODE" => Some("10".into()),
    ///     "LOGIN_CODE_TIMEOUT" => Some("20".into()),
    ///     _ => None,
    /// })
    /// .unwrap();
    /// assert_eq!(polling.timeout, Duration::from_secs(10));
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the chosen variable is not an integer.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut polling = Self::default();

        let chosen = CODE_TIMEOUT_ENV_VARS
            .iter()
            .find_map(|&key| lookup(key).map(|value| (key, value)));

        if let Some((key, value)) = chosen {
            let secs: u64 = value.trim().parse().map_err(|_| Error::InvalidConfig {
                message: format!("{key} must be an integer number of seconds, got '{value}'"),
            })?;
            polling.timeout = Duration::from_secs(secs);
        }

        Ok(polling)
    }
}

/// Builder for [`LoginConfig`].
#[derive(Default)]
pub struct LoginConfigBuilder {
    email_first: bool,
    manual: bool,
    imap_proxy_host: Option<String>,
    imap_proxy_port: Option<u16>,
    imap_proxy_user: Option<String>,
    imap_proxy_pass: Option<String>,
    imap_host: Option<String>,
    imap_port: Option<u16>,
    server_registry: Option<ServerRegistry>,
    tls_config: Option<Arc<rustls::ClientConfig>>,
    timeouts: Option<TimeoutConfig>,
    polling: Option<PollingConfig>,
}

impl std::fmt::Debug for LoginConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginConfigBuilder")
            .field("imap_proxy_host", &self.imap_proxy_host)
            .field("imap_proxy_port", &self.imap_proxy_port)
            .field("imap_proxy_user", &self.imap_proxy_user)
            .field(
                "imap_proxy_pass",
                &self.imap_proxy_pass.as_ref().map(|_| "[REDACTED]"),
            )
            .field("imap_host", &self.imap_host)
            .field("imap_port", &self.imap_port)
            .finish_non_exhaustive()
    }
}

impl LoginConfigBuilder {
    /// Sets the `email_first` login-flow flag.
    #[must_use]
    pub fn email_first(mut self, value: bool) -> Self {
        self.email_first = value;
        self
    }

    /// Sets the `manual` login-flow flag.
    #[must_use]
    pub fn manual(mut self, value: bool) -> Self {
        self.manual = value;
        self
    }

    /// Sets the HTTP proxy host. When set, port, user and password are required too.
    #[must_use]
    pub fn imap_proxy_host(mut self, host: impl Into<String>) -> Self {
        self.imap_proxy_host = Some(host.into());
        self
    }

    /// Sets the HTTP proxy port.
    #[must_use]
    pub fn imap_proxy_port(mut self, port: u16) -> Self {
        self.imap_proxy_port = Some(port);
        self
    }

    /// Sets the HTTP proxy username.
    #[must_use]
    pub fn imap_proxy_user(mut self, user: impl Into<String>) -> Self {
        self.imap_proxy_user = Some(user.into());
        self
    }

    /// Sets the HTTP proxy password.
    #[must_use]
    pub fn imap_proxy_pass(mut self, pass: impl Into<String>) -> Self {
        self.imap_proxy_pass = Some(pass.into());
        self
    }

    /// Sets the IMAP server hostname explicitly, bypassing domain resolution.
    #[must_use]
    pub fn imap_host(mut self, host: impl Into<String>) -> Self {
        self.imap_host = Some(host.into());
        self
    }

    /// Sets the IMAP server port. Default is 993.
    #[must_use]
    pub fn imap_port(mut self, port: u16) -> Self {
        self.imap_port = Some(port);
        self
    }

    /// Sets the registry used to resolve the IMAP host from the email domain.
    ///
    /// Defaults to [`ServerRegistry::with_defaults`].
    #[must_use]
    pub fn server_registry(mut self, registry: ServerRegistry) -> Self {
        self.server_registry = Some(registry);
        self
    }

    /// Overrides the TLS client configuration (trust store, ALPN, ...).
    #[must_use]
    pub fn tls_config(mut self, tls_config: Arc<rustls::ClientConfig>) -> Self {
        self.tls_config = Some(tls_config);
        self
    }

    /// Sets timeout configuration.
    #[must_use]
    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts
            .get_or_insert_with(TimeoutConfig::default)
            .connect = timeout;
        self
    }

    /// Sets polling configuration.
    ///
    /// When not set, [`PollingConfig::from_env`] is used.
    #[must_use]
    pub fn polling(mut self, polling: PollingConfig) -> Self {
        self.polling = Some(polling);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a proxy host is given without the
    /// other proxy fields (empty strings and port 0 count as missing), or if
    /// the timeout environment variable is malformed.
    pub fn build(self) -> Result<LoginConfig> {
        let proxy = match self.imap_proxy_host {
            None => None,
            Some(host) => {
                if host.is_empty() {
                    return Err(missing("imap_proxy_host"));
                }
                let port = self
                    .imap_proxy_port
                    .filter(|&port| port != 0)
                    .ok_or_else(|| missing("imap_proxy_port"))?;
                let user = self
                    .imap_proxy_user
                    .filter(|user| !user.is_empty())
                    .ok_or_else(|| missing("imap_proxy_user"))?;
                let pass = self
                    .imap_proxy_pass
                    .filter(|pass| !pass.is_empty())
                    .ok_or_else(|| missing("imap_proxy_pass"))?;
                Some(HttpProxy::with_auth(host, port, user, pass))
            }
        };

        let polling = match self.polling {
            Some(polling) => polling,
            None => PollingConfig::from_env()?,
        };

        Ok(LoginConfig {
            email_first: self.email_first,
            manual: self.manual,
            proxy,
            imap_host: self.imap_host,
            imap_port: self.imap_port.unwrap_or(DEFAULT_IMAP_PORT),
            server_registry: self
                .server_registry
                .unwrap_or_else(ServerRegistry::with_defaults),
            tls_config: self.tls_config,
            timeouts: self.timeouts.unwrap_or_default(),
            polling,
        })
    }
}

fn missing(field: &str) -> Error {
    Error::InvalidConfig {
        message: format!("{field} is required in LoginConfig"),
    }
}
