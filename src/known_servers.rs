//! Mail server discovery from email domains.
//!
//! A [`ServerRegistry`] maps the domain part of an address to the IMAP host
//! that serves it. Unknown domains fall back to `imap.{domain}`.
//!
//! # Example
//!
//! ```
//! use email_code::ServerRegistry;
//!
//! let mut registry = ServerRegistry::with_defaults();
//! assert_eq!(registry.resolve("user@icloud.com").unwrap(), "imap.mail.me.com");
//! assert_eq!(registry.resolve("user@example.org").unwrap(), "imap.example.org");
//!
//! registry.add_mapping("mycompany.com", "mail.mycompany.com");
//! assert_eq!(registry.resolve("user@mycompany.com").unwrap(), "mail.mycompany.com");
//! ```

use crate::error::{Error, Result};
use std::collections::HashMap;

/// Domains whose IMAP host is not `imap.{domain}`.
const DEFAULT_SERVERS: &[(&str, &str)] = &[
    ("yahoo.com", "imap.mail.yahoo.com"),
    ("icloud.com", "imap.mail.me.com"),
    ("outlook.com", "imap-mail.outlook.com"),
    ("hotmail.com", "imap-mail.outlook.com"),
];

/// Domain-to-IMAP-host table.
///
/// Each login flow can own its own registry, so tests and tenants never see
/// each other's mappings.
#[derive(Debug, Clone, Default)]
pub struct ServerRegistry {
    servers: HashMap<String, String>,
}

impl ServerRegistry {
    /// Creates an empty registry. Every lookup falls back to `imap.{domain}`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry seeded with the well-known providers.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.add_mappings(DEFAULT_SERVERS.iter().copied());
        registry
    }

    /// Registers a mapping, replacing any existing one for the domain.
    ///
    /// Domains are matched case-insensitively.
    pub fn add_mapping(&mut self, domain: impl Into<String>, imap_host: impl Into<String>) {
        self.servers
            .insert(domain.into().to_lowercase(), imap_host.into());
    }

    /// Registers several mappings at once.
    ///
    /// ```
    /// use email_code::ServerRegistry;
    ///
    /// let mut registry = ServerRegistry::new();
    /// registry.add_mappings([
    ///     ("corp.com", "mail.corp.com"),
    ///     ("partner.org", "imap.partner.org"),
    /// ]);
    /// assert_eq!(registry.len(), 2);
    /// ```
    pub fn add_mappings<I, D, H>(&mut self, mappings: I)
    where
        I: IntoIterator<Item = (D, H)>,
        D: Into<String>,
        H: Into<String>,
    {
        for (domain, host) in mappings {
            self.add_mapping(domain, host);
        }
    }

    /// Resolves the IMAP host for an email address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEmailFormat`] if the address has no domain part.
    pub fn resolve(&self, email: &str) -> Result<String> {
        let domain = email
            .split_once('@')
            .map(|(_, domain)| domain)
            .filter(|domain| !domain.is_empty())
            .ok_or_else(|| Error::InvalidEmailFormat {
                email: email.to_string(),
            })?
            .to_lowercase();

        Ok(self
            .servers
            .get(&domain)
            .cloned()
            .unwrap_or_else(|| format!("imap.{domain}")))
    }

    /// Returns `true` if the domain has an explicit mapping.
    #[must_use]
    pub fn is_known(&self, domain: &str) -> bool {
        self.servers.contains_key(&domain.to_lowercase())
    }

    /// Returns the number of mappings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Returns `true` if the registry has no mappings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}
