//! Header parsing for fetched messages.

use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset};
use mailparse::{parse_headers, MailHeaderMap};

/// RFC 5322 date layout, without the optional trailing comment.
pub const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// The header fields of one message that the code search looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    /// Value of the `Date` header.
    pub timestamp: DateTime<FixedOffset>,
    /// Value of the `From` header, lower-cased.
    pub sender: String,
    /// Value of the `Subject` header, lower-cased.
    pub subject: String,
}

impl ParsedMessage {
    /// Parses the header block of a raw RFC 5322 message.
    ///
    /// Encoded words in `From` and `Subject` are decoded before lower-casing.
    ///
    /// # Errors
    ///
    /// - [`Error::ParseEmail`] if the header block is malformed
    /// - [`Error::ParseDate`] if `Date` is missing or not in [`DATE_FORMAT`]
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let (headers, _) = parse_headers(raw).map_err(|source| Error::ParseEmail { source })?;

        let date = headers.get_first_value("Date").unwrap_or_default();
        let timestamp = parse_date(&date)?;

        Ok(Self {
            timestamp,
            sender: headers
                .get_first_value("From")
                .unwrap_or_default()
                .to_lowercase(),
            subject: headers
                .get_first_value("Subject")
                .unwrap_or_default()
                .to_lowercase(),
        })
    }
}

/// Parses a `Date` header value, ignoring a trailing `(comment)` such as `(UTC)`.
///
/// # Errors
///
/// Returns [`Error::ParseDate`] if the value does not match [`DATE_FORMAT`].
pub fn parse_date(value: &str) -> Result<DateTime<FixedOffset>> {
    let stripped = value.split('(').next().unwrap_or_default().trim();

    DateTime::parse_from_str(stripped, DATE_FORMAT).map_err(|source| Error::ParseDate {
        value: stripped.to_string(),
        source,
    })
}
