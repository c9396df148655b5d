//! Newest-first search of the inbox for a confirmation code.

use crate::error::Result;
use crate::matcher::CodeMatcher;
use crate::parser::ParsedMessage;
use crate::session::Mailbox;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

/// Scans messages `count..=1` (newest first) and returns the first code found.
///
/// With `min_t` set, the scan stops at the first message older than `min_t`
/// and returns `None`. Messages are assumed to be numbered in arrival order;
/// if the server numbers them otherwise, later matches may be missed.
///
/// # Errors
///
/// Fetch and parse failures are returned as-is; the caller decides what to
/// clean up.
#[instrument(
    name = "scanner::scan_for_code",
    skip(mailbox, matcher),
    fields(matcher = %matcher.description())
)]
pub async fn scan_for_code<M: Mailbox>(
    mailbox: &mut M,
    count: u32,
    min_t: Option<DateTime<Utc>>,
    matcher: &dyn CodeMatcher,
) -> Result<Option<String>> {
    for index in (1..=count).rev() {
        for raw in mailbox.fetch(index).await? {
            let message = ParsedMessage::parse(&raw)?;

            info!(
                index,
                count,
                sender = %message.sender,
                timestamp = %message.timestamp,
                subject = %message.subject,
                "Scanned message"
            );

            if min_t.is_some_and(|min_t| message.timestamp.with_timezone(&Utc) < min_t) {
                debug!(index, "Reached messages older than cutoff");
                return Ok(None);
            }

            if let Some(code) = matcher.find_code(&message) {
                return Ok(Some(code));
            }
        }
    }

    Ok(None)
}
