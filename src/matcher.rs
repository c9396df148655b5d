//! Deciding whether a message carries a confirmation code, and extracting it.
//!
//! # Example
//!
//! ```
//! use email_code::matcher::{CodeMatcher, ConfirmationCodeMatcher};
//! use email_code::ParsedMessage;
//!
//! let raw = b"From: Info@X.com\r\n\
//!             Subject: Your Twitter confirmation code is 123456\r\n\
//!             Date: Tue, 15 Oct 2024 12:30:00 +0000\r\n\r\n";
//! let message = ParsedMessage::parse(raw).unwrap();
//!
//! let matcher = ConfirmationCodeMatcher::default();
//! assert_eq!(matcher.find_code(&message).as_deref(), Some("123456"));
//! ```

use crate::parser::ParsedMessage;

/// Sender fragment of the default matcher.
pub const DEFAULT_SENDER: &str = "info@x.com";

/// Subject fragment of the default matcher.
pub const DEFAULT_SUBJECT_MARKER: &str = "confirmation code is";

/// Extracts a code from a parsed message.
///
/// Implement this trait to look for codes from other services.
pub trait CodeMatcher: Send + Sync {
    /// Returns the code if `message` is a confirmation message.
    fn find_code(&self, message: &ParsedMessage) -> Option<String>;

    /// Returns a human-readable description of what this matcher looks for.
    fn description(&self) -> &str;
}

/// Matches on sender and subject fragments; the code is the last word of the subject.
#[derive(Debug, Clone)]
pub struct ConfirmationCodeMatcher {
    sender: String,
    subject_marker: String,
    description: String,
}

impl ConfirmationCodeMatcher {
    /// Creates a matcher for messages whose sender contains `sender` and whose
    /// subject contains `subject_marker`. Both comparisons are case-insensitive.
    #[must_use]
    pub fn new(sender: impl Into<String>, subject_marker: impl Into<String>) -> Self {
        let sender = sender.into().to_lowercase();
        let subject_marker = subject_marker.into().to_lowercase();
        let description = format!("'{subject_marker}' from {sender}");
        Self {
            sender,
            subject_marker,
            description,
        }
    }
}

impl Default for ConfirmationCodeMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_SENDER, DEFAULT_SUBJECT_MARKER)
    }
}

impl CodeMatcher for ConfirmationCodeMatcher {
    fn find_code(&self, message: &ParsedMessage) -> Option<String> {
        if !message.sender.contains(&self.sender) || !message.subject.contains(&self.subject_marker)
        {
            return None;
        }

        // eg. "your twitter confirmation code is xxx"
        message
            .subject
            .split_whitespace()
            .last()
            .map(|code| code.trim().to_string())
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Matcher using a closure for custom logic.
///
/// ```
/// use email_code::matcher::{ClosureMatcher, CodeMatcher};
/// use email_code::ParsedMessage;
///
/// let matcher = ClosureMatcher::new(
///     |msg: &ParsedMessage| msg.subject.strip_prefix("pin: ").map(str::to_string),
///     "pin subject",
/// );
/// assert_eq!(matcher.description(), "pin subject");
/// ```
pub struct ClosureMatcher<F>
where
    F: Fn(&ParsedMessage) -> Option<String> + Send + Sync,
{
    matcher_fn: F,
    description: String,
}

impl<F> ClosureMatcher<F>
where
    F: Fn(&ParsedMessage) -> Option<String> + Send + Sync,
{
    /// Creates a new closure-based matcher.
    #[must_use]
    pub fn new(matcher_fn: F, description: impl Into<String>) -> Self {
        Self {
            matcher_fn,
            description: description.into(),
        }
    }
}

impl<F> CodeMatcher for ClosureMatcher<F>
where
    F: Fn(&ParsedMessage) -> Option<String> + Send + Sync,
{
    fn find_code(&self, message: &ParsedMessage) -> Option<String> {
        (self.matcher_fn)(message)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl<F> std::fmt::Debug for ClosureMatcher<F>
where
    F: Fn(&ParsedMessage) -> Option<String> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClosureMatcher")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}
