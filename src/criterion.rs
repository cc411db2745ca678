//! Search criteria
//!
//! A query runs exactly one criterion; criteria are never combined.

use crate::date::SearchDate;
use crate::error::Result;

/// One IMAP `SEARCH` criterion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCriterion {
    /// Every message in the mailbox.
    All,
    /// Subject header contains the text (server-side, case-insensitive).
    SubjectContains(String),
    /// Message body contains the text.
    BodyContains(String),
    /// Messages dated on or after the given day.
    SentSince(SearchDate),
}

impl SearchCriterion {
    #[must_use]
    pub fn subject(text: impl Into<String>) -> Self {
        Self::SubjectContains(text.into())
    }

    #[must_use]
    pub fn body(text: impl Into<String>) -> Self {
        Self::BodyContains(text.into())
    }

    /// Build a `SentSince` criterion from an ISO 8601 timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDate`](crate::Error::InvalidDate) if the
    /// timestamp has no valid `YYYY-MM-DD` date portion.
    pub fn sent_since(iso: &str) -> Result<Self> {
        Ok(Self::SentSince(iso.parse()?))
    }

    /// Render the criterion as the argument of `UID SEARCH`.
    ///
    /// Non-ASCII text is announced with `CHARSET UTF-8` but still sent
    /// as a quoted string. RFC 3501 quoted strings are 7-bit, so servers
    /// without UTF-8 support may refuse such a search or match nothing.
    #[must_use]
    pub fn to_query(&self) -> String {
        match self {
            Self::All => "ALL".to_string(),
            Self::SubjectContains(text) => text_key("SUBJECT", text),
            Self::BodyContains(text) => text_key("BODY", text),
            Self::SentSince(date) => format!("SINCE {date}"),
        }
    }
}

fn text_key(key: &str, text: &str) -> String {
    if text.is_ascii() {
        format!("{key} {}", quote(text))
    } else {
        format!("CHARSET UTF-8 {key} {}", quote(text))
    }
}

/// Quote a search value as an IMAP quoted string.
///
/// Line breaks cannot appear inside a quoted string, so they are
/// folded to spaces.
fn quote(value: &str) -> String {
    let normalized = value.replace(['\r', '\n'], " ");
    let escaped = normalized
        .trim()
        .replace('\\', "\\\\")
        .replace('"', "\\\"");
    format!("\"{escaped}\"")
}
