//! ISO 8601 to IMAP search date translation
//!
//! `SEARCH SINCE` takes an RFC 3501 `date` (`04-Feb-2023`), while
//! callers hand us ISO 8601 timestamps such as
//! `2023-02-04T15:26:44.920Z`. Only the calendar date matters: the
//! time, fraction and offset after `T` are ignored.

use crate::error::{Error, Result};
use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

/// A calendar date already validated and rendered for `SEARCH SINCE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchDate(String);

impl SearchDate {
    /// The `DD-Mon-YYYY` rendering.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for SearchDate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        to_search_date(s).map(Self)
    }
}

impl TryFrom<&serde_json::Value> for SearchDate {
    type Error = Error;

    /// Only JSON strings are accepted; numbers, booleans, arrays and
    /// the rest are rejected rather than stringified.
    fn try_from(value: &serde_json::Value) -> Result<Self> {
        let kind = match value {
            serde_json::Value::String(s) => return s.parse(),
            serde_json::Value::Null => "null",
            serde_json::Value::Bool(_) => "boolean",
            serde_json::Value::Number(_) => "number",
            serde_json::Value::Array(_) => "array",
            serde_json::Value::Object(_) => "object",
        };
        Err(Error::InvalidDate(format!("expected a string, got {kind}")))
    }
}

impl fmt::Display for SearchDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Convert an ISO 8601 date or date-time into `DD-Mon-YYYY`.
///
/// # Errors
///
/// Returns [`Error::InvalidDate`] if the input is empty or its date
/// portion is not a valid `YYYY-MM-DD` calendar date.
pub fn to_search_date(iso: &str) -> Result<String> {
    let date_part = iso.split('T').next().unwrap_or_default();
    if date_part.is_empty() {
        return Err(Error::InvalidDate(format!("{iso:?}")));
    }

    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|e| Error::InvalidDate(format!("{iso:?}: {e}")))?;

    Ok(date.format("%d-%b-%Y").to_string())
}
