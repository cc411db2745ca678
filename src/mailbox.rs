//! Mailbox names
//!
//! Every query runs against one mailbox. `INBOX` is the default and is
//! the only name IMAP treats case-insensitively; every other name is
//! passed to the server exactly as given.

use std::fmt;

/// A server-side mailbox to examine.
///
/// # Examples
///
/// ```
/// use imap_reader::MailboxName;
///
/// assert_eq!(MailboxName::default().as_str(), "INBOX");
/// assert_eq!(MailboxName::from("inbox"), MailboxName::Inbox);
/// assert_eq!(MailboxName::named("Archive/2023").as_str(), "Archive/2023");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum MailboxName {
    /// The INBOX mailbox (RFC 3501 required, case-insensitive).
    #[default]
    Inbox,
    /// Any other mailbox, by its full hierarchical name.
    Named(String),
}

impl MailboxName {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::from(name.into())
    }

    /// The name sent in `EXAMINE`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Inbox => "INBOX",
            Self::Named(name) => name,
        }
    }
}

impl fmt::Display for MailboxName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for MailboxName {
    fn from(s: &str) -> Self {
        if s.eq_ignore_ascii_case("inbox") {
            Self::Inbox
        } else {
            Self::Named(s.to_string())
        }
    }
}

impl From<String> for MailboxName {
    fn from(s: String) -> Self {
        if s.eq_ignore_ascii_case("inbox") {
            Self::Inbox
        } else {
            Self::Named(s)
        }
    }
}
