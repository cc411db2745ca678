//! Error types for imap-reader

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The server rejected the configured credentials.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// TCP connect, TLS setup or TLS handshake failed.
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// The server spoke something other than the expected IMAP
    /// exchange (bad greeting, BAD response, unparseable data).
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Mailbox not found: {0}")]
    MailboxNotFound(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Invalid ISO 8601 date: {0}")]
    InvalidDate(String),

    #[error("Invalid format {0:?}: expected plain or html")]
    InvalidFormat(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the caller can fix this by changing its input.
    ///
    /// Validation errors are raised before any network traffic, so a
    /// service layer can answer them with a client-error status.
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidDate(_) | Self::InvalidFormat(_) | Self::InvalidMessage(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Human-readable reason from an async-imap error.
///
/// `NO` and `BAD` completions carry the server's own text; response
/// codes such as `[AUTHENTICATIONFAILED]` are dropped.
pub fn server_reason(err: &async_imap::error::Error) -> String {
    match err {
        async_imap::error::Error::No(text) | async_imap::error::Error::Bad(text) => {
            clean_reason(text)
        }
        other => other.to_string(),
    }
}

fn clean_reason(text: &str) -> String {
    let mut rest = text.trim();
    while let Some(stripped) = rest.strip_prefix('[') {
        match stripped.find(']') {
            Some(end) => rest = stripped[end + 1..].trim_start(),
            None => break,
        }
    }
    if rest.is_empty() {
        text.trim().to_string()
    } else {
        rest.trim_end().to_string()
    }
}
