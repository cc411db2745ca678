//! IMAP connection configuration

use crate::error::{Error, Result};
use std::env;
use std::fmt;
use std::str::FromStr;

/// How the TLS layer is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsMode {
    /// TLS from the first byte (IMAPS, usually port 993).
    #[default]
    Implicit,
    /// Plaintext greeting, then upgrade with `STARTTLS`.
    StartTls,
}

impl FromStr for TlsMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "implicit" | "tls" | "ssl" => Ok(Self::Implicit),
            "starttls" => Ok(Self::StartTls),
            other => Err(Error::Config(format!(
                "Invalid EMAIL_TLS {other:?}: expected implicit or starttls"
            ))),
        }
    }
}

/// IMAP connection parameters.
///
/// A reader built from a config keeps it for its whole lifetime, so
/// credentials are fixed once the reader exists.
#[derive(Clone)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub tls: TlsMode,
    /// Skip server certificate verification (self-signed bridges).
    pub accept_invalid_certs: bool,
}

impl ImapConfig {
    pub const DEFAULT_PORT: u16 = 993;

    /// Config for an IMAPS server on the default port with certificate
    /// verification enabled.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: Self::DEFAULT_PORT,
            username: username.into(),
            password: password.into(),
            tls: TlsMode::default(),
            accept_invalid_certs: false,
        }
    }

    /// Load IMAP configuration from environment variables
    ///
    /// Reads from `.env` file if present. Required variables:
    /// - `EMAIL_ID`
    /// - `EMAIL_PASS`
    /// - `EMAIL_HOST`
    ///
    /// Optional (with defaults):
    /// - `EMAIL_PORT` (default: `993`)
    /// - `EMAIL_TLS` (`implicit` or `starttls`, default: `implicit`)
    /// - `EMAIL_ACCEPT_INVALID_CERTS` (default: `false`)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required variable is missing or a
    /// value cannot be parsed.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            host: required("EMAIL_HOST")?,
            port: env::var("EMAIL_PORT")
                .unwrap_or_else(|_| Self::DEFAULT_PORT.to_string())
                .parse()
                .map_err(|e| Error::Config(format!("Invalid EMAIL_PORT: {e}")))?,
            username: required("EMAIL_ID")?,
            password: required("EMAIL_PASS")?,
            tls: env::var("EMAIL_TLS")
                .map_or_else(|_| Ok(TlsMode::default()), |v| v.parse())?,
            accept_invalid_certs: env::var("EMAIL_ACCEPT_INVALID_CERTS")
                .map_or(Ok(false), |v| parse_flag("EMAIL_ACCEPT_INVALID_CERTS", &v))?,
        })
    }
}

impl fmt::Debug for ImapConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImapConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("tls", &self.tls)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}

fn required(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("{name} not set")))
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(Error::Config(format!("Invalid {name}: {other:?}"))),
    }
}
