//! Read-only IMAP mailbox reader
//!
//! Connects to an IMAP server over TLS, examines a mailbox read-only,
//! runs one search criterion (everything, subject text, body text, or
//! sent since a date) and returns the matching messages parsed and
//! ordered newest first.
//!
//! ```no_run
//! use imap_reader::{ImapConfig, ImapReader, Representation};
//!
//! # async fn demo() -> imap_reader::Result<()> {
//! let reader = ImapReader::new(ImapConfig::from_env()?);
//! let mut session = reader.connect().await?;
//! let recent = session.query_by_sent_since("2023-02-04T15:26:44.920Z").await?;
//! session.disconnect().await?;
//!
//! for message in &recent {
//!     println!("{:?}: {}", message.subject(), message.body(Representation::Plain)?);
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod connection;
mod criterion;
mod date;
mod error;
mod mailbox;
mod message;
mod session;
mod summary;

pub use config::{ImapConfig, TlsMode};
pub use criterion::SearchCriterion;
pub use date::{SearchDate, to_search_date};
pub use error::{Error, Result};
pub use mailbox::MailboxName;
pub use message::{Message, Representation, extract_body};
pub use session::{ImapReader, MailSession};
pub use summary::MessageSummary;
