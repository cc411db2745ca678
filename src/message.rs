//! Parsed messages and body extraction
//!
//! Raw RFC 5322 bytes from `FETCH` are parsed once with `mailparse`
//! into an owned [`Message`]. The message keeps the headers callers
//! show (To, From, Subject, Date) and every inline `text/plain` and
//! `text/html` leaf part, decoded, without the part's own headers.

use crate::error::{Error, Result};
use mailparse::{DispositionType, MailHeaderMap, ParsedMail};
use std::fmt;
use std::str::FromStr;

/// A rendering of a message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Representation {
    Plain,
    Html,
}

impl Representation {
    /// The MIME type carrying this representation.
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Plain => "text/plain",
            Self::Html => "text/html",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Html => "html",
        }
    }
}

impl FromStr for Representation {
    type Err = Error;

    /// Exact, case-sensitive: only `plain` and `html`.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "plain" => Ok(Self::Plain),
            "html" => Ok(Self::Html),
            other => Err(Error::InvalidFormat(other.to_string())),
        }
    }
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct BodyPart {
    representation: Representation,
    content: String,
}

/// One parsed mail item. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    uid: u32,
    to: Option<String>,
    from: Option<String>,
    subject: Option<String>,
    date: Option<String>,
    parts: Vec<BodyPart>,
}

impl Message {
    /// Parse a raw RFC 5322 message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMessage`] if the bytes are empty, do not
    /// start with a header block, cannot be parsed as MIME, or carry a
    /// text part whose content cannot be decoded.
    pub fn parse(uid: u32, raw: &[u8]) -> Result<Self> {
        if !starts_with_header(raw) {
            return Err(Error::InvalidMessage(
                "expected an RFC 5322 message starting with a header field".into(),
            ));
        }

        let parsed =
            mailparse::parse_mail(raw).map_err(|e| Error::InvalidMessage(e.to_string()))?;

        let headers = parsed.headers.as_slice();
        let mut parts = Vec::new();
        collect_parts(&parsed, &mut parts)?;

        Ok(Self {
            uid,
            to: headers.get_first_value("To"),
            from: headers.get_first_value("From"),
            subject: headers.get_first_value("Subject"),
            date: headers.get_first_value("Date"),
            parts,
        })
    }

    /// Server UID the message was fetched under (0 when parsed
    /// outside a mailbox).
    #[must_use]
    pub const fn uid(&self) -> u32 {
        self.uid
    }

    #[must_use]
    pub fn to(&self) -> Option<&str> {
        self.to.as_deref()
    }

    #[must_use]
    pub fn from(&self) -> Option<&str> {
        self.from.as_deref()
    }

    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    #[must_use]
    pub fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }

    /// Whether the message carries any plain or HTML body.
    #[must_use]
    pub fn has_body(&self) -> bool {
        !self.parts.is_empty()
    }

    /// Representations present, in document order, without repeats.
    #[must_use]
    pub fn representations(&self) -> Vec<Representation> {
        let mut found = Vec::new();
        for part in &self.parts {
            if !found.contains(&part.representation) {
                found.push(part.representation);
            }
        }
        found
    }

    /// The first body part of the requested representation.
    ///
    /// The content is decoded text (transfer encoding and charset
    /// removed), not the encoded wire form. The other representation is
    /// never substituted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMessage`] if the message has no body, or
    /// no part of the requested representation.
    pub fn body(&self, representation: Representation) -> Result<&str> {
        if self.parts.is_empty() {
            return Err(Error::InvalidMessage("message has no body".into()));
        }

        self.parts
            .iter()
            .find(|part| part.representation == representation)
            .map(|part| part.content.as_str())
            .ok_or_else(|| {
                Error::InvalidMessage(format!(
                    "message has no {} body",
                    representation.mime_type()
                ))
            })
    }
}

/// Extract the `plain` or `html` body of a message.
///
/// The representation name is checked before the message is looked at.
///
/// # Errors
///
/// Returns [`Error::InvalidFormat`] for any representation other than
/// exactly `plain` or `html`, and [`Error::InvalidMessage`] if the
/// message has no body of that representation.
pub fn extract_body(message: &Message, representation: &str) -> Result<String> {
    let representation: Representation = representation.parse()?;
    message.body(representation).map(ToString::to_string)
}

fn collect_parts(part: &ParsedMail<'_>, parts: &mut Vec<BodyPart>) -> Result<()> {
    if !part.subparts.is_empty() {
        for sub in &part.subparts {
            collect_parts(sub, parts)?;
        }
        return Ok(());
    }

    if matches!(
        part.get_content_disposition().disposition,
        DispositionType::Attachment
    ) {
        return Ok(());
    }

    let representation = match part.ctype.mimetype.to_ascii_lowercase().as_str() {
        "text/plain" => Representation::Plain,
        "text/html" => Representation::Html,
        _ => return Ok(()),
    };

    parts.push(BodyPart {
        representation,
        content: decode_text(part)?,
    });
    Ok(())
}

/// Transfer-decode a text leaf and convert it to UTF-8.
///
/// mailparse reports `us-ascii` when no charset is declared; 8-bit
/// content under that label is read as UTF-8 when it is valid UTF-8.
fn decode_text(part: &ParsedMail<'_>) -> Result<String> {
    let undecodable = |e: mailparse::MailParseError| {
        Error::InvalidMessage(format!("undecodable {} part: {e}", part.ctype.mimetype))
    };

    if part.ctype.charset.eq_ignore_ascii_case("us-ascii") {
        let raw = part.get_body_raw().map_err(undecodable)?;
        if let Ok(text) = String::from_utf8(raw) {
            return Ok(text);
        }
    }

    part.get_body().map_err(undecodable)
}

/// Whether the first line is a `Name: value` header field.
fn starts_with_header(raw: &[u8]) -> bool {
    let first_line = raw.split(|&b| b == b'\n').next().unwrap_or_default();
    let Some(colon) = first_line.iter().position(|&b| b == b':') else {
        return false;
    };
    let name = &first_line[..colon];
    !name.is_empty() && name.iter().all(|&b| b.is_ascii_graphic() && b != b':')
}
