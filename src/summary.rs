//! JSON shape of a message for API responses

use crate::message::{Message, Representation};
use serde::Serialize;

/// The fields an HTTP layer returns per message.
///
/// Header fields are `null` when the message lacks them; `body` is
/// `null` when the message has no part of the chosen representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageSummary {
    pub to: Option<String>,
    pub from: Option<String>,
    pub subject: Option<String>,
    pub date: Option<String>,
    pub body: Option<String>,
}

impl MessageSummary {
    #[must_use]
    pub fn from_message(message: &Message, representation: Representation) -> Self {
        Self {
            to: message.to().map(str::to_string),
            from: message.from().map(str::to_string),
            subject: message.subject().map(str::to_string),
            date: message.date().map(str::to_string),
            body: message.body(representation).ok().map(str::to_string),
        }
    }

    /// Summaries for a whole result list, order preserved.
    #[must_use]
    pub fn from_messages(messages: &[Message], representation: Representation) -> Vec<Self> {
        messages
            .iter()
            .map(|m| Self::from_message(m, representation))
            .collect()
    }
}
