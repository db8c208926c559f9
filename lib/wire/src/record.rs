//! Flat `{role, content}` wire records.
//!
//! Flattening is lossy by design: identifiers and the exchange structure
//! are dropped, leaving exactly what providers expect on the wire.
//! Reconstruction recovers the structure by pairing the flat list back
//! into exchanges, treating a trailing unpaired user record as the
//! pending prompt.

use colloquy_conversation::{Conversation, Exchange, Message, Role, SystemMessage};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One provider wire record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRecord {
    /// Role as its lowercase wire name.
    pub role: String,
    /// Message content.
    pub content: String,
}

impl ChatRecord {
    /// Creates a record from a known role.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }

    /// Creates a record from a message, dropping its identifier.
    #[must_use]
    pub fn from_message(message: &Message) -> Self {
        Self {
            role: message.role.to_string(),
            content: message.content.clone(),
        }
    }

    /// Converts the record into a message with a fresh identifier.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::InvalidRole`] when the role text fails
    /// validation.
    pub fn into_message(self) -> Result<Message, WireError> {
        let role: Role = self.role.parse().map_err(|_| WireError::InvalidRole {
            role: self.role,
        })?;
        Ok(Message::new(role, self.content))
    }
}

/// Errors from reconstructing a conversation off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// The record list was empty.
    Empty,
    /// The first record must be a system message.
    NonSystemHead { role: String },
    /// A record carried an unknown role.
    InvalidRole { role: String },
    /// A prompt/response pair had the wrong roles.
    InvalidPairing { index: usize, reason: String },
    /// The trailing unpaired record must be a user prompt.
    TrailingRole { role: String },
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "record list is empty"),
            Self::NonSystemHead { role } => {
                write!(f, "first record must have role 'system', found '{role}'")
            }
            Self::InvalidRole { role } => write!(f, "invalid role on the wire: '{role}'"),
            Self::InvalidPairing { index, reason } => {
                write!(f, "invalid exchange pair at record {index}: {reason}")
            }
            Self::TrailingRole { role } => {
                write!(f, "trailing record must have role 'user', found '{role}'")
            }
        }
    }
}

impl std::error::Error for WireError {}

/// Flattens a conversation into wire records: the system message, each
/// exchange's prompt then response, and the pending prompt last.
#[must_use]
pub fn flatten(conversation: &Conversation) -> Vec<ChatRecord> {
    conversation.messages().map(ChatRecord::from_message).collect()
}

/// Rebuilds a conversation from wire records; the inverse of [`flatten`]
/// up to message identifiers.
///
/// # Errors
///
/// Returns a [`WireError`] when the list is empty, the head record is not
/// a system message, the remainder does not pair into user/assistant
/// exchanges, or an unpaired trailing record is not a user prompt.
pub fn reconstruct(records: &[ChatRecord]) -> Result<Conversation, WireError> {
    let (head, rest) = records.split_first().ok_or(WireError::Empty)?;
    let head_message = head.clone().into_message()?;
    let system_message =
        SystemMessage::try_from(head_message).map_err(|_| WireError::NonSystemHead {
            role: head.role.clone(),
        })?;

    let mut conversation = Conversation::new(system_message);

    let mut pairs = rest.chunks_exact(2);
    for (index, pair) in pairs.by_ref().enumerate() {
        let prompt = pair[0].clone().into_message()?;
        let response = pair[1].clone().into_message()?;
        let exchange = Exchange::new(prompt, response).map_err(|e| WireError::InvalidPairing {
            index: 1 + index * 2,
            reason: e.to_string(),
        })?;
        conversation.append(exchange);
    }

    if let [trailing] = pairs.remainder() {
        let prompt = trailing.clone().into_message()?;
        conversation
            .set_next_prompt(prompt)
            .map_err(|_| WireError::TrailingRole {
                role: trailing.role.clone(),
            })?;
    }

    Ok(conversation)
}
