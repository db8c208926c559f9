//! Message types for conversations.
//!
//! Role assignment is the single validation gate: every path that turns
//! untrusted text into a [`Role`] goes through [`Role::from_str`], and a
//! [`SystemMessage`] additionally pins its role for good.

use crate::error::MessageError;
use colloquy_core::MessageId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User/human message.
    User,
    /// Assistant/AI message.
    Assistant,
    /// System message.
    System,
}

impl Role {
    /// Returns the lowercase wire name of the role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            other => {
                debug!(role = other, "rejected role value");
                Err(MessageError::InvalidRole {
                    role: other.to_string(),
                })
            }
        }
    }
}

impl TryFrom<&str> for Role {
    type Error = MessageError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier.
    pub id: MessageId,
    /// Message role.
    pub role: Role,
    /// Message content.
    pub content: String,
}

impl Message {
    /// Creates a new message.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content: content.into(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Replaces role and content in a single operation, keeping the ID.
    pub fn update(&mut self, role: Role, content: impl Into<String>) {
        self.role = role;
        self.content = content.into();
    }

    /// Produces the canonical record form of this message.
    ///
    /// The `id` field is omitted when `include_id` is false, which is the
    /// form providers expect on the wire.
    #[must_use]
    pub fn to_record(&self, include_id: bool) -> MessageRecord {
        MessageRecord {
            id: include_id.then_some(self.id),
            role: self.role.to_string(),
            content: self.content.clone(),
        }
    }
}

/// Canonical record form of a message: `{id?, role, content}`.
///
/// The role is kept as text so that decoding runs through the same
/// validation gate as every other role assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Message identifier, omitted on the wire when not wanted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    /// Role as its lowercase wire name.
    pub role: String,
    /// Message content.
    pub content: String,
}

impl TryFrom<MessageRecord> for Message {
    type Error = MessageError;

    fn try_from(record: MessageRecord) -> Result<Self, Self::Error> {
        let role = record.role.parse()?;
        Ok(Self {
            id: record.id.unwrap_or_default(),
            role,
            content: record.content,
        })
    }
}

impl From<Message> for MessageRecord {
    fn from(message: Message) -> Self {
        MessageRecord {
            id: Some(message.id),
            role: message.role.to_string(),
            content: message.content,
        }
    }
}

/// A message whose role is pinned to `system`.
///
/// Constructed directly from content or narrowed from a [`Message`]; any
/// attempt to set a different role fails and leaves the value unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Message", into = "Message")]
pub struct SystemMessage(Message);

impl SystemMessage {
    /// Creates a new system message.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self(Message::system(content))
    }

    /// Returns the message identifier.
    #[must_use]
    pub fn id(&self) -> MessageId {
        self.0.id
    }

    /// Returns the role, which is always [`Role::System`].
    #[must_use]
    pub fn role(&self) -> Role {
        self.0.role
    }

    /// Returns the message content.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.0.content
    }

    /// Replaces the message content.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.0.content = content.into();
    }

    /// Attempts to set the role.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::RolePinned`] for any role other than
    /// [`Role::System`]; the stored role is left unchanged.
    pub fn set_role(&mut self, role: Role) -> Result<(), MessageError> {
        if role != Role::System {
            debug!(attempted = %role, "rejected role change on system message");
            return Err(MessageError::RolePinned { role });
        }
        Ok(())
    }

    /// Borrows the underlying message.
    #[must_use]
    pub fn as_message(&self) -> &Message {
        &self.0
    }

    /// Widens back into a plain message.
    #[must_use]
    pub fn into_message(self) -> Message {
        self.0
    }

    /// Produces the canonical record form of this message.
    #[must_use]
    pub fn to_record(&self, include_id: bool) -> MessageRecord {
        self.0.to_record(include_id)
    }
}

impl TryFrom<Message> for SystemMessage {
    type Error = MessageError;

    fn try_from(message: Message) -> Result<Self, Self::Error> {
        if message.role != Role::System {
            return Err(MessageError::NotSystem { role: message.role });
        }
        Ok(Self(message))
    }
}

impl From<SystemMessage> for Message {
    fn from(message: SystemMessage) -> Self {
        message.0
    }
}
