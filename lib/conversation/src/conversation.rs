//! The full ordered dialogue state.
//!
//! A [`Conversation`] is a system message, the ordered exchanges so far,
//! and at most one pending user prompt waiting to be submitted. The run
//! driver in [`crate::run`] is the only thing that turns a pending prompt
//! into a completed exchange.

use crate::error::ConversationError;
use crate::exchange::{Exchange, ExchangeRecord};
use crate::message::{Message, Role, SystemMessage};
use serde::{Deserialize, Serialize};

/// A multi-turn conversation: system message, exchanges, pending prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ConversationRecord", into = "ConversationRecord")]
pub struct Conversation {
    system_message: SystemMessage,
    exchanges: Vec<Exchange>,
    next_prompt: Option<Message>,
}

impl Conversation {
    /// Creates a conversation with no prior history.
    #[must_use]
    pub fn new(system_message: SystemMessage) -> Self {
        Self {
            system_message,
            exchanges: Vec::new(),
            next_prompt: None,
        }
    }

    /// Seeds the conversation with prior exchanges.
    #[must_use]
    pub fn with_exchanges(mut self, exchanges: Vec<Exchange>) -> Self {
        self.exchanges = exchanges;
        self
    }

    /// Returns the system message.
    #[must_use]
    pub fn system_message(&self) -> &SystemMessage {
        &self.system_message
    }

    /// Replaces the system message.
    pub fn set_system_message(&mut self, system_message: SystemMessage) {
        self.system_message = system_message;
    }

    /// Returns the exchanges in turn order.
    #[must_use]
    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    /// Appends a completed exchange.
    ///
    /// An [`Exchange`] is validated at construction, so appending cannot
    /// introduce an invalid pairing.
    pub fn append(&mut self, exchange: Exchange) {
        self.exchanges.push(exchange);
    }

    /// Returns the pending prompt, if one is set.
    #[must_use]
    pub fn next_prompt(&self) -> Option<&Message> {
        self.next_prompt.as_ref()
    }

    /// Sets the pending prompt.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationError::PromptRole`] when the message is not a
    /// user message; the existing pending prompt is left unchanged.
    pub fn set_next_prompt(&mut self, prompt: Message) -> Result<(), ConversationError> {
        if prompt.role != Role::User {
            return Err(ConversationError::PromptRole { role: prompt.role });
        }
        self.next_prompt = Some(prompt);
        Ok(())
    }

    /// Removes and returns the pending prompt.
    pub fn clear_next_prompt(&mut self) -> Option<Message> {
        self.next_prompt.take()
    }

    /// Iterates over every message in provider order: the system message,
    /// each exchange's prompt then response, and the pending prompt last.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        std::iter::once(self.system_message.as_message())
            .chain(
                self.exchanges
                    .iter()
                    .flat_map(|exchange| [exchange.prompt(), exchange.response()]),
            )
            .chain(self.next_prompt.as_ref())
    }

    /// Returns the total number of messages, pending prompt included.
    #[must_use]
    pub fn message_count(&self) -> usize {
        1 + self.exchanges.len() * 2 + usize::from(self.next_prompt.is_some())
    }

    /// Produces the canonical record form of the conversation.
    ///
    /// The pending prompt is transient state and is not part of the
    /// canonical representation.
    #[must_use]
    pub fn to_record(&self, include_id: bool) -> ConversationRecord {
        ConversationRecord {
            system_message: self.system_message.to_record(include_id),
            chat_exchanges: self
                .exchanges
                .iter()
                .map(|exchange| exchange.to_record(include_id))
                .collect(),
        }
    }

    /// Serializes the conversation to JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationError::InvalidPayload`] if encoding fails.
    pub fn serialize(&self) -> Result<String, ConversationError> {
        serde_json::to_string(&self.to_record(true)).map_err(|e| {
            ConversationError::InvalidPayload {
                reason: e.to_string(),
            }
        })
    }

    /// Rebuilds a conversation from JSON text produced by [`serialize`].
    ///
    /// # Errors
    ///
    /// Returns [`ConversationError::InvalidPayload`] on malformed JSON or
    /// when any embedded message fails role validation.
    ///
    /// [`serialize`]: Conversation::serialize
    pub fn deserialize(json: &str) -> Result<Self, ConversationError> {
        let record: ConversationRecord =
            serde_json::from_str(json).map_err(|e| ConversationError::InvalidPayload {
                reason: e.to_string(),
            })?;
        Self::try_from(record)
    }
}

/// Canonical record form of a conversation:
/// `{"system_message": {...}, "chat_exchanges": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// The system message record.
    pub system_message: crate::message::MessageRecord,
    /// The exchange records in turn order.
    pub chat_exchanges: Vec<ExchangeRecord>,
}

impl TryFrom<ConversationRecord> for Conversation {
    type Error = ConversationError;

    fn try_from(record: ConversationRecord) -> Result<Self, Self::Error> {
        let message =
            Message::try_from(record.system_message).map_err(|e| {
                ConversationError::InvalidPayload {
                    reason: e.to_string(),
                }
            })?;
        let system_message =
            SystemMessage::try_from(message).map_err(|e| ConversationError::InvalidPayload {
                reason: e.to_string(),
            })?;

        let exchanges = record
            .chat_exchanges
            .into_iter()
            .map(|exchange| {
                Exchange::try_from(exchange).map_err(|e| ConversationError::InvalidPayload {
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            system_message,
            exchanges,
            next_prompt: None,
        })
    }
}

impl From<Conversation> for ConversationRecord {
    fn from(conversation: Conversation) -> Self {
        conversation.to_record(true)
    }
}
