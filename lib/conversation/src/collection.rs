//! Ordered, ID-addressable message collections.

use crate::error::CollectionError;
use crate::message::{Message, MessageRecord, Role};
use colloquy_core::MessageId;
use serde::{Deserialize, Serialize};

/// An ordered collection of messages, addressable by ID.
///
/// Insertion order is significant and preserved through serialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageCollection {
    messages: Vec<Message>,
}

impl MessageCollection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a message in place and returns its identifier.
    pub fn create(&mut self, role: Role, content: impl Into<String>) -> MessageId {
        let message = Message::new(role, content);
        let id = message.id;
        self.messages.push(message);
        id
    }

    /// Appends an existing message.
    pub fn add(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Removes a message by identity and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::NotFound`] if no member has the given ID;
    /// removal never silently no-ops.
    pub fn remove(&mut self, id: MessageId) -> Result<Message, CollectionError> {
        let index = self
            .messages
            .iter()
            .position(|m| m.id == id)
            .ok_or(CollectionError::NotFound { id })?;
        Ok(self.messages.remove(index))
    }

    /// Looks up a message by identity.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::NotFound`] if no member has the given ID.
    pub fn get(&self, id: MessageId) -> Result<&Message, CollectionError> {
        self.messages
            .iter()
            .find(|m| m.id == id)
            .ok_or(CollectionError::NotFound { id })
    }

    /// Returns all messages in insertion order.
    #[must_use]
    pub fn list(&self) -> &[Message] {
        &self.messages
    }

    /// Iterates over the messages in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    /// Returns the number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if the collection holds no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Produces the list-of-records form of the collection.
    #[must_use]
    pub fn to_records(&self, include_id: bool) -> Vec<MessageRecord> {
        self.messages.iter().map(|m| m.to_record(include_id)).collect()
    }

    /// Serializes the collection to JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::InvalidPayload`] if encoding fails.
    pub fn serialize(&self) -> Result<String, CollectionError> {
        serde_json::to_string(&self.to_records(true))
            .map_err(|e| CollectionError::InvalidPayload {
                reason: e.to_string(),
            })
    }

    /// Rebuilds a collection from JSON text produced by [`serialize`].
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::InvalidPayload`] on malformed JSON or on
    /// any record whose role fails validation.
    ///
    /// [`serialize`]: MessageCollection::serialize
    pub fn deserialize(json: &str) -> Result<Self, CollectionError> {
        let records: Vec<MessageRecord> =
            serde_json::from_str(json).map_err(|e| CollectionError::InvalidPayload {
                reason: e.to_string(),
            })?;

        let messages = records
            .into_iter()
            .map(|record| {
                Message::try_from(record).map_err(|e| CollectionError::InvalidPayload {
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { messages })
    }
}

impl<'a> IntoIterator for &'a MessageCollection {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
