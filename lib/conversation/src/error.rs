//! Error types for the conversation crate.
//!
//! Each concern carries its own enum:
//! - `MessageError`: role validation failures
//! - `CollectionError`: message collection lookups and payload decoding
//! - `ExchangeError`: prompt/response pairing violations
//! - `ConversationError`: conversation-level preconditions and payloads
//!
//! Submission errors live with the adapter boundary
//! ([`crate::adapter::AdapterError`]) and the run driver
//! ([`crate::run::RunError`]).

use crate::message::Role;
use colloquy_core::MessageId;
use std::fmt;

/// Errors from message role validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    /// The role value is not one of user/assistant/system.
    InvalidRole { role: String },
    /// A system message rejected an attempt to change its role.
    RolePinned { role: Role },
    /// A narrowing conversion expected a system message.
    NotSystem { role: Role },
}

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRole { role } => {
                write!(f, "invalid role: '{role}' is not one of user, assistant, system")
            }
            Self::RolePinned { role } => {
                write!(f, "system message role is pinned: cannot set role to '{role}'")
            }
            Self::NotSystem { role } => {
                write!(f, "expected a system message, found role '{role}'")
            }
        }
    }
}

impl std::error::Error for MessageError {}

/// Errors from message collection operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionError {
    /// No message with the given ID is a member of the collection.
    NotFound { id: MessageId },
    /// Serialized input could not be decoded into messages.
    InvalidPayload { reason: String },
}

impl fmt::Display for CollectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { id } => write!(f, "message not found: {id}"),
            Self::InvalidPayload { reason } => {
                write!(f, "invalid message payload: {reason}")
            }
        }
    }
}

impl std::error::Error for CollectionError {}

/// Errors from exchange validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    /// The prompt side of an exchange must be a user message.
    PromptRole { role: Role },
    /// The response side of an exchange must be an assistant message.
    ResponseRole { role: Role },
    /// A serialized exchange contained an invalid message.
    InvalidMessage { reason: String },
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PromptRole { role } => {
                write!(f, "exchange prompt must have role 'user', found '{role}'")
            }
            Self::ResponseRole { role } => {
                write!(f, "exchange response must have role 'assistant', found '{role}'")
            }
            Self::InvalidMessage { reason } => {
                write!(f, "invalid exchange message: {reason}")
            }
        }
    }
}

impl std::error::Error for ExchangeError {}

/// Errors from conversation operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationError {
    /// The pending prompt must be a user message.
    PromptRole { role: Role },
    /// Serialized input could not be decoded into a conversation.
    InvalidPayload { reason: String },
}

impl fmt::Display for ConversationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PromptRole { role } => {
                write!(f, "next prompt must have role 'user', found '{role}'")
            }
            Self::InvalidPayload { reason } => {
                write!(f, "invalid conversation payload: {reason}")
            }
        }
    }
}

impl std::error::Error for ConversationError {}
