//! Conversation domain for colloquy.
//!
//! This crate provides:
//!
//! - **Message model**: validated roles, messages, and system messages
//! - **Conversation**: ordered prompt/response exchanges plus a pending prompt
//! - **Run driver**: the bounded retry loop that submits a pending prompt
//!   through a [`ChatAdapter`] and folds the response back into the
//!   conversation

pub mod adapter;
pub mod collection;
pub mod conversation;
pub mod error;
pub mod exchange;
pub mod message;
pub mod run;

pub use adapter::{AdapterError, CallOptions, ChatAdapter};
pub use collection::MessageCollection;
pub use conversation::{Conversation, ConversationRecord};
pub use error::{CollectionError, ConversationError, ExchangeError, MessageError};
pub use exchange::{Exchange, ExchangeRecord};
pub use message::{Message, MessageRecord, Role, SystemMessage};
pub use run::{Run, RunError, RunOptions, RunStatus};
