//! Wire-format building blocks for colloquy adapters.
//!
//! Most chat providers accept an ordered list of `{role, content}`
//! records. This crate provides:
//!
//! - **Records**: lossy flattening of a [`Conversation`] into that list,
//!   and validated reconstruction back out of it
//! - **Canned adapter**: a scripted, in-memory [`ChatAdapter`] for tests
//!   and offline use
//!
//! [`Conversation`]: colloquy_conversation::Conversation
//! [`ChatAdapter`]: colloquy_conversation::ChatAdapter

pub mod canned;
pub mod record;

pub use canned::{CannedAdapter, CannedOutcome};
pub use record::{ChatRecord, WireError, flatten, reconstruct};
