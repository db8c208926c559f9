//! Core domain types for the colloquy conversation library.
//!
//! This crate provides the strongly-typed identifiers and the error
//! handling foundation shared by the colloquy crates.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{MessageId, ParseIdError, RunId};
