//! Error handling foundation for colloquy.
//!
//! This module provides only the `Result` type alias using rootcause.
//! Each crate defines its own domain-specific error enums in its own
//! error module and uses rootcause's `.context()` to attach
//! layer-appropriate context as errors cross crate boundaries.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
