//! The provider adapter boundary.
//!
//! The core never talks to an LLM provider directly. Everything a
//! provider integration must supply is captured by [`ChatAdapter`]:
//! payload adaptation in both directions and the submission call itself.
//! Payloads are opaque [`serde_json::Value`]s; their shape belongs to the
//! adapter, not the core.

use crate::conversation::Conversation;
use crate::message::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;

/// Per-call options handed through to the adapter.
///
/// The timeout is advisory: the driver records it and passes it along, but
/// enforcement (if any) is the adapter's job. Provider-specific knobs
/// (model name, penalties, response format, token budgets) travel in
/// `extra` and are never interpreted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallOptions {
    /// Advisory per-attempt timeout in seconds.
    pub timeout_secs: u64,
    /// Provider-specific options, passed through opaquely.
    pub extra: HashMap<String, JsonValue>,
}

impl CallOptions {
    /// Creates options with the default timeout and no provider knobs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the advisory timeout.
    #[must_use]
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Adds a provider-specific option.
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            extra: HashMap::new(),
        }
    }
}

/// Errors an adapter can report to the run driver.
///
/// `TokenLimitExceeded` is the one condition the driver treats as fatal:
/// resubmitting the same oversized payload cannot succeed, so it is never
/// retried. Every other variant is considered transient and retryable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// The submission payload exceeds the provider's token budget.
    TokenLimitExceeded { submitted: u64, limit: u64 },
    /// The provider could not be reached.
    ProviderUnavailable { provider: String, reason: String },
    /// The submission was rejected or failed in transit.
    RequestFailed { reason: String },
    /// The raw response did not have the expected shape.
    ResponseMalformed { reason: String },
    /// The provider did not answer within the adapter's deadline.
    Timeout,
    /// The provider asked us to slow down.
    RateLimited { retry_after_secs: Option<u64> },
}

impl AdapterError {
    /// Returns true for the fatal, never-retried token limit condition.
    #[must_use]
    pub fn is_token_limit(&self) -> bool {
        matches!(self, Self::TokenLimitExceeded { .. })
    }
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TokenLimitExceeded { submitted, limit } => {
                write!(f, "token limit exceeded: submission is {submitted} tokens, limit is {limit}")
            }
            Self::ProviderUnavailable { provider, reason } => {
                write!(f, "provider '{provider}' unavailable: {reason}")
            }
            Self::RequestFailed { reason } => write!(f, "submission failed: {reason}"),
            Self::ResponseMalformed { reason } => {
                write!(f, "malformed provider response: {reason}")
            }
            Self::Timeout => write!(f, "provider request timed out"),
            Self::RateLimited { retry_after_secs } => {
                if let Some(secs) = retry_after_secs {
                    write!(f, "rate limited, retry after {secs}s")
                } else {
                    write!(f, "rate limited")
                }
            }
        }
    }
}

impl std::error::Error for AdapterError {}

/// Capability set the run driver requires from a provider integration.
pub trait ChatAdapter: Send + Sync {
    /// Builds the provider submission payload from the full conversation.
    ///
    /// Implementations must not mutate the conversation and must include
    /// the system message, every exchange in order, and the pending
    /// prompt when present.
    ///
    /// # Errors
    ///
    /// Returns an [`AdapterError`] when the conversation cannot be
    /// represented in the provider's format, including
    /// [`AdapterError::TokenLimitExceeded`] for adapters that budget
    /// tokens up front.
    fn from_conversation(&self, conversation: &Conversation) -> Result<JsonValue, AdapterError>;

    /// Adapts a raw provider response into an assistant [`Message`].
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::ResponseMalformed`] when the raw response
    /// lacks the expected shape.
    fn to_message(&self, raw: &JsonValue) -> Result<Message, AdapterError>;

    /// Performs the actual provider submission.
    ///
    /// # Errors
    ///
    /// Returns a provider-defined [`AdapterError`] on transport or
    /// protocol failure; the token limit condition must be reported as
    /// [`AdapterError::TokenLimitExceeded`] so the driver can refuse to
    /// retry it.
    fn llm_callback(
        &self,
        conversation: &Conversation,
        options: &CallOptions,
    ) -> Result<JsonValue, AdapterError>;
}
