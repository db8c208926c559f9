//! A scripted, in-memory adapter.
//!
//! `CannedAdapter` replays a fixed script of outcomes instead of calling
//! a provider. It exists for tests and offline runs: failure injection,
//! deterministic replies, no network.

use crate::record;
use colloquy_conversation::{AdapterError, CallOptions, ChatAdapter, Conversation, Message, Role};
use serde_json::Value as JsonValue;
use std::collections::VecDeque;
use std::sync::Mutex;

/// One scripted callback outcome.
#[derive(Debug, Clone)]
pub enum CannedOutcome {
    /// The callback succeeds with an assistant reply.
    Reply(String),
    /// The callback fails with the given error.
    Fail(AdapterError),
}

/// A [`ChatAdapter`] that replays a scripted sequence of outcomes.
///
/// The submission payload is the flat record list from
/// [`record::flatten`]; responses are `{role, content}` objects. Once the
/// script is exhausted every further callback fails.
#[derive(Debug)]
pub struct CannedAdapter {
    script: Mutex<VecDeque<CannedOutcome>>,
}

impl CannedAdapter {
    /// Creates an adapter from a script of outcomes.
    #[must_use]
    pub fn new(script: impl IntoIterator<Item = CannedOutcome>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
        }
    }

    /// Creates an adapter that replies successfully, in order.
    #[must_use]
    pub fn replies(replies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::new(
            replies
                .into_iter()
                .map(|content| CannedOutcome::Reply(content.into())),
        )
    }

    /// Returns the number of outcomes left in the script.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn next_outcome(&self) -> Option<CannedOutcome> {
        self.script.lock().ok().and_then(|mut s| s.pop_front())
    }
}

impl ChatAdapter for CannedAdapter {
    fn from_conversation(&self, conversation: &Conversation) -> Result<JsonValue, AdapterError> {
        serde_json::to_value(record::flatten(conversation)).map_err(|e| {
            AdapterError::RequestFailed {
                reason: e.to_string(),
            }
        })
    }

    fn to_message(&self, raw: &JsonValue) -> Result<Message, AdapterError> {
        let record: record::ChatRecord =
            serde_json::from_value(raw.clone()).map_err(|e| AdapterError::ResponseMalformed {
                reason: e.to_string(),
            })?;
        let message = record
            .into_message()
            .map_err(|e| AdapterError::ResponseMalformed {
                reason: e.to_string(),
            })?;
        if message.role != Role::Assistant {
            return Err(AdapterError::ResponseMalformed {
                reason: format!("expected role 'assistant', found '{}'", message.role),
            });
        }
        Ok(message)
    }

    fn llm_callback(
        &self,
        _conversation: &Conversation,
        _options: &CallOptions,
    ) -> Result<JsonValue, AdapterError> {
        match self.next_outcome() {
            Some(CannedOutcome::Reply(content)) => {
                Ok(serde_json::json!({"role": "assistant", "content": content}))
            }
            Some(CannedOutcome::Fail(err)) => Err(err),
            None => Err(AdapterError::RequestFailed {
                reason: "canned script exhausted".to_string(),
            }),
        }
    }
}
