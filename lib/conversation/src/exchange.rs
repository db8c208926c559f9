//! A validated prompt/response pair.

use crate::error::ExchangeError;
use crate::message::{Message, MessageRecord, Role};
use serde::{Deserialize, Serialize};

/// One user prompt paired with its assistant response.
///
/// The pairing invariant (prompt is `user`, response is `assistant`) is
/// enforced at construction and on every reassignment, so holding an
/// `Exchange` is proof that both sides are valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ExchangeRecord", into = "ExchangeRecord")]
pub struct Exchange {
    prompt: Message,
    response: Message,
}

impl Exchange {
    /// Creates a validated exchange.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::PromptRole`] or
    /// [`ExchangeError::ResponseRole`] when either side carries the wrong
    /// role.
    pub fn new(prompt: Message, response: Message) -> Result<Self, ExchangeError> {
        if prompt.role != Role::User {
            return Err(ExchangeError::PromptRole { role: prompt.role });
        }
        if response.role != Role::Assistant {
            return Err(ExchangeError::ResponseRole {
                role: response.role,
            });
        }
        Ok(Self { prompt, response })
    }

    /// Returns the prompt message.
    #[must_use]
    pub fn prompt(&self) -> &Message {
        &self.prompt
    }

    /// Returns the response message.
    #[must_use]
    pub fn response(&self) -> &Message {
        &self.response
    }

    /// Replaces the prompt, re-validating its role.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::PromptRole`] and leaves the exchange
    /// unchanged when the new prompt is not a user message.
    pub fn set_prompt(&mut self, prompt: Message) -> Result<(), ExchangeError> {
        if prompt.role != Role::User {
            return Err(ExchangeError::PromptRole { role: prompt.role });
        }
        self.prompt = prompt;
        Ok(())
    }

    /// Replaces the response, re-validating its role.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::ResponseRole`] and leaves the exchange
    /// unchanged when the new response is not an assistant message.
    pub fn set_response(&mut self, response: Message) -> Result<(), ExchangeError> {
        if response.role != Role::Assistant {
            return Err(ExchangeError::ResponseRole {
                role: response.role,
            });
        }
        self.response = response;
        Ok(())
    }

    /// Produces the canonical record form of this exchange.
    #[must_use]
    pub fn to_record(&self, include_id: bool) -> ExchangeRecord {
        ExchangeRecord {
            prompt: self.prompt.to_record(include_id),
            response: self.response.to_record(include_id),
        }
    }
}

/// Canonical record form of an exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRecord {
    /// The user prompt record.
    pub prompt: MessageRecord,
    /// The assistant response record.
    pub response: MessageRecord,
}

impl TryFrom<ExchangeRecord> for Exchange {
    type Error = ExchangeError;

    fn try_from(record: ExchangeRecord) -> Result<Self, Self::Error> {
        let prompt =
            Message::try_from(record.prompt).map_err(|e| ExchangeError::InvalidMessage {
                reason: e.to_string(),
            })?;
        let response =
            Message::try_from(record.response).map_err(|e| ExchangeError::InvalidMessage {
                reason: e.to_string(),
            })?;
        Self::new(prompt, response)
    }
}

impl From<Exchange> for ExchangeRecord {
    fn from(exchange: Exchange) -> Self {
        exchange.to_record(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_pairing() {
        let prompt = Message::user("What time is it?");
        let response = Message::assistant("Half past.");
        let exchange = Exchange::new(prompt.clone(), response.clone()).expect("valid pairing");
        assert_eq!(exchange.prompt().id, prompt.id);
        assert_eq!(exchange.response().id, response.id);
        assert_eq!(exchange.prompt().content, "What time is it?");
    }

    #[test]
    fn rejects_non_user_prompt() {
        let err = Exchange::new(Message::system("nope"), Message::assistant("ok")).unwrap_err();
        assert!(matches!(err, ExchangeError::PromptRole { role: Role::System }));
    }

    #[test]
    fn rejects_non_assistant_response() {
        let err = Exchange::new(Message::user("hi"), Message::user("hi again")).unwrap_err();
        assert!(matches!(err, ExchangeError::ResponseRole { role: Role::User }));
    }

    #[test]
    fn set_prompt_revalidates() {
        let mut exchange =
            Exchange::new(Message::user("a"), Message::assistant("b")).expect("valid");
        let err = exchange.set_prompt(Message::assistant("c")).unwrap_err();
        assert!(matches!(err, ExchangeError::PromptRole { .. }));
        assert_eq!(exchange.prompt().content, "a");

        exchange.set_prompt(Message::user("d")).expect("user prompt");
        assert_eq!(exchange.prompt().content, "d");
    }

    #[test]
    fn set_response_revalidates() {
        let mut exchange =
            Exchange::new(Message::user("a"), Message::assistant("b")).expect("valid");
        let err = exchange.set_response(Message::system("c")).unwrap_err();
        assert!(matches!(err, ExchangeError::ResponseRole { .. }));
        assert_eq!(exchange.response().content, "b");
    }

    #[test]
    fn serde_roundtrip() {
        let exchange =
            Exchange::new(Message::user("ping"), Message::assistant("pong")).expect("valid");
        let json = serde_json::to_string(&exchange).expect("serialize");
        let parsed: Exchange = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.prompt().content, "ping");
        assert_eq!(parsed.response().content, "pong");
        assert_eq!(parsed.prompt().id, exchange.prompt().id);
    }

    #[test]
    fn serde_rejects_bad_pairing() {
        let record = ExchangeRecord {
            prompt: Message::assistant("wrong side").to_record(true),
            response: Message::assistant("fine").to_record(true),
        };
        let json = serde_json::to_string(&record).expect("serialize");
        let result: Result<Exchange, _> = serde_json::from_str(&json);
        assert!(result.is_err());
    }
}
