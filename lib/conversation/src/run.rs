//! The conversation run state machine.
//!
//! A [`Run`] tracks one attempt-cycle of submitting a conversation's
//! pending prompt through a [`ChatAdapter`]: payload adaptation, a
//! bounded retry loop with a fixed delay between attempts, and the fold
//! of a successful response back into the conversation as a new
//! [`Exchange`].
//!
//! The driver is synchronous and single-threaded per run. Exactly one
//! attempt is in flight at a time, and the advisory timeout is recorded
//! and handed to the adapter rather than enforced here; the driver's job
//! is attempt bookkeeping, not scheduling.

use crate::adapter::{AdapterError, CallOptions, ChatAdapter};
use crate::conversation::Conversation;
use crate::exchange::Exchange;
use crate::message::Message;
use chrono::{DateTime, Utc};
use colloquy_core::RunId;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Lifecycle states of a run.
///
/// The driver moves through `Unsubmitted` → `Pending` → `Submitted` and
/// ends in `Completed` or `Failed`, passing through `Error` between
/// failed attempts. `Queued` is reserved for drivers that defer
/// submission and is never set here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// No attempt has been made yet.
    Unsubmitted,
    /// The run is constructed and the payload has been adapted.
    Pending,
    /// An attempt is in flight.
    Submitted,
    /// Reserved: deferred submission.
    Queued,
    /// The response has been folded into the conversation.
    Completed,
    /// The most recent attempt failed; more attempts remain.
    Error,
    /// The run ended without a response.
    Failed,
}

impl RunStatus {
    /// Returns true for the two end states.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Options controlling a single run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Maximum number of submissions (3 permits exactly 3 attempts).
    pub max_attempts: u32,
    /// Fixed delay between failed attempts.
    pub retry_delay: Duration,
    /// Options handed through to the adapter on every attempt.
    pub call: CallOptions,
}

impl RunOptions {
    /// Creates options with the defaults: 3 attempts, 3 second delay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the delay between failed attempts.
    #[must_use]
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Sets the advisory per-attempt timeout.
    #[must_use]
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.call.timeout_secs = timeout_secs;
        self
    }

    /// Adds a provider-specific option.
    #[must_use]
    pub fn with_call_option(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.call.extra.insert(key.into(), value);
        self
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(3),
            call: CallOptions::default(),
        }
    }
}

/// Bookkeeping for one attempt-cycle of submitting a pending prompt.
///
/// A run is owned by the caller of [`Conversation::run`] and is
/// self-contained: instead of a live back-reference it carries a value
/// snapshot of the conversation taken at the moment of success, before
/// the new exchange was appended.
#[derive(Debug, Clone)]
pub struct Run {
    /// Unique run identifier.
    pub id: RunId,
    /// When the run was constructed.
    pub created_at: DateTime<Utc>,
    /// When the most recent attempt was submitted.
    pub submitted_at: Option<DateTime<Utc>>,
    /// When the run completed successfully.
    pub completed_at: Option<DateTime<Utc>>,
    /// Milliseconds from creation to completion.
    pub duration_ms: Option<i64>,
    /// Attempts made so far.
    pub attempts: u32,
    /// Attempt budget for this run.
    pub max_attempts: u32,
    /// Advisory per-attempt timeout, in seconds.
    pub timeout_secs: u64,
    /// Current lifecycle state.
    pub status: RunStatus,
    /// The adapted submission payload.
    pub payload: Option<JsonValue>,
    /// Conversation state captured on success, before the append.
    pub snapshot: Option<Conversation>,
    /// The raw provider response that completed the run.
    pub raw_response: Option<JsonValue>,
    /// The adapted assistant response.
    pub response: Option<Message>,
    /// Every attempt's error, in order.
    pub errors: Vec<AdapterError>,
}

impl Run {
    fn new(max_attempts: u32, timeout_secs: u64) -> Self {
        Self {
            id: RunId::new(),
            created_at: Utc::now(),
            submitted_at: None,
            completed_at: None,
            duration_ms: None,
            attempts: 0,
            max_attempts,
            timeout_secs,
            status: RunStatus::Unsubmitted,
            payload: None,
            snapshot: None,
            raw_response: None,
            response: None,
            errors: Vec::new(),
        }
    }

    /// Returns the most recent error, if any attempt has failed.
    #[must_use]
    pub fn last_error(&self) -> Option<&AdapterError> {
        self.errors.last()
    }

    fn complete(&mut self, raw: JsonValue, response: Message) {
        self.raw_response = Some(raw);
        self.response = Some(response);
        self.status = RunStatus::Completed;
        let completed = Utc::now();
        self.completed_at = Some(completed);
        self.duration_ms = Some((completed - self.created_at).num_milliseconds());
    }
}

/// The two conditions under which [`Conversation::run`] returns an error
/// instead of a run to inspect.
#[derive(Debug)]
pub enum RunError {
    /// The conversation has no pending prompt to submit.
    MissingPrompt,
    /// The adapter reported a token limit overflow; retrying the same
    /// payload cannot succeed. The failed run travels inside the error.
    TokenLimit { run: Box<Run>, reason: String },
}

impl RunError {
    /// Extracts the failed run for diagnostics, when one exists.
    #[must_use]
    pub fn into_run(self) -> Option<Run> {
        match self {
            Self::MissingPrompt => None,
            Self::TokenLimit { run, .. } => Some(*run),
        }
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingPrompt => {
                write!(f, "next prompt must be set before running the conversation")
            }
            Self::TokenLimit { reason, .. } => write!(f, "{reason}"),
        }
    }
}

impl std::error::Error for RunError {}

impl Conversation {
    /// Submits the pending prompt through the adapter, retrying failed
    /// attempts up to `options.max_attempts` times with a fixed delay.
    ///
    /// On success the conversation gains exactly one new exchange and the
    /// pending prompt is consumed; on failure the pending prompt is held
    /// so the caller can run again. Except for the two fatal paths below,
    /// the run is returned for inspection and `run.status` communicates
    /// the outcome — `Completed` or `Failed`.
    ///
    /// # Errors
    ///
    /// - [`RunError::MissingPrompt`] when no pending prompt is set; no run
    ///   is constructed and the conversation is untouched.
    /// - [`RunError::TokenLimit`] when the adapter reports a token limit
    ///   overflow; the condition is deterministic for a given payload, so
    ///   it is never retried.
    pub fn run(
        &mut self,
        adapter: &dyn ChatAdapter,
        options: RunOptions,
    ) -> Result<Run, RunError> {
        if self.next_prompt().is_none() {
            return Err(RunError::MissingPrompt);
        }

        let mut run = Run::new(options.max_attempts, options.call.timeout_secs);
        debug!(run_id = %run.id, max_attempts = run.max_attempts, "starting conversation run");

        match adapter.from_conversation(self) {
            Ok(payload) => run.payload = Some(payload),
            Err(err) if err.is_token_limit() => {
                error!(run_id = %run.id, %err, "payload adaptation exceeded token limit");
                return Err(fail_fatal(run, err));
            }
            Err(err) => {
                error!(run_id = %run.id, %err, "payload adaptation failed");
                run.errors.push(err);
                run.status = RunStatus::Failed;
                return Ok(run);
            }
        }
        run.status = RunStatus::Pending;

        while run.attempts < run.max_attempts {
            run.submitted_at = Some(Utc::now());
            run.attempts += 1;
            run.status = RunStatus::Submitted;
            debug!(run_id = %run.id, attempt = run.attempts, "submitting conversation");

            let failure = match adapter.llm_callback(self, &options.call) {
                Ok(raw) => match adapter.to_message(&raw) {
                    Ok(response) => {
                        let Some(prompt) = self.next_prompt().cloned() else {
                            // Unreachable: the prompt is only consumed on
                            // the success path, which returns.
                            return Err(RunError::MissingPrompt);
                        };
                        match Exchange::new(prompt, response.clone()) {
                            Ok(exchange) => {
                                // Audit copy of the pre-append state.
                                run.snapshot = Some(self.clone());
                                self.clear_next_prompt();
                                self.append(exchange);
                                run.complete(raw, response);
                                debug!(
                                    run_id = %run.id,
                                    attempts = run.attempts,
                                    duration_ms = run.duration_ms,
                                    "run completed"
                                );
                                return Ok(run);
                            }
                            // The adapter broke its contract and produced
                            // a non-assistant message.
                            Err(err) => AdapterError::ResponseMalformed {
                                reason: err.to_string(),
                            },
                        }
                    }
                    Err(err) if err.is_token_limit() => {
                        error!(run_id = %run.id, attempt = run.attempts, %err, "token limit exceeded");
                        return Err(fail_fatal(run, err));
                    }
                    Err(err) => err,
                },
                Err(err) if err.is_token_limit() => {
                    error!(run_id = %run.id, attempt = run.attempts, %err, "token limit exceeded");
                    return Err(fail_fatal(run, err));
                }
                Err(err) => err,
            };

            warn!(run_id = %run.id, attempt = run.attempts, error = %failure, "attempt failed");
            run.errors.push(failure);
            run.status = RunStatus::Error;

            if run.attempts >= run.max_attempts {
                error!(run_id = %run.id, attempts = run.attempts, "attempts exhausted, run failed");
                run.status = RunStatus::Failed;
                return Ok(run);
            }
            thread::sleep(options.retry_delay);
        }

        // Only reachable with an attempt budget of zero.
        run.status = RunStatus::Failed;
        Ok(run)
    }
}

fn fail_fatal(mut run: Run, err: AdapterError) -> RunError {
    let reason = err.to_string();
    run.errors.push(err);
    run.status = RunStatus::Failed;
    RunError::TokenLimit {
        run: Box::new(run),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Role, SystemMessage};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Adapter that replays a scripted sequence of callback outcomes.
    struct ScriptedAdapter {
        outcomes: Mutex<VecDeque<Result<JsonValue, AdapterError>>>,
    }

    impl ScriptedAdapter {
        fn new(outcomes: Vec<Result<JsonValue, AdapterError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
            }
        }

        fn reply(content: &str) -> Result<JsonValue, AdapterError> {
            Ok(serde_json::json!({"role": "assistant", "content": content}))
        }
    }

    impl ChatAdapter for ScriptedAdapter {
        fn from_conversation(
            &self,
            conversation: &Conversation,
        ) -> Result<JsonValue, AdapterError> {
            let records: Vec<JsonValue> = conversation
                .messages()
                .map(|m| serde_json::json!({"role": m.role.as_str(), "content": m.content}))
                .collect();
            Ok(JsonValue::Array(records))
        }

        fn to_message(&self, raw: &JsonValue) -> Result<Message, AdapterError> {
            let role = raw
                .get("role")
                .and_then(JsonValue::as_str)
                .ok_or_else(|| AdapterError::ResponseMalformed {
                    reason: "missing 'role'".to_string(),
                })?;
            let content = raw
                .get("content")
                .and_then(JsonValue::as_str)
                .ok_or_else(|| AdapterError::ResponseMalformed {
                    reason: "missing 'content'".to_string(),
                })?;
            let role: Role = role.parse().map_err(|_| AdapterError::ResponseMalformed {
                reason: format!("unexpected role '{role}'"),
            })?;
            Ok(Message::new(role, content))
        }

        fn llm_callback(
            &self,
            _conversation: &Conversation,
            _options: &CallOptions,
        ) -> Result<JsonValue, AdapterError> {
            self.outcomes
                .lock()
                .expect("outcomes lock")
                .pop_front()
                .unwrap_or_else(|| {
                    Err(AdapterError::RequestFailed {
                        reason: "script exhausted".to_string(),
                    })
                })
        }
    }

    fn conversation_with_prompt(prompt: &str) -> Conversation {
        let mut convo = Conversation::new(SystemMessage::new("You are a test assistant."));
        convo
            .set_next_prompt(Message::user(prompt))
            .expect("user prompt");
        convo
    }

    fn fast_options(max_attempts: u32) -> RunOptions {
        RunOptions::new()
            .with_max_attempts(max_attempts)
            .with_retry_delay(Duration::ZERO)
    }

    fn transient_error() -> AdapterError {
        AdapterError::RequestFailed {
            reason: "connection reset".to_string(),
        }
    }

    #[test]
    fn missing_prompt_fails_without_side_effects() {
        let mut convo = Conversation::new(SystemMessage::new("sys"));
        let adapter = ScriptedAdapter::new(vec![ScriptedAdapter::reply("unused")]);

        let err = convo.run(&adapter, fast_options(3)).unwrap_err();
        assert!(matches!(err, RunError::MissingPrompt));
        assert!(convo.exchanges().is_empty());
        assert!(err.into_run().is_none());
    }

    #[test]
    fn first_attempt_success() {
        let mut convo = conversation_with_prompt("What is 2 + 2?");
        let prompt_id = convo.next_prompt().expect("pending").id;
        let adapter = ScriptedAdapter::new(vec![ScriptedAdapter::reply("4")]);

        let run = convo.run(&adapter, fast_options(3)).expect("run returns");

        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.status.is_terminal());
        assert_eq!(run.attempts, 1);
        assert!(run.errors.is_empty());
        assert!(run.payload.is_some());
        assert!(run.raw_response.is_some());
        assert_eq!(run.response.as_ref().expect("response").content, "4");
        assert!(run.submitted_at.is_some());
        assert!(run.completed_at.is_some());
        assert!(run.duration_ms.expect("duration") >= 0);

        // Exactly one new exchange, built from the original prompt.
        assert_eq!(convo.exchanges().len(), 1);
        let exchange = &convo.exchanges()[0];
        assert_eq!(exchange.prompt().id, prompt_id);
        assert_eq!(exchange.prompt().content, "What is 2 + 2?");
        assert_eq!(exchange.response().content, "4");

        // The prompt was consumed.
        assert!(convo.next_prompt().is_none());
    }

    #[test]
    fn snapshot_captures_pre_append_state() {
        let mut convo = conversation_with_prompt("ping");
        let adapter = ScriptedAdapter::new(vec![ScriptedAdapter::reply("pong")]);

        let run = convo.run(&adapter, fast_options(1)).expect("run returns");

        let snapshot = run.snapshot.expect("snapshot on success");
        assert!(snapshot.exchanges().is_empty());
        assert_eq!(snapshot.next_prompt().expect("still pending").content, "ping");
        assert_eq!(convo.exchanges().len(), 1);
    }

    #[test]
    fn fails_twice_then_succeeds() {
        let mut convo = conversation_with_prompt("still there?");
        let adapter = ScriptedAdapter::new(vec![
            Err(transient_error()),
            Err(AdapterError::Timeout),
            ScriptedAdapter::reply("yes"),
        ]);

        let run = convo.run(&adapter, fast_options(3)).expect("run returns");

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.attempts, 3);
        assert_eq!(run.errors.len(), 2);
        assert_eq!(run.errors[0], transient_error());
        assert_eq!(run.errors[1], AdapterError::Timeout);
        assert_eq!(convo.exchanges().len(), 1);
        assert_eq!(convo.exchanges()[0].prompt().content, "still there?");
    }

    #[test]
    fn exhaustion_reports_failed_without_error() {
        let mut convo = conversation_with_prompt("anyone?");
        let adapter = ScriptedAdapter::new(vec![
            Err(transient_error()),
            Err(transient_error()),
            Err(transient_error()),
        ]);

        let run = convo.run(&adapter, fast_options(3)).expect("run returns");

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.attempts, 3);
        assert_eq!(run.errors.len(), 3);
        assert!(convo.exchanges().is_empty());
        assert!(run.response.is_none());
        assert!(run.snapshot.is_none());

        // The prompt is held for another run.
        assert_eq!(convo.next_prompt().expect("held").content, "anyone?");
    }

    #[test]
    fn token_limit_is_fatal_and_never_retried() {
        let mut convo = conversation_with_prompt("a very long prompt");
        let adapter = ScriptedAdapter::new(vec![
            Err(AdapterError::TokenLimitExceeded {
                submitted: 9000,
                limit: 2048,
            }),
            ScriptedAdapter::reply("never reached"),
        ]);

        let err = convo.run(&adapter, fast_options(3)).unwrap_err();
        let RunError::TokenLimit { run, reason } = err else {
            panic!("expected token limit error");
        };

        assert!(reason.contains("token limit"));
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.attempts, 1);
        assert_eq!(run.errors.len(), 1);
        assert!(run.errors[0].is_token_limit());
        assert!(convo.exchanges().is_empty());
        assert_eq!(convo.next_prompt().expect("held").content, "a very long prompt");
    }

    #[test]
    fn malformed_response_counts_as_failed_attempt() {
        let mut convo = conversation_with_prompt("shape check");
        let adapter = ScriptedAdapter::new(vec![
            Ok(serde_json::json!({"unexpected": "shape"})),
            ScriptedAdapter::reply("recovered"),
        ]);

        let run = convo.run(&adapter, fast_options(3)).expect("run returns");

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.attempts, 2);
        assert_eq!(run.errors.len(), 1);
        assert!(matches!(
            run.errors[0],
            AdapterError::ResponseMalformed { .. }
        ));
    }

    #[test]
    fn non_assistant_response_counts_as_failed_attempt() {
        let mut convo = conversation_with_prompt("who speaks?");
        let adapter = ScriptedAdapter::new(vec![
            Ok(serde_json::json!({"role": "user", "content": "not me"})),
            ScriptedAdapter::reply("me"),
        ]);

        let run = convo.run(&adapter, fast_options(3)).expect("run returns");

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.attempts, 2);
        assert_eq!(run.errors.len(), 1);
        assert_eq!(convo.exchanges()[0].response().content, "me");
    }

    #[test]
    fn zero_attempt_budget_fails_immediately() {
        let mut convo = conversation_with_prompt("no budget");
        let adapter = ScriptedAdapter::new(vec![ScriptedAdapter::reply("unused")]);

        let run = convo.run(&adapter, fast_options(0)).expect("run returns");

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.attempts, 0);
        assert!(run.errors.is_empty());
        assert!(convo.exchanges().is_empty());
    }

    #[test]
    fn run_records_timeout_and_budget() {
        let mut convo = conversation_with_prompt("options check");
        let adapter = ScriptedAdapter::new(vec![ScriptedAdapter::reply("noted")]);
        let options = fast_options(5).with_timeout_secs(120);

        let run = convo.run(&adapter, options).expect("run returns");

        assert_eq!(run.max_attempts, 5);
        assert_eq!(run.timeout_secs, 120);
    }

    #[test]
    fn run_status_terminality() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        for status in [
            RunStatus::Unsubmitted,
            RunStatus::Pending,
            RunStatus::Submitted,
            RunStatus::Queued,
            RunStatus::Error,
        ] {
            assert!(!status.is_terminal());
        }
    }

    #[test]
    fn run_options_defaults() {
        let options = RunOptions::default();
        assert_eq!(options.max_attempts, 3);
        assert_eq!(options.retry_delay, Duration::from_secs(3));
        assert_eq!(options.call.timeout_secs, 60);
    }

    #[test]
    fn last_error_reflects_history() {
        let mut convo = conversation_with_prompt("history");
        let adapter = ScriptedAdapter::new(vec![
            Err(transient_error()),
            Err(AdapterError::Timeout),
        ]);

        let run = convo.run(&adapter, fast_options(2)).expect("run returns");
        assert_eq!(run.last_error(), Some(&AdapterError::Timeout));
    }
}
