//! Invocation executor
//!
//! Runs one remote tool call as a small state machine:
//!
//! ```text
//! attempt ──ok──────────────────────────────► Succeeded
//!    │
//!    ├─ request rejected ─► degrade input ─► attempt
//!    ├─ transient ────────► back off ──────► attempt
//!    ├─ cancelled ────────────────────────► Cancelled
//!    └─ last attempt failed ──────────────► Exhausted
//! ```
//!
//! Degradation truncates the largest string field in the input to a bound
//! that shrinks with every failed attempt, and marks the cut so the
//! receiving tool can tell the text is incomplete.
//!
//! Cancellation and attempt deadlines drop the in-flight call future; the
//! rmcp session answers that with `notifications/cancelled` to the server.

use std::time::Duration;

use serde_json::Value;

use super::error::InvocationError;
use crate::config::GatewaySettings;
use crate::logging::SharedLogger;
use crate::mcp::McpSession;
use crate::tools::normalize_result;
use crate::types::{CancellationToken, ToolOutput};

/// Retry, degrade and timeout knobs for remote calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub call_timeout: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub degrade_bounds: Vec<usize>,
    pub degrade_floor: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&GatewaySettings::default())
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &GatewaySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            call_timeout: settings.call_timeout(),
            backoff_base: Duration::from_millis(settings.retry_backoff_ms),
            backoff_max: Duration::from_millis(settings.retry_backoff_max_ms),
            degrade_bounds: settings.degrade_bounds.clone(),
            degrade_floor: settings.degrade_floor,
        }
    }

    /// Delay before retry `n` (1-based): base * 2^(n-1), capped
    pub fn backoff(&self, n: u32) -> Duration {
        let shift = n.saturating_sub(1).min(16);
        self.backoff_base
            .saturating_mul(1u32 << shift)
            .min(self.backoff_max)
    }

    /// Truncation bound after `failures` failed attempts (1-based).
    ///
    /// Walks the configured bounds, then keeps halving the last one down to
    /// the floor.
    pub fn degrade_bound(&self, failures: u32) -> usize {
        let idx = failures.saturating_sub(1) as usize;
        if let Some(bound) = self.degrade_bounds.get(idx) {
            return (*bound).max(self.degrade_floor);
        }
        let last = self.degrade_bounds.last().copied().unwrap_or(1000);
        let extra = (idx + 1 - self.degrade_bounds.len()).min(usize::BITS as usize - 1);
        (last >> extra).max(self.degrade_floor)
    }
}

/// A successful invocation and how it got there
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub output: ToolOutput,
    /// Attempts made, including the successful one
    pub attempts: u32,
    /// Truncation bounds applied, in order
    pub degradations: Vec<usize>,
}

/// Executes remote tool calls with retry, degradation and cancellation
pub struct InvocationExecutor {
    policy: RetryPolicy,
    logger: SharedLogger,
}

impl InvocationExecutor {
    pub fn new(policy: RetryPolicy, logger: SharedLogger) -> Self {
        Self { policy, logger }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Call `tool` on `session` until it succeeds, attempts run out or the
    /// caller cancels.
    pub async fn execute(
        &self,
        session: &dyn McpSession,
        tool: &str,
        input: Value,
        cancel: &CancellationToken,
    ) -> Result<Invocation, InvocationError> {
        let server = session.server_name().to_string();
        let max_attempts = self.policy.max_attempts.max(1);
        let original = input;
        let mut current = original.clone();
        let mut degradations = Vec::new();
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Err(self.cancelled(&server, tool, attempt - 1));
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled(&server, tool, attempt)),
                r = tokio::time::timeout(self.policy.call_timeout, session.call_tool(tool, current.clone())) => r,
            };

            let failure = match outcome {
                Ok(Ok(result)) => {
                    let normalized = normalize_result(&result);
                    if !normalized.is_error {
                        if attempt > 1 {
                            self.logger.info(&format!(
                                "[Executor] {}/{} succeeded on attempt {}",
                                server, tool, attempt
                            ));
                        }
                        return Ok(Invocation {
                            output: normalized.into_output(),
                            attempts: attempt,
                            degradations,
                        });
                    }
                    InvocationError::classify(normalized.text)
                }
                Ok(Err(e)) => InvocationError::classify(e.to_string()),
                Err(_) => InvocationError::Transient(format!(
                    "no response within {}ms",
                    self.policy.call_timeout.as_millis()
                )),
            };

            let (rejected, message) = match failure {
                InvocationError::RequestRejected(m) => (true, m),
                InvocationError::Transient(m) => (false, m),
                other => (false, other.to_string()),
            };
            self.logger.warn(&format!(
                "[Executor] {}/{} attempt {}/{} failed ({}): {}",
                server,
                tool,
                attempt,
                max_attempts,
                if rejected { "rejected" } else { "transient" },
                message
            ));
            last_error = message;

            if attempt == max_attempts {
                break;
            }

            if rejected {
                let bound = self.policy.degrade_bound(attempt);
                match degrade_input(&original, bound) {
                    Some(degraded) => {
                        self.logger.info(&format!(
                            "[Executor] {}/{} truncating largest text field to {} characters",
                            server, tool, bound
                        ));
                        current = degraded;
                        degradations.push(bound);
                    }
                    None => self.logger.debug(&format!(
                        "[Executor] {}/{} has no text field longer than {}; retrying unchanged",
                        server, tool, bound
                    )),
                }
            } else {
                let delay = self.policy.backoff(attempt);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(self.cancelled(&server, tool, attempt)),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        self.logger.error(&format!(
            "[Executor] {}/{} failed after {} attempts: {}",
            server, tool, max_attempts, last_error
        ));
        Err(InvocationError::Exhausted {
            attempts: max_attempts,
            last: last_error,
        })
    }

    fn cancelled(&self, server: &str, tool: &str, attempts: u32) -> InvocationError {
        self.logger.info(&format!(
            "[Executor] {}/{} cancelled after {} attempts",
            server, tool, attempts
        ));
        InvocationError::Cancelled { attempts }
    }
}

/// Marker appended to truncated text
pub fn truncation_marker(bound: usize) -> String {
    format!(
        "\n\n[... truncated to {} characters after the server rejected the request]",
        bound
    )
}

/// Truncate the largest string anywhere in `input` to `bound` characters.
///
/// Returns `None` when no string is longer than the bound.
pub fn degrade_input(input: &Value, bound: usize) -> Option<Value> {
    let (pointer, len) = largest_string(input, String::new())?;
    if len <= bound {
        return None;
    }

    let mut degraded = input.clone();
    let slot = degraded.pointer_mut(&pointer)?;
    let text = slot.as_str()?;
    let mut truncated: String = text.chars().take(bound).collect();
    truncated.push_str(&truncation_marker(bound));
    *slot = Value::String(truncated);
    Some(degraded)
}

/// JSON pointer and char length of the longest string value
fn largest_string(value: &Value, path: String) -> Option<(String, usize)> {
    match value {
        Value::String(s) => Some((path, s.chars().count())),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .filter_map(|(i, v)| largest_string(v, format!("{}/{}", path, i)))
            .fold(None, pick_longer),
        Value::Object(map) => map
            .iter()
            .filter_map(|(k, v)| largest_string(v, format!("{}/{}", path, escape_pointer(k))))
            .fold(None, pick_longer),
        _ => None,
    }
}

fn pick_longer(best: Option<(String, usize)>, next: (String, usize)) -> Option<(String, usize)> {
    match best {
        Some(b) if b.1 >= next.1 => Some(b),
        _ => Some(next),
    }
}

fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}
