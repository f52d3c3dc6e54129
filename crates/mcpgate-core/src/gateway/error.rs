//! Gateway error types

use thiserror::Error;

use crate::config::ConfigError;

/// Connection and discovery failures for one server
///
/// None of these abort a pass; they are recorded against the server and
/// logged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("connection timed out after {timeout_ms}ms")]
    ConnectTimeout { server: String, timeout_ms: u64 },

    #[error("server '{server}' failed to connect: {message}")]
    HandshakeFailure { server: String, message: String },

    #[error("tool listing timed out after {timeout_ms}ms")]
    DiscoveryTimeout { server: String, timeout_ms: u64 },

    #[error("server '{server}' failed to list tools: {message}")]
    DiscoveryFailed { server: String, message: String },

    #[error("server '{server}' does not declare the tools capability")]
    CapabilityAbsent { server: String },

    #[error("unknown server: {0}")]
    UnknownServer(String),

    #[error("config error: {0}")]
    Config(String),
}

impl From<ConfigError> for GatewayError {
    fn from(e: ConfigError) -> Self {
        GatewayError::Config(e.to_string())
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Failure of a tool invocation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvocationError {
    /// The server rejected the request itself (bad or oversized input)
    #[error("request rejected: {0}")]
    RequestRejected(String),

    /// Timeout, dropped connection or other failure worth retrying as-is
    #[error("transient failure: {0}")]
    Transient(String),

    /// The caller cancelled; no further attempts were made
    #[error("tool call cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },

    /// Every attempt failed
    #[error("tool call failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },

    /// No tool with this identity in the current registry
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// A local tool reported failure
    #[error("{0}")]
    ToolError(String),
}

impl InvocationError {
    /// Classify one failed attempt by its message
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_request_rejection(&message) {
            InvocationError::RequestRejected(message)
        } else {
            InvocationError::Transient(message)
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, InvocationError::Cancelled { .. })
    }
}

const REJECTION_SIGNATURES: &[&str] = &[
    "bad request",
    "invalid request",
    "invalid params",
    "invalid argument",
    "malformed",
    "-32602",
    "-32600",
    "payload too large",
    "request entity too large",
];

/// Whether a failure message indicates the server rejected the request
/// itself, as opposed to a transport or availability problem.
pub fn is_request_rejection(message: &str) -> bool {
    let lower = message.to_lowercase();
    REJECTION_SIGNATURES.iter().any(|s| lower.contains(s))
        || contains_status(&lower, "400")
        || contains_status(&lower, "413")
}

/// `code` appearing as a standalone number, not inside a longer one
fn contains_status(haystack: &str, code: &str) -> bool {
    let bytes = haystack.as_bytes();
    haystack.match_indices(code).any(|(i, m)| {
        let before = i.checked_sub(1).map(|j| bytes[j]);
        let after = bytes.get(i + m.len()).copied();
        !before.is_some_and(|b| b.is_ascii_digit() || b == b'-')
            && !after.is_some_and(|b| b.is_ascii_digit())
    })
}
