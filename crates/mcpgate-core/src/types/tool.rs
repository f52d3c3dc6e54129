//! Tool calling types shared between the gateway and its orchestrator

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool definition as handed to the orchestrator's model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool identity (e.g. `mcp__github__create_issue`)
    pub name: String,
    /// Description of what the tool does and how to call it
    pub description: String,
    /// JSON Schema for the input parameters
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
    /// Whether the tool is known to be free of side effects
    #[serde(rename = "readOnly", default)]
    pub read_only: bool,
}

/// Tool call requested by the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,
    /// Identity of the tool being called
    pub name: String,
    /// Input arguments for the tool
    pub input: Value,
}

impl ToolCall {
    /// Create a new tool call
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    /// Get an input argument as a string
    pub fn get_arg_str(&self, key: &str) -> Option<&str> {
        self.input.get(key).and_then(|v| v.as_str())
    }
}

/// Tool result to send back to the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the tool call this is responding to
    #[serde(rename = "callId")]
    pub call_id: String,
    /// The result content
    pub content: String,
    /// Whether this result represents an error
    #[serde(rename = "isError", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolResult {
    /// Create a successful tool result
    pub fn success(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    /// Create an error tool result
    pub fn error(call_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: error.into(),
            is_error: true,
        }
    }
}

/// Output of one successful tool invocation
///
/// `text` is the flattened, human-readable rendering for the calling agent.
/// `raw` keeps the original structured result for programmatic consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub text: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub raw: Value,
}

impl ToolOutput {
    /// Plain text output with no structured payload
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            raw: Value::Null,
        }
    }

    /// Output carrying both the flattened text and the structured result
    pub fn with_raw(text: impl Into<String>, raw: Value) -> Self {
        Self {
            text: text.into(),
            raw,
        }
    }
}
