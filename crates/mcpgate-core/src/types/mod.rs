//! Core types shared between the gateway and its orchestrator

mod tool;
mod cancellation;

pub use tool::{ToolSpec, ToolCall, ToolResult, ToolOutput};
pub use cancellation::CancellationToken;
