//! Transport seam between the gateway and individual MCP servers
//!
//! The gateway only talks to `Connector` and `McpSession`. The rmcp-backed
//! implementations live in `client`; `mock` provides scripted ones.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::McpResult;
use super::McpToolResult;
use crate::config::ServerDescriptor;
use crate::logging::SharedLogger;

/// Feature set a server declared during the handshake
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCapabilities {
    pub tools: bool,
    pub resources: bool,
    pub prompts: bool,
    /// Name the server reported for itself
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
}

impl ServerCapabilities {
    /// Capabilities of a server that only serves tools
    pub fn tools_only() -> Self {
        Self {
            tools: true,
            ..Default::default()
        }
    }
}

/// One tool as listed by a server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name on the server
    pub name: String,
    /// Tool description from the server
    #[serde(default)]
    pub description: Option<String>,
    /// JSON Schema for tool parameters
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl ToolInfo {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            input_schema,
        }
    }
}

/// A live connection to one MCP server
///
/// Implementations must make `close` idempotent: the transport handle is
/// released on the first call and later calls are no-ops.
#[async_trait]
pub trait McpSession: Send + Sync {
    /// Configured name of the server behind this session
    fn server_name(&self) -> &str;

    /// Declared capabilities
    async fn capabilities(&self) -> McpResult<ServerCapabilities>;

    /// Enumerate every tool (all pages)
    async fn list_tools(&self) -> McpResult<Vec<ToolInfo>>;

    /// Call one tool with JSON object arguments
    async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<McpToolResult>;

    /// Release the transport
    async fn close(&self) -> McpResult<()>;
}

/// Opens sessions from descriptors
#[async_trait]
pub trait Connector: Send + Sync {
    /// Spawn/connect and complete the protocol handshake
    async fn connect(
        &self,
        server: &ServerDescriptor,
        logger: SharedLogger,
    ) -> McpResult<Arc<dyn McpSession>>;
}
