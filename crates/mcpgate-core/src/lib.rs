//! McpGate Core
//!
//! Runtime-agnostic gateway between an agent orchestrator and external
//! MCP tool servers. Connects to every configured server concurrently,
//! discovers their tools, exposes them under stable identities next to
//! local builtin and agent tools, and runs calls with bounded retries.
//!
//! ## Tool Gateway
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mcpgate_core::{CancellationToken, ConsoleLogger, Gateway};
//! use mcpgate_core::config::{FileConfigStore, ServerConfigStore};
//!
//! let config = FileConfigStore::user().load().await?;
//! let gateway = Gateway::with_rmcp(config, Arc::new(ConsoleLogger::new()));
//!
//! // Tools for the model
//! let tools = gateway.refresh().await.specs();
//!
//! // Execute tool calls from the model's response
//! let results = gateway.execute_tool_calls(&tool_calls, &CancellationToken::new()).await;
//!
//! gateway.shutdown().await;
//! ```

pub mod types;
pub mod logging;
pub mod config;
pub mod mcp;
pub mod tools;
pub mod gateway;

// Re-export commonly used types
pub use types::{ToolSpec, ToolCall, ToolResult, ToolOutput, CancellationToken};

pub use logging::{Logger, SharedLogger, NoOpLogger, ConsoleLogger, FileLogger, MemoryLogger};

pub use config::{
    ServerConfigStore, MemoryConfigStore, FileConfigStore,
    GatewayConfig, GatewaySettings, ServerDescriptor, TransportConfig,
};

pub use tools::{
    ToolHandler, ToolKind, BuiltinTool, AgentTool, AgentRunner, RemoteTool,
    ToolIdentity, ToolRegistry, RegistryFilter,
};

pub use gateway::{
    Gateway, GatewayError, InvocationError, ConnectOutcome, ServerState, ServerStatus, ProbeReport,
};

// MCP client using official rmcp SDK
pub use mcp::{Connector, McpSession, McpClient, McpConnector, McpError, McpResult, McpToolResult};
