//! MCP (Model Context Protocol) client module
//!
//! Uses the official rmcp SDK to talk to MCP servers. The gateway depends
//! only on the `Connector` / `McpSession` seam defined here:
//!
//! - `McpConnector` / `McpClient`: real sessions over a child process's
//!   stdio or streamable HTTP
//! - `MockConnector` / `MockSession`: scripted sessions for tests
//!
//! # Example
//!
//! ```rust,ignore
//! use mcpgate_core::config::ServerDescriptor;
//! use mcpgate_core::mcp::{Connector, McpConnector};
//!
//! let server = ServerDescriptor::stdio("filesystem", "npx")
//!     .with_args(["-y", "@modelcontextprotocol/server-filesystem", "/tmp"]);
//! let session = McpConnector.connect(&server, logger).await?;
//! let tools = session.list_tools().await?;
//! ```

mod error;
mod session;
mod client;
pub mod mock;

pub use error::{McpError, McpResult};
pub use session::{Connector, McpSession, ServerCapabilities, ToolInfo};
pub use client::{McpClient, McpConnector};

// Re-export rmcp types that consumers might need
pub use rmcp::model::{CallToolResult as McpToolResult, Content as McpContent};
