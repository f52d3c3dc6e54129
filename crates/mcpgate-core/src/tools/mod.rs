//! Tools exposed to the orchestrator
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  RegistryCell -> Arc<ToolRegistry> snapshot  │
//! │                                              │
//! │  BuiltinTool   in-process async function     │
//! │  AgentTool     sub-agent behind `prompt`     │
//! │  RemoteTool    mcp__{server}__{tool}         │
//! └──────────────────────────────────────────────┘
//!           │ RemoteTool::invoke
//!           ▼
//! ┌──────────────────────────────────────────────┐
//! │  InvocationExecutor (retry, degrade, cancel) │
//! └──────────────────────────────────────────────┘
//!           │ McpSession::call_tool
//!           ▼
//!      MCP server (stdio child / HTTP)
//! ```

mod adapter;
mod filter;
mod handler;
mod identity;
mod output;
mod registry;

pub use adapter::{synthesize_description, RemoteTool};
pub use filter::{RegistryFilter, ServerFilter};
pub use handler::{AgentRunner, AgentTool, BuiltinTool, ToolHandler, ToolKind, AGENT_PREFIX};
pub use identity::{ToolIdentity, REMOTE_PREFIX};
pub use output::{normalize_result, NormalizedResult};
pub use registry::{RegistryCell, ToolRegistry};
