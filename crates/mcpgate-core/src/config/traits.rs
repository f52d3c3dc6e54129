//! Server configuration store trait

use async_trait::async_trait;

use super::server::{GatewayConfig, ServerDescriptor};

/// Where server definitions live
///
/// The gateway only calls `load`; the mutation methods serve the
/// administration surface (CLI/UI), whose edits take effect on the next
/// explicit `Gateway::reload`.
///
/// Implementations:
/// - `MemoryConfigStore`: In-memory for testing
/// - `FileConfigStore`: YAML file (~/.config/mcpgate/servers.yaml)
#[async_trait]
pub trait ServerConfigStore: Send + Sync {
    /// Read the full configuration
    async fn load(&self) -> ConfigResult<GatewayConfig>;

    /// Add a new server definition
    async fn add_server(&self, server: ServerDescriptor) -> ConfigResult<()>;

    /// Remove a server definition
    async fn remove_server(&self, name: &str) -> ConfigResult<()>;

    /// Enable or disable a whole server
    async fn set_server_enabled(&self, name: &str, enabled: bool) -> ConfigResult<()>;

    /// Enable or disable one tool of a server
    async fn set_tool_enabled(&self, server: &str, tool: &str, enabled: bool) -> ConfigResult<()>;
}

/// Errors that can occur during configuration operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Server not found: {0}")]
    ServerNotFound(String),

    #[error("Server already exists: {0}")]
    ServerExists(String),

    #[error("Invalid server name '{0}': must be non-empty, without whitespace or '__'")]
    InvalidServerName(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Other(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
