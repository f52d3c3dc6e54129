//! In-memory server configuration store

use async_trait::async_trait;
use parking_lot::RwLock;

use super::server::{GatewayConfig, ServerDescriptor};
use super::traits::{ConfigResult, ServerConfigStore};

/// In-memory configuration store for testing and embedding
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    config: RwLock<GatewayConfig>,
}

impl MemoryConfigStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `config`
    pub fn with_config(config: GatewayConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    /// Replace the configuration wholesale
    pub fn set_config(&self, config: GatewayConfig) {
        *self.config.write() = config;
    }
}

#[async_trait]
impl ServerConfigStore for MemoryConfigStore {
    async fn load(&self) -> ConfigResult<GatewayConfig> {
        Ok(self.config.read().clone())
    }

    async fn add_server(&self, server: ServerDescriptor) -> ConfigResult<()> {
        self.config.write().add_server(server)
    }

    async fn remove_server(&self, name: &str) -> ConfigResult<()> {
        self.config.write().remove_server(name).map(|_| ())
    }

    async fn set_server_enabled(&self, name: &str, enabled: bool) -> ConfigResult<()> {
        self.config.write().set_server_enabled(name, enabled)
    }

    async fn set_tool_enabled(&self, server: &str, tool: &str, enabled: bool) -> ConfigResult<()> {
        self.config.write().set_tool_enabled(server, tool, enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;

    #[tokio::test]
    async fn test_memory_config_store() {
        let store = MemoryConfigStore::new();

        // Initially empty
        assert!(store.load().await.unwrap().servers.is_empty());

        store
            .add_server(ServerDescriptor::stdio("github", "github-mcp"))
            .await
            .unwrap();
        assert_eq!(store.load().await.unwrap().servers.len(), 1);

        // Can't add duplicate
        assert!(matches!(
            store.add_server(ServerDescriptor::stdio("github", "x")).await,
            Err(ConfigError::ServerExists(_))
        ));

        store.set_tool_enabled("github", "delete_repo", false).await.unwrap();
        let config = store.load().await.unwrap();
        assert!(config.servers["github"].disabled_tools.contains("delete_repo"));

        store.remove_server("github").await.unwrap();
        assert!(matches!(
            store.remove_server("github").await,
            Err(ConfigError::ServerNotFound(_))
        ));
    }
}
