//! File-based server configuration store (YAML)
//!
//! Supports user-level (~/.config/mcpgate/servers.yaml) and workspace-level
//! (.config/mcpgate/servers.yaml) files.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::server::{GatewayConfig, ServerDescriptor};
use super::traits::{ConfigResult, ServerConfigStore};

/// Config level (user or workspace)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLevel {
    /// User-level config (~/.config/mcpgate/servers.yaml)
    User,
    /// Workspace-level config (.config/mcpgate/servers.yaml in workspace root)
    Workspace,
}

impl ConfigLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigLevel::User => "user",
            ConfigLevel::Workspace => "workspace",
        }
    }
}

/// File-based configuration store
///
/// # Example
///
/// ```no_run
/// use mcpgate_core::config::FileConfigStore;
///
/// let user_config = FileConfigStore::user();
/// let workspace_config = FileConfigStore::workspace("/path/to/workspace");
/// ```
pub struct FileConfigStore {
    path: PathBuf,
    level: ConfigLevel,
    cache: RwLock<Option<GatewayConfig>>,
}

impl FileConfigStore {
    /// Create a new file config store for a specific path
    pub fn new(path: impl Into<PathBuf>, level: ConfigLevel) -> Self {
        Self {
            path: path.into(),
            level,
            cache: RwLock::new(None),
        }
    }

    /// User-level store (~/.config/mcpgate/servers.yaml)
    pub fn user() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".config"));
        let path = config_dir.join("mcpgate").join("servers.yaml");
        Self::new(path, ConfigLevel::User)
    }

    /// Workspace-level store (.config/mcpgate/servers.yaml)
    pub fn workspace(workspace_root: impl AsRef<Path>) -> Self {
        let path = workspace_root
            .as_ref()
            .join(".config")
            .join("mcpgate")
            .join("servers.yaml");
        Self::new(path, ConfigLevel::Workspace)
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the config level
    pub fn level(&self) -> ConfigLevel {
        self.level
    }

    /// Check if the config file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn read_file(&self) -> ConfigResult<GatewayConfig> {
        if !self.path.exists() {
            return Ok(GatewayConfig::default());
        }

        let content = fs::read_to_string(&self.path)?;
        GatewayConfig::from_yaml(&content)
    }

    fn save(&self, config: &GatewayConfig) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&self.path, config.to_yaml()?)?;
        *self.cache.write() = Some(config.clone());
        Ok(())
    }

    fn get_config(&self) -> ConfigResult<GatewayConfig> {
        if let Some(config) = self.cache.read().as_ref() {
            return Ok(config.clone());
        }

        let config = self.read_file()?;
        *self.cache.write() = Some(config.clone());
        Ok(config)
    }

    /// Reload config from disk (invalidate cache)
    pub fn reload(&self) -> ConfigResult<GatewayConfig> {
        let config = self.read_file()?;
        *self.cache.write() = Some(config.clone());
        Ok(config)
    }

    /// Load, mutate and persist in one step
    fn update(&self, f: impl FnOnce(&mut GatewayConfig) -> ConfigResult<()>) -> ConfigResult<()> {
        let mut config = self.get_config()?;
        f(&mut config)?;
        self.save(&config)
    }
}

impl std::fmt::Debug for FileConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileConfigStore")
            .field("path", &self.path)
            .field("level", &self.level)
            .field("exists", &self.exists())
            .finish()
    }
}

#[async_trait]
impl ServerConfigStore for FileConfigStore {
    async fn load(&self) -> ConfigResult<GatewayConfig> {
        self.get_config()
    }

    async fn add_server(&self, server: ServerDescriptor) -> ConfigResult<()> {
        self.update(|c| c.add_server(server))
    }

    async fn remove_server(&self, name: &str) -> ConfigResult<()> {
        self.update(|c| c.remove_server(name).map(|_| ()))
    }

    async fn set_server_enabled(&self, name: &str, enabled: bool) -> ConfigResult<()> {
        self.update(|c| c.set_server_enabled(name, enabled))
    }

    async fn set_tool_enabled(&self, server: &str, tool: &str, enabled: bool) -> ConfigResult<()> {
        self.update(|c| c.set_tool_enabled(server, tool, enabled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_config_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("servers.yaml");
        let store = FileConfigStore::new(&path, ConfigLevel::User);

        // Initially empty
        assert!(!store.exists());
        assert!(store.load().await.unwrap().servers.is_empty());

        store
            .add_server(
                ServerDescriptor::stdio("filesystem", "npx")
                    .with_args(["-y", "@modelcontextprotocol/server-filesystem"]),
            )
            .await
            .unwrap();
        store
            .add_server(ServerDescriptor::http("remote", "https://example.com/mcp"))
            .await
            .unwrap();
        store.set_tool_enabled("filesystem", "write_file", false).await.unwrap();

        assert!(store.exists());

        // Reload from disk and verify persistence, including names
        let config = store.reload().unwrap();
        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.servers["filesystem"].name, "filesystem");
        assert!(config.servers["filesystem"].disabled_tools.contains("write_file"));
        assert_eq!(config.servers["remote"].transport.kind(), "http");
    }

    #[tokio::test]
    async fn test_yaml_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("servers.yaml");
        let store = FileConfigStore::new(&path, ConfigLevel::Workspace);

        store
            .add_server(ServerDescriptor::stdio("github", "github-mcp-server"))
            .await
            .unwrap();
        store.set_server_enabled("github", false).await.unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("github"));
        assert!(content.contains("transport: stdio"));
        assert!(content.contains("enabled: false"));
    }

    #[test]
    fn test_workspace_path() {
        let store = FileConfigStore::workspace("/work");
        assert_eq!(store.level(), ConfigLevel::Workspace);
        assert!(store.path().ends_with(".config/mcpgate/servers.yaml"));
    }
}
