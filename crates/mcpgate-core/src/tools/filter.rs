//! Per-server tool filtering
//!
//! Applied to every discovered tool before it reaches the exposed registry.
//! Identities that don't parse as `mcp__{server}__{tool}` are not remote
//! tools and always pass.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::handler::ToolHandler;
use super::identity::ToolIdentity;
use crate::config::ServerDescriptor;

/// Filter settings for one server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerFilter {
    pub enabled: bool,
    #[serde(default)]
    pub disabled_tools: BTreeSet<String>,
}

impl Default for ServerFilter {
    fn default() -> Self {
        Self {
            enabled: true,
            disabled_tools: BTreeSet::new(),
        }
    }
}

/// Decides which discovered tools are exposed
#[derive(Debug, Clone, Default)]
pub struct RegistryFilter {
    servers: HashMap<String, ServerFilter>,
}

impl RegistryFilter {
    /// A filter that allows everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter reflecting each descriptor's enabled flag and disabled tools
    pub fn from_descriptors<'a>(descriptors: impl IntoIterator<Item = &'a ServerDescriptor>) -> Self {
        let servers = descriptors
            .into_iter()
            .map(|d| {
                (
                    d.name.clone(),
                    ServerFilter {
                        enabled: d.enabled,
                        disabled_tools: d.disabled_tools.clone(),
                    },
                )
            })
            .collect();
        Self { servers }
    }

    pub fn with_server(mut self, name: impl Into<String>, filter: ServerFilter) -> Self {
        self.servers.insert(name.into(), filter);
        self
    }

    /// Disable one tool on a server
    pub fn with_disabled_tool(mut self, server: &str, tool: impl Into<String>) -> Self {
        self.servers
            .entry(server.to_string())
            .or_default()
            .disabled_tools
            .insert(tool.into());
        self
    }

    /// Whether a tool with this identity may be exposed
    pub fn allows(&self, identity: &str) -> bool {
        let Some(id) = ToolIdentity::parse(identity) else {
            return true;
        };
        match self.servers.get(&id.server) {
            Some(filter) => filter.enabled && !filter.disabled_tools.contains(&id.tool),
            None => true,
        }
    }

    /// Keep only the allowed tools, preserving order
    pub fn apply(&self, tools: Vec<Arc<dyn ToolHandler>>) -> Vec<Arc<dyn ToolHandler>> {
        tools.into_iter().filter(|t| self.allows(t.identity())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_default_allows_all() {
        let filter = RegistryFilter::new();
        assert!(filter.allows("mcp__github__create_issue"));
        assert!(filter.allows("read_file"));
    }

    #[test]
    fn test_filter_disabled_tool() {
        let filter = RegistryFilter::new().with_disabled_tool("fs", "write_file");
        assert!(!filter.allows("mcp__fs__write_file"));
        assert!(filter.allows("mcp__fs__read_file"));
        // same tool name on another server is unaffected
        assert!(filter.allows("mcp__other__write_file"));
    }

    #[test]
    fn test_filter_disabled_server() {
        let filter = RegistryFilter::new().with_server(
            "github",
            ServerFilter {
                enabled: false,
                ..Default::default()
            },
        );
        assert!(!filter.allows("mcp__github__create_issue"));
        assert!(filter.allows("mcp__fs__read_file"));
    }

    #[test]
    fn test_filter_passes_unparseable_identities() {
        let filter = RegistryFilter::new().with_server(
            "mcp",
            ServerFilter {
                enabled: false,
                ..Default::default()
            },
        );
        assert!(filter.allows("agent__reviewer"));
        assert!(filter.allows("mcp__broken"));
        assert!(filter.allows("no_delimiter_at_all"));
    }

    #[test]
    fn test_filter_from_descriptors() {
        let descriptors = vec![
            ServerDescriptor::stdio("fs", "fs-server").with_disabled_tool("delete_file"),
            ServerDescriptor::stdio("off", "off-server").disabled(),
        ];
        let filter = RegistryFilter::from_descriptors(&descriptors);
        assert!(filter.allows("mcp__fs__read_file"));
        assert!(!filter.allows("mcp__fs__delete_file"));
        assert!(!filter.allows("mcp__off__anything"));
    }
}
