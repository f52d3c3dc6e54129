//! Exposed tool registry
//!
//! A `ToolRegistry` is an immutable snapshot: once published it never
//! changes. `RegistryCell` holds the current snapshot and swaps in a new
//! one atomically, so readers see either the old set or the new set.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::handler::{ToolHandler, ToolKind};
use crate::types::ToolSpec;

/// One published set of callable tools, keyed by identity
#[derive(Clone, Default)]
pub struct ToolRegistry {
    generation: u64,
    tools: BTreeMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    /// An empty registry (generation 0)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot. Returns the registry and the identities dropped as
    /// duplicates; the first tool with a given identity wins.
    pub fn build(
        generation: u64,
        tools: impl IntoIterator<Item = Arc<dyn ToolHandler>>,
    ) -> (Self, Vec<String>) {
        let mut map: BTreeMap<String, Arc<dyn ToolHandler>> = BTreeMap::new();
        let mut duplicates = Vec::new();
        for tool in tools {
            let identity = tool.identity().to_string();
            if map.contains_key(&identity) {
                duplicates.push(identity);
            } else {
                map.insert(identity, tool);
            }
        }
        (Self { generation, tools: map }, duplicates)
    }

    /// Monotonic publication counter
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, identity: &str) -> Option<Arc<dyn ToolHandler>> {
        self.tools.get(identity).cloned()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.tools.contains_key(identity)
    }

    /// Identities in sorted order
    pub fn identities(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Definitions for the model
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|t| t.spec()).collect()
    }

    pub fn tools(&self) -> impl Iterator<Item = &Arc<dyn ToolHandler>> {
        self.tools.values()
    }

    /// Tools of one kind
    pub fn of_kind(&self, kind: ToolKind) -> Vec<Arc<dyn ToolHandler>> {
        self.tools.values().filter(|t| t.kind() == kind).cloned().collect()
    }

    /// Number of exposed tools served by this server
    pub fn count_for_server(&self, server: &str) -> usize {
        self.tools.values().filter(|t| t.server() == Some(server)).count()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("generation", &self.generation)
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Holder of the current snapshot
#[derive(Debug, Default)]
pub struct RegistryCell {
    current: RwLock<Arc<ToolRegistry>>,
}

impl RegistryCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// The snapshot readers should use; never blocks on a rebuild
    pub fn snapshot(&self) -> Arc<ToolRegistry> {
        Arc::clone(&self.current.read())
    }

    /// Replace the current snapshot
    pub fn publish(&self, registry: ToolRegistry) -> Arc<ToolRegistry> {
        let registry = Arc::new(registry);
        *self.current.write() = Arc::clone(&registry);
        registry
    }

    /// Generation the next published snapshot should carry
    pub fn next_generation(&self) -> u64 {
        self.current.read().generation() + 1
    }
}
