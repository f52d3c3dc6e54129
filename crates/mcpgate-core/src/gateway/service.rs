//! The gateway object
//!
//! Constructed once by the orchestrator at startup and shut down at exit.
//! Ties the supervisor, discovery, adapter, filter and executor together
//! and publishes the exposed tool registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::Mutex;

use super::discovery::{discover_tools, DiscoveryOutcome};
use super::error::{GatewayError, GatewayResult, InvocationError};
use super::executor::{InvocationExecutor, RetryPolicy};
use super::status::{ProbeReport, ServerState, ServerStatus};
use super::supervisor::{ConnectOutcome, ConnectionSupervisor};
use crate::config::{GatewayConfig, GatewaySettings, ServerConfigStore, ServerDescriptor};
use crate::logging::SharedLogger;
use crate::mcp::{Connector, McpConnector};
use crate::tools::{RegistryCell, RegistryFilter, RemoteTool, ToolHandler, ToolKind, ToolRegistry};
use crate::types::{CancellationToken, ToolCall, ToolOutput, ToolResult, ToolSpec};

/// Gateway between an orchestrator and its configured MCP servers
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use mcpgate_core::{ConsoleLogger, Gateway, CancellationToken};
/// use mcpgate_core::config::FileConfigStore;
///
/// let gateway = Gateway::from_store(&FileConfigStore::user(), Arc::new(McpConnector), Arc::new(ConsoleLogger::new())).await?;
/// let registry = gateway.refresh().await;
/// for spec in registry.specs() {
///     println!("{}: {}", spec.name, spec.description);
/// }
///
/// let output = gateway
///     .invoke("mcp__filesystem__read_file", json!({"path": "/tmp/a.txt"}), &CancellationToken::new())
///     .await?;
/// gateway.shutdown().await;
/// ```
pub struct Gateway {
    config: RwLock<GatewayConfig>,
    connector: Arc<dyn Connector>,
    logger: SharedLogger,
    supervisor: ConnectionSupervisor,
    executor: RwLock<Arc<InvocationExecutor>>,
    registry: RegistryCell,
    local_tools: RwLock<Vec<Arc<dyn ToolHandler>>>,
    refresh_lock: Mutex<()>,
}

impl Gateway {
    pub fn new(config: GatewayConfig, connector: Arc<dyn Connector>, logger: SharedLogger) -> Self {
        let executor = Arc::new(InvocationExecutor::new(
            RetryPolicy::from_settings(&config.settings),
            Arc::clone(&logger),
        ));
        Self {
            supervisor: ConnectionSupervisor::new(Arc::clone(&connector), Arc::clone(&logger)),
            config: RwLock::new(config),
            connector,
            logger,
            executor: RwLock::new(executor),
            registry: RegistryCell::new(),
            local_tools: RwLock::new(Vec::new()),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Gateway talking to real servers through rmcp
    pub fn with_rmcp(config: GatewayConfig, logger: SharedLogger) -> Self {
        Self::new(config, Arc::new(McpConnector), logger)
    }

    /// Load the config from a store
    pub async fn from_store(
        store: &dyn ServerConfigStore,
        connector: Arc<dyn Connector>,
        logger: SharedLogger,
    ) -> GatewayResult<Self> {
        let config = store.load().await?;
        Ok(Self::new(config, connector, logger))
    }

    /// Copy of the active configuration
    pub fn config(&self) -> GatewayConfig {
        self.config.read().clone()
    }

    fn snapshot_config(&self) -> (Vec<ServerDescriptor>, GatewaySettings) {
        let config = self.config.read();
        (config.descriptors(), config.settings.clone())
    }

    /// Connect every enabled server (memoized)
    pub async fn connect_all(&self) -> Vec<ConnectOutcome> {
        let (descriptors, settings) = self.snapshot_config();
        self.supervisor.connect_all(&descriptors, &settings).await
    }

    /// Run a discovery pass and publish a fresh registry.
    ///
    /// Connects first if no pass has run yet. Servers that fail to connect
    /// or list contribute nothing; the rest of the registry is unaffected.
    pub async fn refresh(&self) -> Arc<ToolRegistry> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Every registry publish runs under `refresh_lock`
    async fn refresh_locked(&self) -> Arc<ToolRegistry> {
        self.connect_all().await;

        let (descriptors, settings) = self.snapshot_config();
        let deadlines: HashMap<&str, Duration> = descriptors
            .iter()
            .map(|d| (d.name.as_str(), d.discovery_timeout(&settings)))
            .collect();
        let executor = Arc::clone(&self.executor.read());

        let passes = self.supervisor.connected_sessions().into_iter().map(|(name, session)| {
            let deadline = deadlines
                .get(name.as_str())
                .copied()
                .unwrap_or_else(|| Duration::from_millis(settings.discovery_timeout_ms));
            let logger = Arc::clone(&self.logger);
            async move {
                let outcome = discover_tools(session.as_ref(), deadline, &logger).await;
                (name, session, outcome)
            }
        });

        let mut remote: Vec<Arc<dyn ToolHandler>> = Vec::new();
        for (name, session, outcome) in join_all(passes).await {
            match outcome {
                DiscoveryOutcome::Listed(tools) => {
                    self.supervisor.record_discovery_success(&name);
                    for info in tools {
                        remote.push(Arc::new(RemoteTool::new(
                            &name,
                            info,
                            Arc::clone(&session),
                            Arc::clone(&executor),
                        )));
                    }
                }
                DiscoveryOutcome::CapabilityAbsent => self.supervisor.record_discovery_success(&name),
                DiscoveryOutcome::Failed(_) => {
                    self.supervisor
                        .record_discovery_failure(&name, settings.max_discovery_failures)
                        .await;
                }
            }
        }

        let discovered = remote.len();
        let exposed = RegistryFilter::from_descriptors(&descriptors).apply(remote);
        if exposed.len() < discovered {
            self.logger.debug(&format!(
                "[Gateway] Filtered out {} disabled tools",
                discovered - exposed.len()
            ));
        }

        let local = self.local_tools.read().clone();
        self.publish(local.into_iter().chain(exposed))
    }

    fn publish(&self, tools: impl IntoIterator<Item = Arc<dyn ToolHandler>>) -> Arc<ToolRegistry> {
        let (registry, duplicates) = ToolRegistry::build(self.registry.next_generation(), tools);
        for identity in duplicates {
            self.logger.warn(&format!("[Gateway] Duplicate tool identity ignored: {}", identity));
        }
        self.logger.info(&format!(
            "[Gateway] Published registry generation {} with {} tools",
            registry.generation(),
            registry.len()
        ));
        self.registry.publish(registry)
    }

    /// Republish the current remote tools (minus one server's) next to the
    /// current local tools
    fn republish(&self, drop_server: Option<&str>) -> Arc<ToolRegistry> {
        let current = self.registry.snapshot();
        let remote = current
            .of_kind(ToolKind::Remote)
            .into_iter()
            .filter(|t| drop_server.is_none() || t.server() != drop_server);
        let local = self.local_tools.read().clone();
        self.publish(local.into_iter().chain(remote))
    }

    /// The current registry snapshot
    pub fn registry(&self) -> Arc<ToolRegistry> {
        self.registry.snapshot()
    }

    /// Tool definitions for the orchestrator's model
    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        self.registry().specs()
    }

    /// Expose a builtin or agent tool next to the remote ones.
    ///
    /// Replaces a local tool with the same identity.
    pub async fn register_tool(&self, tool: Arc<dyn ToolHandler>) -> Arc<ToolRegistry> {
        let _guard = self.refresh_lock.lock().await;
        {
            let mut local = self.local_tools.write();
            local.retain(|t| t.identity() != tool.identity());
            local.push(tool);
        }
        self.republish(None)
    }

    /// Remove a local tool; returns whether one was registered
    pub async fn unregister_tool(&self, identity: &str) -> bool {
        let _guard = self.refresh_lock.lock().await;
        let removed = {
            let mut local = self.local_tools.write();
            let before = local.len();
            local.retain(|t| t.identity() != identity);
            local.len() != before
        };
        if removed {
            self.republish(None);
        }
        removed
    }

    /// Invoke a tool from the current registry
    pub async fn invoke(
        &self,
        identity: &str,
        input: Value,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput, InvocationError> {
        let tool = self
            .registry()
            .get(identity)
            .ok_or_else(|| InvocationError::UnknownTool(identity.to_string()))?;
        tool.invoke(input, cancel).await
    }

    /// Invoke a tool call and render the outcome for the orchestrator
    pub async fn execute_tool_call(&self, call: &ToolCall, cancel: &CancellationToken) -> ToolResult {
        self.logger.debug(&format!("[Gateway] Executing tool call {} ({})", call.id, call.name));
        match self.invoke(&call.name, call.input.clone(), cancel).await {
            Ok(output) => ToolResult::success(&call.id, output.text),
            Err(e) => ToolResult::error(&call.id, e.to_string()),
        }
    }

    /// Execute tool calls one after another
    pub async fn execute_tool_calls(&self, calls: &[ToolCall], cancel: &CancellationToken) -> Vec<ToolResult> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.execute_tool_call(call, cancel).await);
        }
        results
    }

    /// Reconnect one server and rediscover
    pub async fn reconnect(&self, name: &str) -> GatewayResult<ConnectOutcome> {
        let descriptor = self.descriptor(name)?;
        let settings = self.config.read().settings.clone();
        let _guard = self.refresh_lock.lock().await;
        let outcome = self.supervisor.reconnect(&descriptor, &settings).await;
        self.refresh_locked().await;
        Ok(outcome)
    }

    /// Close one server's session and drop its tools from the registry
    pub async fn disconnect(&self, name: &str) -> GatewayResult<()> {
        self.descriptor(name)?;
        let _guard = self.refresh_lock.lock().await;
        if self.supervisor.disconnect(name).await {
            self.logger.info(&format!("[Gateway] Disconnected '{}'", name));
        }
        self.republish(Some(name));
        Ok(())
    }

    /// Close every session and publish a registry of local tools only
    pub async fn shutdown(&self) {
        let _guard = self.refresh_lock.lock().await;
        self.shutdown_locked().await;
    }

    async fn shutdown_locked(&self) {
        self.supervisor.disconnect_all().await;
        let local = self.local_tools.read().clone();
        self.publish(local);
    }

    /// Swap in a new configuration, reconnect everything and rediscover
    pub async fn reload(&self, config: GatewayConfig) -> Arc<ToolRegistry> {
        self.logger.info(&format!(
            "[Gateway] Reloading configuration ({} servers)",
            config.servers.len()
        ));
        let _guard = self.refresh_lock.lock().await;
        self.shutdown_locked().await;
        *self.executor.write() = Arc::new(InvocationExecutor::new(
            RetryPolicy::from_settings(&config.settings),
            Arc::clone(&self.logger),
        ));
        *self.config.write() = config;
        self.refresh_locked().await
    }

    /// Reload from a config store
    pub async fn reload_from(&self, store: &dyn ServerConfigStore) -> GatewayResult<Arc<ToolRegistry>> {
        let config = store.load().await?;
        Ok(self.reload(config).await)
    }

    /// State of every configured server
    pub fn server_statuses(&self) -> Vec<ServerStatus> {
        let (descriptors, _) = self.snapshot_config();
        let registry = self.registry();

        descriptors
            .into_iter()
            .map(|d| {
                let (state, reason) = if !d.enabled {
                    (ServerState::Disabled, None)
                } else {
                    match self.supervisor.state(&d.name) {
                        Some(s) => (s.server_state(), s.reason().map(str::to_string)),
                        None => (ServerState::NotConnected, None),
                    }
                };
                ServerStatus {
                    tool_count: registry.count_for_server(&d.name),
                    transport: d.transport.kind().to_string(),
                    name: d.name,
                    state,
                    reason,
                }
            })
            .collect()
    }

    /// Connect a fresh session, list its tools and close it again.
    ///
    /// Leaves the gateway's own connections and registry untouched.
    pub async fn probe(&self, name: &str) -> GatewayResult<ProbeReport> {
        let descriptor = self.descriptor(name)?;
        let settings = self.config.read().settings.clone();
        let started = Instant::now();
        let elapsed_ms = |started: Instant| started.elapsed().as_millis() as u64;

        let deadline = descriptor.connect_timeout(&settings);
        let session = match tokio::time::timeout(
            deadline,
            self.connector.connect(&descriptor, Arc::clone(&self.logger)),
        )
        .await
        {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                return Ok(ProbeReport {
                    name: name.to_string(),
                    ok: false,
                    reason: Some(
                        GatewayError::HandshakeFailure {
                            server: name.to_string(),
                            message: e.to_string(),
                        }
                        .to_string(),
                    ),
                    capabilities: None,
                    tools: Vec::new(),
                    elapsed_ms: elapsed_ms(started),
                })
            }
            Err(_) => {
                return Ok(ProbeReport {
                    name: name.to_string(),
                    ok: false,
                    reason: Some(
                        GatewayError::ConnectTimeout {
                            server: name.to_string(),
                            timeout_ms: deadline.as_millis() as u64,
                        }
                        .to_string(),
                    ),
                    capabilities: None,
                    tools: Vec::new(),
                    elapsed_ms: elapsed_ms(started),
                })
            }
        };

        let capabilities = session.capabilities().await.ok();
        let outcome = discover_tools(session.as_ref(), descriptor.discovery_timeout(&settings), &self.logger).await;
        if let Err(e) = session.close().await {
            self.logger.warn(&format!("[Gateway] Error closing probe session for '{}': {}", name, e));
        }

        let (ok, reason, tools) = match outcome {
            DiscoveryOutcome::Listed(tools) => (true, None, tools.into_iter().map(|t| t.name).collect()),
            DiscoveryOutcome::CapabilityAbsent => (
                true,
                Some(GatewayError::CapabilityAbsent { server: name.to_string() }.to_string()),
                Vec::new(),
            ),
            DiscoveryOutcome::Failed(e) => (false, Some(e.to_string()), Vec::new()),
        };

        Ok(ProbeReport {
            name: name.to_string(),
            ok,
            reason,
            capabilities,
            tools,
            elapsed_ms: elapsed_ms(started),
        })
    }

    fn descriptor(&self, name: &str) -> GatewayResult<ServerDescriptor> {
        self.config
            .read()
            .servers
            .get(name)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownServer(name.to_string()))
    }
}
