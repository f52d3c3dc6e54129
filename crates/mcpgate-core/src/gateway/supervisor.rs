//! Connection supervisor
//!
//! Owns one `ConnectionState` per enabled server. Connect passes run every
//! server concurrently, each under its own deadline, and always produce an
//! outcome for every configured server. Leaving `Connected` closes the
//! session exactly once.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Mutex;

use super::error::{GatewayError, GatewayResult};
use super::status::ServerState;
use crate::config::{GatewaySettings, ServerDescriptor};
use crate::logging::SharedLogger;
use crate::mcp::{Connector, McpSession};
use crate::{log_error, log_info, log_warn};

/// Lifecycle of one server's connection
#[derive(Clone)]
pub enum ConnectionState {
    Connecting,
    Connected(Arc<dyn McpSession>),
    Failed(String),
}

impl ConnectionState {
    pub fn server_state(&self) -> ServerState {
        match self {
            ConnectionState::Connecting => ServerState::Connecting,
            ConnectionState::Connected(_) => ServerState::Connected,
            ConnectionState::Failed(_) => ServerState::Failed,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ConnectionState::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

impl std::fmt::Debug for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connecting => f.write_str("Connecting"),
            ConnectionState::Connected(s) => write!(f, "Connected({})", s.server_name()),
            ConnectionState::Failed(reason) => write!(f, "Failed({})", reason),
        }
    }
}

/// Result of connecting one configured server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConnectOutcome {
    Connected { name: String },
    Failed { name: String, reason: String },
    Disabled { name: String },
}

impl ConnectOutcome {
    pub fn name(&self) -> &str {
        match self {
            ConnectOutcome::Connected { name }
            | ConnectOutcome::Failed { name, .. }
            | ConnectOutcome::Disabled { name } => name,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectOutcome::Connected { .. })
    }
}

struct ServerSlot {
    state: ConnectionState,
    discovery_failures: u32,
}

impl ServerSlot {
    fn new(state: ConnectionState) -> Self {
        Self {
            state,
            discovery_failures: 0,
        }
    }
}

/// Tracks and drives connections to every configured server
pub struct ConnectionSupervisor {
    connector: Arc<dyn Connector>,
    logger: SharedLogger,
    slots: RwLock<HashMap<String, ServerSlot>>,
    /// Held for the whole of any pass; `true` once a full pass has run
    pass: Mutex<bool>,
}

impl ConnectionSupervisor {
    pub fn new(connector: Arc<dyn Connector>, logger: SharedLogger) -> Self {
        Self {
            connector,
            logger,
            slots: RwLock::new(HashMap::new()),
            pass: Mutex::new(false),
        }
    }

    /// Connect every enabled server, or return the memoized states if a
    /// pass already ran.
    ///
    /// After a pass, only enabled servers without any state (those
    /// disconnected since) are connected again.
    pub async fn connect_all(
        &self,
        descriptors: &[ServerDescriptor],
        settings: &GatewaySettings,
    ) -> Vec<ConnectOutcome> {
        let mut done = self.pass.lock().await;

        let enabled: Vec<&ServerDescriptor> = if *done {
            let slots = self.slots.read();
            let pending: Vec<&ServerDescriptor> = descriptors
                .iter()
                .filter(|d| d.enabled && !slots.contains_key(&d.name))
                .collect();
            pending
        } else {
            descriptors.iter().filter(|d| d.enabled).collect()
        };

        if *done && enabled.is_empty() {
            self.logger.debug("[Supervisor] Returning memoized connection states");
            return self.outcomes(descriptors);
        }

        if *done {
            self.logger.info(&format!(
                "[Supervisor] Connecting {} servers without a connection",
                enabled.len()
            ));
        } else {
            self.logger.info(&format!(
                "[Supervisor] Connecting {} servers ({} disabled)",
                enabled.len(),
                descriptors.iter().filter(|d| !d.enabled).count()
            ));
        }

        {
            let mut slots = self.slots.write();
            for d in &enabled {
                slots.insert(d.name.clone(), ServerSlot::new(ConnectionState::Connecting));
            }
        }

        let tasks = enabled.iter().map(|d| {
            let connector = Arc::clone(&self.connector);
            let logger = Arc::clone(&self.logger);
            let descriptor = (*d).clone();
            let deadline = d.connect_timeout(settings);
            let name = d.name.clone();
            async move {
                let handle = tokio::spawn(async move {
                    connect_one(connector.as_ref(), &descriptor, deadline, logger).await
                });
                let result = match handle.await {
                    Ok(result) => result.map_err(|e| e.to_string()),
                    Err(e) => Err(format!("connect task failed: {}", e)),
                };
                (name, result)
            }
        });

        for (name, result) in join_all(tasks).await {
            self.settle(&name, result);
        }

        *done = true;
        self.outcomes(descriptors)
    }

    /// Close the server's current session (if any) and connect it again
    pub async fn reconnect(&self, descriptor: &ServerDescriptor, settings: &GatewaySettings) -> ConnectOutcome {
        let _pass = self.pass.lock().await;

        let previous = self.slots.write().remove(&descriptor.name);
        if let Some(ServerSlot {
            state: ConnectionState::Connected(session),
            ..
        }) = previous
        {
            self.close_session(&descriptor.name, session).await;
        }

        if !descriptor.enabled {
            return ConnectOutcome::Disabled {
                name: descriptor.name.clone(),
            };
        }

        self.logger.info(&format!("[Supervisor] Reconnecting '{}'", descriptor.name));
        self.slots
            .write()
            .insert(descriptor.name.clone(), ServerSlot::new(ConnectionState::Connecting));

        let result = connect_one(
            self.connector.as_ref(),
            descriptor,
            descriptor.connect_timeout(settings),
            Arc::clone(&self.logger),
        )
        .await
        .map_err(|e| e.to_string());
        self.settle(&descriptor.name, result);
        self.outcome_of(descriptor)
    }

    /// Close one server's session and forget its state
    pub async fn disconnect(&self, name: &str) -> bool {
        let _pass = self.pass.lock().await;
        let removed = self.slots.write().remove(name);
        match removed {
            Some(ServerSlot {
                state: ConnectionState::Connected(session),
                ..
            }) => {
                self.close_session(name, session).await;
                true
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Close every live session and clear the memoized pass.
    ///
    /// Close errors are logged, not returned. Returns how many sessions
    /// were closed.
    pub async fn disconnect_all(&self) -> usize {
        let mut done = self.pass.lock().await;
        let drained: Vec<(String, ServerSlot)> = self.slots.write().drain().collect();

        let sessions: Vec<(String, Arc<dyn McpSession>)> = drained
            .into_iter()
            .filter_map(|(name, slot)| match slot.state {
                ConnectionState::Connected(session) => Some((name, session)),
                _ => None,
            })
            .collect();
        let count = sessions.len();

        join_all(
            sessions
                .into_iter()
                .map(|(name, session)| async move { self.close_session(&name, session).await }),
        )
        .await;

        *done = false;
        if count > 0 {
            self.logger.info(&format!("[Supervisor] Disconnected {} servers", count));
        }
        count
    }

    /// Live sessions, sorted by server name
    pub fn connected_sessions(&self) -> Vec<(String, Arc<dyn McpSession>)> {
        let mut sessions: Vec<_> = self
            .slots
            .read()
            .iter()
            .filter_map(|(name, slot)| match &slot.state {
                ConnectionState::Connected(session) => Some((name.clone(), Arc::clone(session))),
                _ => None,
            })
            .collect();
        sessions.sort_by(|a, b| a.0.cmp(&b.0));
        sessions
    }

    pub fn state(&self, name: &str) -> Option<ConnectionState> {
        self.slots.read().get(name).map(|slot| slot.state.clone())
    }

    /// A listing succeeded; reset the consecutive failure count
    pub fn record_discovery_success(&self, name: &str) {
        if let Some(slot) = self.slots.write().get_mut(name) {
            slot.discovery_failures = 0;
        }
    }

    /// A listing failed. After `limit` consecutive failures (0 = never) the
    /// server is demoted to `Failed` and its session closed. Returns whether
    /// it was demoted.
    pub async fn record_discovery_failure(&self, name: &str, limit: u32) -> bool {
        let demoted = {
            let mut slots = self.slots.write();
            let Some(slot) = slots.get_mut(name) else {
                return false;
            };
            slot.discovery_failures += 1;
            if limit == 0
                || slot.discovery_failures < limit
                || !matches!(slot.state, ConnectionState::Connected(_))
            {
                None
            } else {
                let reason = format!("discovery failed {} consecutive times", slot.discovery_failures);
                match std::mem::replace(&mut slot.state, ConnectionState::Failed(reason.clone())) {
                    ConnectionState::Connected(session) => Some((session, reason)),
                    _ => None,
                }
            }
        };

        match demoted {
            Some((session, reason)) => {
                self.logger.warn(&format!("[Supervisor] '{}' marked failed: {}", name, reason));
                self.close_session(name, session).await;
                true
            }
            None => false,
        }
    }

    fn settle(&self, name: &str, result: Result<Arc<dyn McpSession>, String>) {
        let state = match result {
            Ok(session) => {
                log_info!(self.logger, "[Supervisor] '{}' connected", name);
                ConnectionState::Connected(session)
            }
            Err(reason) => {
                log_error!(self.logger, "[Supervisor] '{}' failed: {}", name, reason);
                ConnectionState::Failed(reason)
            }
        };
        self.slots.write().insert(name.to_string(), ServerSlot::new(state));
    }

    fn outcome_of(&self, descriptor: &ServerDescriptor) -> ConnectOutcome {
        let name = descriptor.name.clone();
        if !descriptor.enabled {
            return ConnectOutcome::Disabled { name };
        }
        match self.state(&descriptor.name) {
            Some(ConnectionState::Connected(_)) => ConnectOutcome::Connected { name },
            Some(ConnectionState::Failed(reason)) => ConnectOutcome::Failed { name, reason },
            Some(ConnectionState::Connecting) => ConnectOutcome::Failed {
                name,
                reason: "still connecting".to_string(),
            },
            None => ConnectOutcome::Failed {
                name,
                reason: "not connected".to_string(),
            },
        }
    }

    fn outcomes(&self, descriptors: &[ServerDescriptor]) -> Vec<ConnectOutcome> {
        descriptors.iter().map(|d| self.outcome_of(d)).collect()
    }

    async fn close_session(&self, name: &str, session: Arc<dyn McpSession>) {
        if let Err(e) = session.close().await {
            log_warn!(self.logger, "[Supervisor] Error closing '{}': {}", name, e);
        }
    }
}

/// One connect attempt under its deadline
async fn connect_one(
    connector: &dyn Connector,
    descriptor: &ServerDescriptor,
    deadline: Duration,
    logger: SharedLogger,
) -> GatewayResult<Arc<dyn McpSession>> {
    match tokio::time::timeout(deadline, connector.connect(descriptor, logger)).await {
        Ok(Ok(session)) => Ok(session),
        Ok(Err(e)) => Err(GatewayError::HandshakeFailure {
            server: descriptor.name.clone(),
            message: e.to_string(),
        }),
        Err(_) => Err(GatewayError::ConnectTimeout {
            server: descriptor.name.clone(),
            timeout_ms: deadline.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, MemoryLogger};
    use crate::mcp::mock::{MockConnector, MockServer};

    fn settings() -> GatewaySettings {
        GatewaySettings {
            connect_timeout_ms: 1_000,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_all_reports_every_server_within_deadline() {
        let mut connector = MockConnector::new();
        let fast = connector.add_server("fast", MockServer::new());
        connector.add_server("slow", MockServer::new().with_connect_delay(Duration::from_secs(60)));
        connector.add_server("broken", MockServer::new().with_connect_error("handshake refused"));

        let logger = Arc::new(MemoryLogger::new());
        let supervisor = ConnectionSupervisor::new(Arc::new(connector), logger.clone());
        let descriptors = vec![
            ServerDescriptor::stdio("fast", "x"),
            ServerDescriptor::stdio("slow", "x"),
            ServerDescriptor::stdio("broken", "x"),
            ServerDescriptor::stdio("off", "x").disabled(),
        ];

        let start = tokio::time::Instant::now();
        let outcomes = supervisor.connect_all(&descriptors, &settings()).await;
        assert!(start.elapsed() < Duration::from_millis(1_100));

        assert_eq!(outcomes.len(), 4);
        assert_eq!(outcomes[0], ConnectOutcome::Connected { name: "fast".to_string() });
        assert_eq!(
            outcomes[1],
            ConnectOutcome::Failed {
                name: "slow".to_string(),
                reason: "connection timed out after 1000ms".to_string()
            }
        );
        assert!(matches!(&outcomes[2], ConnectOutcome::Failed { reason, .. } if reason.contains("handshake refused")));
        assert_eq!(outcomes[3], ConnectOutcome::Disabled { name: "off".to_string() });

        assert!(supervisor.state("off").is_none());
        assert_eq!(fast.connect_count(), 1);
        assert!(logger.contains(LogLevel::Error, "[Supervisor] 'slow' failed"));
    }

    #[tokio::test]
    async fn test_connect_all_is_memoized_until_disconnect_all() {
        let mut connector = MockConnector::new();
        let server = connector.add_server("alpha", MockServer::new());
        let supervisor = ConnectionSupervisor::new(Arc::new(connector), Arc::new(MemoryLogger::new()));
        let descriptors = vec![ServerDescriptor::stdio("alpha", "x")];

        supervisor.connect_all(&descriptors, &settings()).await;
        let again = supervisor.connect_all(&descriptors, &settings()).await;
        assert!(again[0].is_connected());
        assert_eq!(server.connect_count(), 1);

        assert_eq!(supervisor.disconnect_all().await, 1);
        assert_eq!(server.close_count(), 1);
        assert!(supervisor.connected_sessions().is_empty());

        supervisor.connect_all(&descriptors, &settings()).await;
        assert_eq!(server.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_connect_all_reconnects_servers_disconnected_since() {
        let mut connector = MockConnector::new();
        let alpha = connector.add_server("alpha", MockServer::new());
        let beta = connector.add_server("beta", MockServer::new());
        let supervisor = ConnectionSupervisor::new(Arc::new(connector), Arc::new(MemoryLogger::new()));
        let descriptors = vec![
            ServerDescriptor::stdio("alpha", "x"),
            ServerDescriptor::stdio("beta", "x"),
        ];

        supervisor.connect_all(&descriptors, &settings()).await;
        assert!(supervisor.disconnect("alpha").await);
        assert!(supervisor.state("alpha").is_none());

        let outcomes = supervisor.connect_all(&descriptors, &settings()).await;
        assert!(outcomes.iter().all(ConnectOutcome::is_connected));
        assert_eq!(alpha.connect_count(), 2);
        assert_eq!(beta.connect_count(), 1);
        assert_eq!(supervisor.connected_sessions().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_connect_all_runs_one_pass() {
        let mut connector = MockConnector::new();
        let server = connector.add_server("alpha", MockServer::new());
        let supervisor = ConnectionSupervisor::new(Arc::new(connector), Arc::new(MemoryLogger::new()));
        let descriptors = vec![ServerDescriptor::stdio("alpha", "x")];
        let s = settings();

        let (a, b) = tokio::join!(
            supervisor.connect_all(&descriptors, &s),
            supervisor.connect_all(&descriptors, &s)
        );
        assert_eq!(a, b);
        assert_eq!(server.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_reconnect_releases_old_session_once() {
        let mut connector = MockConnector::new();
        let server = connector.add_server("alpha", MockServer::new());
        let supervisor = ConnectionSupervisor::new(Arc::new(connector), Arc::new(MemoryLogger::new()));
        let descriptor = ServerDescriptor::stdio("alpha", "x");

        supervisor.connect_all(std::slice::from_ref(&descriptor), &settings()).await;
        let outcome = supervisor.reconnect(&descriptor, &settings()).await;

        assert!(outcome.is_connected());
        assert_eq!(server.connect_count(), 2);
        assert_eq!(server.close_count(), 1);
        assert_eq!(supervisor.connected_sessions().len(), 1);

        assert!(supervisor.disconnect("alpha").await);
        assert_eq!(server.close_count(), 2);
        assert!(!supervisor.disconnect("alpha").await);
    }

    #[tokio::test]
    async fn test_discovery_failures_demote_after_limit() {
        let mut connector = MockConnector::new();
        let server = connector.add_server("alpha", MockServer::new());
        let supervisor = ConnectionSupervisor::new(Arc::new(connector), Arc::new(MemoryLogger::new()));
        supervisor
            .connect_all(&[ServerDescriptor::stdio("alpha", "x")], &settings())
            .await;

        assert!(!supervisor.record_discovery_failure("alpha", 3).await);
        supervisor.record_discovery_success("alpha");
        assert!(!supervisor.record_discovery_failure("alpha", 3).await);
        assert!(!supervisor.record_discovery_failure("alpha", 3).await);
        assert!(supervisor.record_discovery_failure("alpha", 3).await);

        let state = supervisor.state("alpha").unwrap();
        assert_eq!(state.server_state(), ServerState::Failed);
        assert_eq!(state.reason(), Some("discovery failed 3 consecutive times"));
        assert_eq!(server.close_count(), 1);

        // already failed: nothing more to release
        assert!(!supervisor.record_discovery_failure("alpha", 3).await);
        assert_eq!(server.close_count(), 1);
    }

    #[tokio::test]
    async fn test_zero_limit_never_demotes() {
        let mut connector = MockConnector::new();
        connector.add_server("alpha", MockServer::new());
        let supervisor = ConnectionSupervisor::new(Arc::new(connector), Arc::new(MemoryLogger::new()));
        supervisor
            .connect_all(&[ServerDescriptor::stdio("alpha", "x")], &settings())
            .await;

        for _ in 0..10 {
            assert!(!supervisor.record_discovery_failure("alpha", 0).await);
        }
        assert_eq!(
            supervisor.state("alpha").unwrap().server_state(),
            ServerState::Connected
        );
    }
}
