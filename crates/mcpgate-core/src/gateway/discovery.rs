//! Capability discovery for one connected server

use std::time::Duration;

use super::error::GatewayError;
use crate::logging::SharedLogger;
use crate::mcp::{McpResult, McpSession, ToolInfo};

/// What one discovery pass found on one server
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryOutcome {
    /// The server listed these tools
    Listed(Vec<ToolInfo>),
    /// No tools capability declared; contributes nothing, not a failure
    CapabilityAbsent,
    /// Timed out or errored; contributes nothing this pass
    Failed(GatewayError),
}

impl DiscoveryOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, DiscoveryOutcome::Failed(_))
    }
}

/// Read capabilities and list tools, all under `deadline`
pub async fn discover_tools(
    session: &dyn McpSession,
    deadline: Duration,
    logger: &SharedLogger,
) -> DiscoveryOutcome {
    let server = session.server_name().to_string();

    match tokio::time::timeout(deadline, list_if_declared(session)).await {
        Ok(Ok(Some(tools))) => {
            logger.info(&format!("[Discovery] '{}' listed {} tools", server, tools.len()));
            DiscoveryOutcome::Listed(tools)
        }
        Ok(Ok(None)) => {
            logger.info(&format!(
                "[Discovery] '{}' does not declare tool support; contributing no tools",
                server
            ));
            DiscoveryOutcome::CapabilityAbsent
        }
        Ok(Err(e)) => {
            let err = GatewayError::DiscoveryFailed {
                server: server.clone(),
                message: e.to_string(),
            };
            logger.warn(&format!("[Discovery] '{}': {}", server, err));
            DiscoveryOutcome::Failed(err)
        }
        Err(_) => {
            let err = GatewayError::DiscoveryTimeout {
                server: server.clone(),
                timeout_ms: deadline.as_millis() as u64,
            };
            logger.warn(&format!(
                "[Discovery] '{}': {}; contributing no tools this pass",
                server, err
            ));
            DiscoveryOutcome::Failed(err)
        }
    }
}

/// `None` when the server doesn't declare tool support
async fn list_if_declared(session: &dyn McpSession) -> McpResult<Option<Vec<ToolInfo>>> {
    let caps = session.capabilities().await?;
    if !caps.tools {
        return Ok(None);
    }
    session.list_tools().await.map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerDescriptor;
    use crate::logging::{LogLevel, MemoryLogger};
    use crate::mcp::mock::{MockConnector, MockServer};
    use crate::mcp::{Connector, ServerCapabilities};
    use std::sync::Arc;

    async fn discover(server: MockServer, deadline: Duration) -> (DiscoveryOutcome, Arc<MemoryLogger>) {
        let mut connector = MockConnector::new();
        connector.add_server("srv", server);
        let logger = Arc::new(MemoryLogger::new());
        let session = connector
            .connect(&ServerDescriptor::stdio("srv", "unused"), logger.clone())
            .await
            .unwrap();
        let shared: SharedLogger = logger.clone();
        (discover_tools(session.as_ref(), deadline, &shared).await, logger)
    }

    #[tokio::test]
    async fn test_lists_tools() {
        let (outcome, _) = discover(
            MockServer::new().with_tool_names(["a", "b"]),
            Duration::from_secs(1),
        )
        .await;
        match outcome {
            DiscoveryOutcome::Listed(tools) => assert_eq!(tools.len(), 2),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_capability_absent_is_not_a_failure() {
        let (outcome, logger) = discover(
            MockServer::new()
                .with_tool_names(["hidden"])
                .with_capabilities(ServerCapabilities::default()),
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(outcome, DiscoveryOutcome::CapabilityAbsent);
        assert!(!outcome.is_failure());
        assert!(logger.contains(LogLevel::Info, "does not declare tool support"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_listing_timeout() {
        let (outcome, logger) = discover(
            MockServer::new()
                .with_tool_names(["slow"])
                .with_list_delay(Duration::from_secs(10)),
            Duration::from_millis(200),
        )
        .await;
        assert_eq!(
            outcome,
            DiscoveryOutcome::Failed(GatewayError::DiscoveryTimeout {
                server: "srv".to_string(),
                timeout_ms: 200,
            })
        );
        assert!(logger.contains(LogLevel::Warn, "tool listing timed out after 200ms"));
    }

    #[tokio::test]
    async fn test_listing_error() {
        let (outcome, _) = discover(
            MockServer::new().with_list_error("method not found"),
            Duration::from_secs(1),
        )
        .await;
        assert!(outcome.is_failure());
    }
}
