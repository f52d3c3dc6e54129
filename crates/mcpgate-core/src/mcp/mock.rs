//! Scripted MCP servers for testing
//!
//! Deterministic connect/list/call behavior without processes or network.
//! Gateway tests script each server (delays, failures, replies) and then
//! inspect what the gateway actually sent.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rmcp::model::Content;
use serde_json::Value;

use super::error::{McpError, McpResult};
use super::session::{Connector, McpSession, ServerCapabilities, ToolInfo};
use super::McpToolResult;
use crate::config::ServerDescriptor;
use crate::logging::SharedLogger;

/// One scripted reply to a tool call
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Successful result
    Result(McpToolResult),
    /// Transport/protocol level failure with this message
    Error(String),
    /// Never answer (until the caller gives up)
    Hang,
}

impl MockReply {
    /// Successful plain-text result
    pub fn text(text: impl Into<String>) -> Self {
        MockReply::Result(McpToolResult::success(vec![Content::text(text.into())]))
    }

    /// Error-flagged result carrying this text
    pub fn tool_error(text: impl Into<String>) -> Self {
        MockReply::Result(McpToolResult::error(vec![Content::text(text.into())]))
    }

    /// Failure with this message
    pub fn error(message: impl Into<String>) -> Self {
        MockReply::Error(message.into())
    }
}

/// Behavior and call log of one scripted server
///
/// State is shared across every session opened for it, so reconnects see
/// the same script and counters.
#[derive(Debug)]
pub struct MockServer {
    connect_delay: Duration,
    connect_error: Option<String>,
    capabilities: ServerCapabilities,
    tools: Vec<ToolInfo>,
    list_delay: Duration,
    list_error: Option<String>,
    replies: Mutex<VecDeque<MockReply>>,
    calls: Mutex<Vec<(String, Value)>>,
    connects: AtomicUsize,
    closes: AtomicUsize,
}

impl Default for MockServer {
    fn default() -> Self {
        Self {
            connect_delay: Duration::ZERO,
            connect_error: None,
            capabilities: ServerCapabilities::tools_only(),
            tools: Vec::new(),
            list_delay: Duration::ZERO,
            list_error: None,
            replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            connects: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        }
    }
}

impl MockServer {
    /// A server declaring tool support with no tools yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve tools with these names and a one-string-parameter schema
    pub fn with_tool_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            self.tools.push(ToolInfo::new(
                name.clone(),
                format!("Mock tool {}", name),
                serde_json::json!({
                    "type": "object",
                    "properties": { "text": { "type": "string", "description": "Input text" } },
                    "required": ["text"]
                }),
            ));
        }
        self
    }

    /// Serve these tools
    pub fn with_tools(mut self, tools: Vec<ToolInfo>) -> Self {
        self.tools = tools;
        self
    }

    /// Delay the handshake
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    /// Fail the handshake
    pub fn with_connect_error(mut self, message: impl Into<String>) -> Self {
        self.connect_error = Some(message.into());
        self
    }

    /// Delay tool listing
    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = delay;
        self
    }

    /// Fail tool listing
    pub fn with_list_error(mut self, message: impl Into<String>) -> Self {
        self.list_error = Some(message.into());
        self
    }

    /// Declare these capabilities instead of tools-only
    pub fn with_capabilities(mut self, capabilities: ServerCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Queue a reply; once the queue is empty calls echo their arguments
    pub fn push_reply(&self, reply: MockReply) {
        self.replies.lock().push_back(reply);
    }

    /// Every call received so far, in order
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Successful handshakes
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Transport releases
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Connector handing out sessions for scripted servers
#[derive(Debug, Default)]
pub struct MockConnector {
    servers: HashMap<String, Arc<MockServer>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a server; returns the shared handle for assertions
    pub fn add_server(&mut self, name: impl Into<String>, server: MockServer) -> Arc<MockServer> {
        let server = Arc::new(server);
        self.servers.insert(name.into(), Arc::clone(&server));
        server
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        server: &ServerDescriptor,
        logger: SharedLogger,
    ) -> McpResult<Arc<dyn McpSession>> {
        let Some(mock) = self.servers.get(&server.name) else {
            return Err(McpError::ConnectionFailed(format!(
                "no mock server named '{}'",
                server.name
            )));
        };

        if !mock.connect_delay.is_zero() {
            tokio::time::sleep(mock.connect_delay).await;
        }
        if let Some(message) = &mock.connect_error {
            return Err(McpError::InitializationFailed(message.clone()));
        }

        mock.connects.fetch_add(1, Ordering::SeqCst);
        logger.debug(&format!("[MockConnector] '{}' connected", server.name));

        Ok(Arc::new(MockSession {
            name: server.name.clone(),
            server: Arc::clone(mock),
            closed: AtomicBool::new(false),
        }))
    }
}

/// One open session on a scripted server
#[derive(Debug)]
pub struct MockSession {
    name: String,
    server: Arc<MockServer>,
    closed: AtomicBool,
}

#[async_trait]
impl McpSession for MockSession {
    fn server_name(&self) -> &str {
        &self.name
    }

    async fn capabilities(&self) -> McpResult<ServerCapabilities> {
        Ok(self.server.capabilities.clone())
    }

    async fn list_tools(&self) -> McpResult<Vec<ToolInfo>> {
        if !self.server.list_delay.is_zero() {
            tokio::time::sleep(self.server.list_delay).await;
        }
        if let Some(message) = &self.server.list_error {
            return Err(McpError::Protocol(message.clone()));
        }
        Ok(self.server.tools.clone())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<McpToolResult> {
        self.server
            .calls
            .lock()
            .push((name.to_string(), arguments.clone()));

        let reply = self.server.replies.lock().pop_front();
        match reply {
            Some(MockReply::Result(result)) => Ok(result),
            Some(MockReply::Error(message)) => Err(McpError::ToolCallFailed(message)),
            Some(MockReply::Hang) => {
                futures::future::pending::<()>().await;
                Err(McpError::ToolCallFailed("unreachable".to_string()))
            }
            None => Ok(McpToolResult::success(vec![Content::text(arguments.to_string())])),
        }
    }

    async fn close(&self) -> McpResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.server.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_session_replays_script() {
        let mut connector = MockConnector::new();
        let server = connector.add_server("alpha", MockServer::new().with_tool_names(["echo"]));
        server.push_reply(MockReply::error("boom"));
        server.push_reply(MockReply::text("ok"));

        let session = connector
            .connect(&ServerDescriptor::stdio("alpha", "unused"), Arc::new(NoOpLogger))
            .await
            .unwrap();

        assert_eq!(session.list_tools().await.unwrap().len(), 1);
        assert!(session.call_tool("echo", json!({})).await.is_err());
        assert!(session.call_tool("echo", json!({})).await.is_ok());
        // script exhausted: echo arguments
        let echoed = session.call_tool("echo", json!({"a": 1})).await.unwrap();
        assert_ne!(echoed.is_error, Some(true));
        assert_eq!(server.call_count(), 3);

        session.close().await.unwrap();
        session.close().await.unwrap();
        assert_eq!(server.close_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_mock_server_fails() {
        let connector = MockConnector::new();
        let result = connector
            .connect(&ServerDescriptor::stdio("nobody", "unused"), Arc::new(NoOpLogger))
            .await;
        assert!(matches!(result, Err(McpError::ConnectionFailed(_))));
    }
}
