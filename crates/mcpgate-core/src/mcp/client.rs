//! MCP Client using the official rmcp SDK
//!
//! Connects to MCP servers over a child process's stdio or over streamable
//! HTTP. A tool call whose future is dropped before the server answers
//! (caller cancelled, attempt deadline passed) sends
//! `notifications/cancelled` for its request id.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rmcp::{
    ServiceExt,
    model::{
        CallToolRequest, CallToolRequestParams, CancelledNotificationParam, ClientCapabilities,
        ClientInfo, ClientRequest, Implementation, RequestId, ServerResult, Tool,
    },
    service::{Peer, PeerRequestOptions, RunningService},
    transport::{StreamableHttpClientTransport, TokioChildProcess},
    transport::streamable_http_client::StreamableHttpClientTransportConfig,
    RoleClient,
};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, Command};

use super::error::{McpError, McpResult};
use super::session::{Connector, McpSession, ServerCapabilities, ToolInfo};
use super::McpToolResult;
use crate::config::{ServerDescriptor, TransportConfig};
use crate::logging::{Logger, SharedLogger};

type ClientService = RunningService<RoleClient, ClientInfo>;

/// MCP client for one configured server
pub struct McpClient {
    /// Configured server name
    name: String,
    /// Request handle; cheap to clone, usable concurrently
    peer: Peer<RoleClient>,
    /// Owning service; taken exactly once on close
    service: Mutex<Option<ClientService>>,
    /// Captured from the handshake
    capabilities: ServerCapabilities,
    logger: SharedLogger,
}

/// An in-flight `tools/call`. Dropped unsettled, it tells the server the
/// request was abandoned.
struct PendingCall {
    server: String,
    peer: Peer<RoleClient>,
    id: Option<RequestId>,
    logger: SharedLogger,
}

impl PendingCall {
    fn settle(mut self) {
        self.id = None;
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        let Some(request_id) = self.id.take() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let peer = self.peer.clone();
        let logger = Arc::clone(&self.logger);
        let server = std::mem::take(&mut self.server);
        runtime.spawn(async move {
            let params = CancelledNotificationParam {
                request_id,
                reason: Some("client abandoned the call".to_string()),
            };
            if let Err(e) = peer.notify_cancelled(params).await {
                logger.debug(&format!(
                    "[McpClient] '{}' could not send cancellation: {}",
                    server, e
                ));
            }
        });
    }
}

impl McpClient {
    /// Connect using the descriptor's transport
    pub async fn connect(server: &ServerDescriptor, logger: SharedLogger) -> McpResult<Self> {
        match server.transport.expanded() {
            TransportConfig::Stdio { command, args, env, cwd } => {
                logger.info(&format!(
                    "[McpClient] Spawning '{}': {} {}",
                    server.name,
                    command,
                    args.join(" ")
                ));

                let mut cmd = Command::new(&command);
                cmd.args(&args).envs(&env);
                if let Some(cwd) = cwd {
                    cmd.current_dir(cwd);
                }

                let (transport, stderr) = TokioChildProcess::builder(cmd)
                    .stderr(Stdio::piped())
                    .spawn()
                    .map_err(|e| {
                        McpError::ConnectionFailed(format!("failed to spawn '{}': {}", command, e))
                    })?;

                // Drain before the handshake so a chatty server can't fill the
                // pipe and stall startup.
                if let Some(stderr) = stderr {
                    spawn_stderr_drain(server.name.clone(), stderr, Arc::clone(&logger));
                }

                let service = client_info()
                    .serve(transport)
                    .await
                    .map_err(|e| McpError::InitializationFailed(e.to_string()))?;

                Ok(Self::from_service(&server.name, service, logger))
            }
            TransportConfig::Http { url, headers } => {
                logger.info(&format!("[McpClient] Connecting '{}' to HTTP: {}", server.name, url));

                let transport = if headers.is_empty() {
                    StreamableHttpClientTransport::from_uri(url.as_str())
                } else {
                    let mut header_map = reqwest::header::HeaderMap::new();
                    for (key, value) in &headers {
                        let name = reqwest::header::HeaderName::from_bytes(key.as_bytes())
                            .map_err(|e| McpError::ConnectionFailed(format!("bad header name '{}': {}", key, e)))?;
                        let value = reqwest::header::HeaderValue::from_str(value)
                            .map_err(|e| McpError::ConnectionFailed(format!("bad header value for '{}': {}", key, e)))?;
                        header_map.insert(name, value);
                    }
                    let http = reqwest::Client::builder()
                        .default_headers(header_map)
                        .build()
                        .map_err(|e| McpError::ConnectionFailed(e.to_string()))?;
                    StreamableHttpClientTransport::with_client(
                        http,
                        StreamableHttpClientTransportConfig::with_uri(url.as_str()),
                    )
                };

                let service = client_info()
                    .serve(transport)
                    .await
                    .map_err(|e| McpError::InitializationFailed(e.to_string()))?;

                Ok(Self::from_service(&server.name, service, logger))
            }
        }
    }

    fn from_service(name: &str, service: ClientService, logger: SharedLogger) -> Self {
        let capabilities = service
            .peer_info()
            .map(|info| ServerCapabilities {
                tools: info.capabilities.tools.is_some(),
                resources: info.capabilities.resources.is_some(),
                prompts: info.capabilities.prompts.is_some(),
                server_name: Some(info.server_info.name.clone()),
                server_version: Some(info.server_info.version.clone()),
            })
            .unwrap_or_default();

        logger.info(&format!(
            "[McpClient] '{}' connected and initialized (tools: {})",
            name, capabilities.tools
        ));

        Self {
            name: name.to_string(),
            peer: service.peer().clone(),
            service: Mutex::new(Some(service)),
            capabilities,
            logger,
        }
    }

    /// Whether `close` has already released the transport
    pub fn is_closed(&self) -> bool {
        self.service.lock().is_none()
    }
}

#[async_trait]
impl McpSession for McpClient {
    fn server_name(&self) -> &str {
        &self.name
    }

    async fn capabilities(&self) -> McpResult<ServerCapabilities> {
        Ok(self.capabilities.clone())
    }

    async fn list_tools(&self) -> McpResult<Vec<ToolInfo>> {
        let tools = self
            .peer
            .list_all_tools()
            .await
            .map_err(|e| McpError::Protocol(e.to_string()))?;

        self.logger.debug(&format!(
            "[McpClient] '{}' listed {} tools",
            self.name,
            tools.len()
        ));

        Ok(tools.into_iter().map(ToolInfo::from).collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<McpToolResult> {
        self.logger.debug(&format!("[McpClient] '{}' calling tool: {}", self.name, name));

        let params = CallToolRequestParams {
            meta: None,
            name: name.to_owned().into(),
            arguments: arguments.as_object().cloned(),
            task: None,
        };

        let handle = self
            .peer
            .send_cancellable_request(
                ClientRequest::CallToolRequest(CallToolRequest::new(params)),
                PeerRequestOptions::no_options(),
            )
            .await
            .map_err(|e| McpError::ToolCallFailed(e.to_string()))?;

        let pending = PendingCall {
            server: self.name.clone(),
            peer: self.peer.clone(),
            id: Some(handle.id.clone()),
            logger: Arc::clone(&self.logger),
        };
        let response = handle.await_response().await;
        pending.settle();

        match response.map_err(|e| McpError::ToolCallFailed(e.to_string()))? {
            ServerResult::CallToolResult(result) => Ok(result),
            _ => Err(McpError::ToolCallFailed(
                "unexpected response to tools/call".to_string(),
            )),
        }
    }

    async fn close(&self) -> McpResult<()> {
        let service = self.service.lock().take();
        let Some(service) = service else {
            return Ok(());
        };

        self.logger.info(&format!("[McpClient] Closing connection to '{}'", self.name));
        service
            .cancel()
            .await
            .map_err(|e| McpError::Protocol(e.to_string()))?;
        Ok(())
    }
}

impl From<Tool> for ToolInfo {
    fn from(tool: Tool) -> Self {
        Self {
            name: tool.name.to_string(),
            description: tool.description.map(|s| s.to_string()),
            // input_schema is Arc<JsonObject>, convert to Value
            input_schema: Value::Object(tool.input_schema.as_ref().clone()),
        }
    }
}

/// Connector that opens real rmcp sessions
#[derive(Debug, Clone, Copy, Default)]
pub struct McpConnector;

#[async_trait]
impl Connector for McpConnector {
    async fn connect(
        &self,
        server: &ServerDescriptor,
        logger: SharedLogger,
    ) -> McpResult<Arc<dyn McpSession>> {
        let client = McpClient::connect(server, logger).await?;
        Ok(Arc::new(client))
    }
}

fn client_info() -> ClientInfo {
    ClientInfo {
        meta: None,
        protocol_version: Default::default(),
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: "mcpgate-core".to_string(),
            title: Some("McpGate".to_string()),
            version: env!("CARGO_PKG_VERSION").to_string(),
            website_url: None,
            icons: None,
        },
    }
}

/// Forward a server's stderr into the logger until the pipe closes
fn spawn_stderr_drain(server: String, stderr: ChildStderr, logger: Arc<dyn Logger>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if !line.trim().is_empty() {
                        logger.debug(&format!("[{} stderr] {}", server, line));
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    logger.warn(&format!("[{} stderr] read error: {}", server, e));
                    break;
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, MemoryLogger};
    use std::time::Duration;

    #[test]
    fn test_tool_info_from_rmcp_tool() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": { "path": { "type": "string" } },
            "required": ["path"]
        });
        let object = schema.as_object().cloned().unwrap();
        let tool = Tool::new("read_file", "Read a file", Arc::new(object));

        let info = ToolInfo::from(tool);
        assert_eq!(info.name, "read_file");
        assert_eq!(info.description.as_deref(), Some("Read a file"));
        assert_eq!(info.input_schema, schema);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stderr_drain_forwards_lines() {
        let logger = Arc::new(MemoryLogger::new());
        let mut child = Command::new("sh")
            .arg("-c")
            .arg("echo 'starting up' >&2; echo '' >&2; echo 'ready' >&2")
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        let stderr = child.stderr.take().unwrap();

        spawn_stderr_drain("demo".to_string(), stderr, logger.clone());
        child.wait().await.unwrap();

        for _ in 0..50 {
            if logger.contains(LogLevel::Debug, "ready") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(logger.contains(LogLevel::Debug, "[demo stderr] starting up"));
        assert!(logger.contains(LogLevel::Debug, "[demo stderr] ready"));
        // blank lines are skipped
        assert_eq!(logger.entries().len(), 2);
    }

    async fn read_message<R>(lines: &mut tokio::io::Lines<R>) -> Value
    where
        R: tokio::io::AsyncBufRead + Unpin,
    {
        let line = tokio::time::timeout(Duration::from_secs(5), lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        serde_json::from_str(&line).unwrap()
    }

    #[tokio::test]
    async fn test_abandoned_call_notifies_server() {
        use tokio::io::AsyncWriteExt;

        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let (client_read, client_write) = tokio::io::split(client_io);
        let (server_read, mut server_write) = tokio::io::split(server_io);
        let mut lines = BufReader::new(server_read).lines();

        let handshake = async {
            let init = read_message(&mut lines).await;
            assert_eq!(init["method"], "initialize");
            let reply = serde_json::json!({
                "jsonrpc": "2.0",
                "id": init["id"],
                "result": {
                    "protocolVersion": "2024-11-05",
                    "capabilities": { "tools": {} },
                    "serverInfo": { "name": "scripted", "version": "0.1.0" }
                }
            });
            server_write
                .write_all(format!("{}\n", reply).as_bytes())
                .await
                .unwrap();
            let initialized = read_message(&mut lines).await;
            assert_eq!(initialized["method"], "notifications/initialized");
        };
        let (service, ()) = tokio::join!(client_info().serve((client_read, client_write)), handshake);
        let client = McpClient::from_service("scripted", service.unwrap(), Arc::new(MemoryLogger::new()));
        assert!(client.capabilities().await.unwrap().tools);

        // the server never answers; the caller gives up
        let call = tokio::time::timeout(
            Duration::from_millis(200),
            client.call_tool("slow", serde_json::json!({"q": "x"})),
        );
        assert!(call.await.is_err());

        let request = read_message(&mut lines).await;
        assert_eq!(request["method"], "tools/call");
        assert_eq!(request["params"]["name"], "slow");

        let cancelled = read_message(&mut lines).await;
        assert_eq!(cancelled["method"], "notifications/cancelled");
        assert_eq!(cancelled["params"]["requestId"], request["id"]);

        let _ = client.close().await;
    }

    #[tokio::test]
    async fn test_spawn_failure_is_connection_failed() {
        let server = ServerDescriptor::stdio("ghost", "/definitely/not/a/real/binary");
        let err = McpClient::connect(&server, Arc::new(MemoryLogger::new()))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, McpError::ConnectionFailed(_)));
    }
}
