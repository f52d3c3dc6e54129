//! Status surface for external CLIs and UIs

use serde::{Deserialize, Serialize};

use crate::mcp::ServerCapabilities;

/// Where a configured server stands right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerState {
    /// Enabled but no connect attempt made yet (or disconnected)
    NotConnected,
    Connecting,
    Connected,
    Failed,
    Disabled,
}

impl ServerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerState::NotConnected => "not_connected",
            ServerState::Connecting => "connecting",
            ServerState::Connected => "connected",
            ServerState::Failed => "failed",
            ServerState::Disabled => "disabled",
        }
    }
}

/// One row of `Gateway::server_statuses`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub name: String,
    /// `stdio` or `http`
    pub transport: String,
    pub state: ServerState,
    /// Failure reason, when `Failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Tools from this server in the current registry
    pub tool_count: usize,
}

/// Result of an on-demand connectivity test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub name: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<ServerCapabilities>,
    /// Tool names the server listed
    #[serde(default)]
    pub tools: Vec<String>,
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        let status = ServerStatus {
            name: "github".to_string(),
            transport: "stdio".to_string(),
            state: ServerState::Failed,
            reason: Some("connection timed out after 100ms".to_string()),
            tool_count: 0,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["reason"], "connection timed out after 100ms");

        let ok = ServerStatus {
            state: ServerState::NotConnected,
            reason: None,
            ..status
        };
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["state"], ServerState::NotConnected.as_str());
        assert!(json.get("reason").is_none());
    }
}
