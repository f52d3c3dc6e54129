//! Server descriptors and gateway settings

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::traits::{ConfigError, ConfigResult};

/// Delimiter joining server and tool names into a tool identity.
/// Server names may not contain it.
pub const IDENTITY_DELIMITER: &str = "__";

/// How to reach one MCP server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Launch a subprocess and speak MCP over its stdin/stdout
    #[serde(alias = "subprocess")]
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cwd: Option<PathBuf>,
    },
    /// Persistent HTTP event stream (streamable HTTP)
    #[serde(alias = "network-stream", alias = "sse", alias = "streamable-http")]
    Http {
        url: String,
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
}

impl TransportConfig {
    /// Short transport label for status views
    pub fn kind(&self) -> &'static str {
        match self {
            TransportConfig::Stdio { .. } => "stdio",
            TransportConfig::Http { .. } => "http",
        }
    }

    /// Expand `${VAR}` references from the process environment
    pub fn expanded(&self) -> TransportConfig {
        match self {
            TransportConfig::Stdio { command, args, env, cwd } => TransportConfig::Stdio {
                command: expand_env_vars(command),
                args: args.iter().map(|a| expand_env_vars(a)).collect(),
                env: env
                    .iter()
                    .map(|(k, v)| (k.clone(), expand_env_vars(v)))
                    .collect(),
                cwd: cwd.clone(),
            },
            TransportConfig::Http { url, headers } => TransportConfig::Http {
                url: expand_env_vars(url),
                headers: headers
                    .iter()
                    .map(|(k, v)| (k.clone(), expand_env_vars(v)))
                    .collect(),
            },
        }
    }
}

/// Configuration for a single MCP server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    /// Unique server name; filled from the map key when loaded from a file
    #[serde(skip)]
    pub name: String,

    #[serde(flatten)]
    pub transport: TransportConfig,

    /// Disabled servers are never connected and contribute no tools
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Short tool names hidden from the exposed registry
    #[serde(default, alias = "disabledTools", skip_serializing_if = "BTreeSet::is_empty")]
    pub disabled_tools: BTreeSet<String>,

    /// Overrides `GatewaySettings::connect_timeout_ms` for this server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_ms: Option<u64>,

    /// Overrides `GatewaySettings::discovery_timeout_ms` for this server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery_timeout_ms: Option<u64>,
}

fn default_true() -> bool {
    true
}

impl ServerDescriptor {
    /// A subprocess-backed server
    pub fn stdio(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self::with_transport(
            name,
            TransportConfig::Stdio {
                command: command.into(),
                args: Vec::new(),
                env: BTreeMap::new(),
                cwd: None,
            },
        )
    }

    /// A network-stream server
    pub fn http(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::with_transport(
            name,
            TransportConfig::Http {
                url: url.into(),
                headers: BTreeMap::new(),
            },
        )
    }

    fn with_transport(name: impl Into<String>, transport: TransportConfig) -> Self {
        Self {
            name: name.into(),
            transport,
            enabled: true,
            disabled_tools: BTreeSet::new(),
            connect_timeout_ms: None,
            discovery_timeout_ms: None,
        }
    }

    /// Set subprocess arguments (ignored for HTTP servers)
    pub fn with_args(mut self, new_args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        if let TransportConfig::Stdio { args, .. } = &mut self.transport {
            *args = new_args.into_iter().map(Into::into).collect();
        }
        self
    }

    /// Add a subprocess environment variable (ignored for HTTP servers)
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let TransportConfig::Stdio { env, .. } = &mut self.transport {
            env.insert(key.into(), value.into());
        }
        self
    }

    /// Add an HTTP header (ignored for stdio servers)
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let TransportConfig::Http { headers, .. } = &mut self.transport {
            headers.insert(key.into(), value.into());
        }
        self
    }

    /// Mark the server disabled
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Hide one tool of this server
    pub fn with_disabled_tool(mut self, tool: impl Into<String>) -> Self {
        self.disabled_tools.insert(tool.into());
        self
    }

    /// Per-server connect deadline
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Per-server discovery deadline
    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Effective connect deadline
    pub fn connect_timeout(&self, settings: &GatewaySettings) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.unwrap_or(settings.connect_timeout_ms))
    }

    /// Effective discovery deadline
    pub fn discovery_timeout(&self, settings: &GatewaySettings) -> Duration {
        Duration::from_millis(
            self.discovery_timeout_ms
                .unwrap_or(settings.discovery_timeout_ms),
        )
    }
}

/// Gateway-wide tunables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Deadline for one server's connect + handshake
    pub connect_timeout_ms: u64,
    /// Deadline for one server's tool listing
    pub discovery_timeout_ms: u64,
    /// Deadline for a single invocation attempt
    pub call_timeout_ms: u64,
    /// Total attempts per invocation, including the first
    pub max_attempts: u32,
    /// Backoff before the first plain retry; doubles per retry
    pub retry_backoff_ms: u64,
    /// Upper bound for the plain-retry backoff
    pub retry_backoff_max_ms: u64,
    /// Truncation bounds applied after the 1st, 2nd, ... rejected request.
    /// Strictly decreasing, none below `degrade_floor`.
    pub degrade_bounds: Vec<usize>,
    /// Past the listed bounds the last one halves per rejection until it
    /// reaches this floor, then stays there
    pub degrade_floor: usize,
    /// Consecutive discovery failures before a server is marked failed (0 = never)
    pub max_discovery_failures: u32,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 30_000,
            discovery_timeout_ms: 60_000,
            call_timeout_ms: 120_000,
            max_attempts: 3,
            retry_backoff_ms: 500,
            retry_backoff_max_ms: 8_000,
            degrade_bounds: vec![1000, 500],
            degrade_floor: 100,
            max_discovery_failures: 3,
        }
    }
}

impl GatewaySettings {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Reject settings that would make input degradation non-monotonic
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidSettings(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.degrade_floor == 0 {
            return Err(ConfigError::InvalidSettings(
                "degrade_floor must be at least 1".to_string(),
            ));
        }
        if let Some(bound) = self.degrade_bounds.iter().find(|b| **b < self.degrade_floor) {
            return Err(ConfigError::InvalidSettings(format!(
                "degrade bound {} is below degrade_floor {}",
                bound, self.degrade_floor
            )));
        }
        if let Some(pair) = self.degrade_bounds.windows(2).find(|w| w[1] >= w[0]) {
            return Err(ConfigError::InvalidSettings(format!(
                "degrade_bounds must be strictly decreasing, got {} then {}",
                pair[0], pair[1]
            )));
        }
        Ok(())
    }
}

/// Everything the gateway reads at construction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub settings: GatewaySettings,

    /// Servers keyed by name
    #[serde(default)]
    pub servers: BTreeMap<String, ServerDescriptor>,
}

impl GatewayConfig {
    /// Build a config from descriptors, validating names
    pub fn from_servers(
        settings: GatewaySettings,
        servers: impl IntoIterator<Item = ServerDescriptor>,
    ) -> ConfigResult<Self> {
        settings.validate()?;
        let mut config = Self {
            settings,
            servers: BTreeMap::new(),
        };
        for server in servers {
            config.add_server(server)?;
        }
        Ok(config)
    }

    /// Parse YAML and fill descriptor names from their map keys
    pub fn from_yaml(content: &str) -> ConfigResult<Self> {
        let mut config: GatewayConfig = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Other(format!("Failed to parse YAML: {}", e)))?;
        config.settings.validate()?;
        for (name, server) in config.servers.iter_mut() {
            validate_server_name(name)?;
            server.name = name.clone();
        }
        Ok(config)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> ConfigResult<String> {
        serde_yaml::to_string(self)
            .map_err(|e| ConfigError::Other(format!("Failed to serialize YAML: {}", e)))
    }

    /// Descriptors in name order
    pub fn descriptors(&self) -> Vec<ServerDescriptor> {
        self.servers.values().cloned().collect()
    }

    pub fn add_server(&mut self, server: ServerDescriptor) -> ConfigResult<()> {
        validate_server_name(&server.name)?;
        if self.servers.contains_key(&server.name) {
            return Err(ConfigError::ServerExists(server.name));
        }
        self.servers.insert(server.name.clone(), server);
        Ok(())
    }

    pub fn remove_server(&mut self, name: &str) -> ConfigResult<ServerDescriptor> {
        self.servers
            .remove(name)
            .ok_or_else(|| ConfigError::ServerNotFound(name.to_string()))
    }

    pub fn set_server_enabled(&mut self, name: &str, enabled: bool) -> ConfigResult<()> {
        self.server_mut(name)?.enabled = enabled;
        Ok(())
    }

    pub fn set_tool_enabled(&mut self, server: &str, tool: &str, enabled: bool) -> ConfigResult<()> {
        let descriptor = self.server_mut(server)?;
        if enabled {
            descriptor.disabled_tools.remove(tool);
        } else {
            descriptor.disabled_tools.insert(tool.to_string());
        }
        Ok(())
    }

    fn server_mut(&mut self, name: &str) -> ConfigResult<&mut ServerDescriptor> {
        self.servers
            .get_mut(name)
            .ok_or_else(|| ConfigError::ServerNotFound(name.to_string()))
    }
}

/// Server names become the first half of every tool identity, so they must
/// be non-empty, free of whitespace and must not contain the delimiter.
pub fn validate_server_name(name: &str) -> ConfigResult<()> {
    if name.is_empty()
        || name.contains(IDENTITY_DELIMITER)
        || name.chars().any(char::is_whitespace)
    {
        return Err(ConfigError::InvalidServerName(name.to_string()));
    }
    Ok(())
}

/// Expand `${VAR_NAME}` patterns in a string using environment variables.
///
/// If a variable is not set, the `${VAR_NAME}` token is left as-is.
pub fn expand_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => result.push_str(&format!("${{{var_name}}}")),
            }
        } else {
            result.push(ch);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yaml_config() {
        let yaml = r#"
settings:
  connect_timeout_ms: 5000
  max_attempts: 4
servers:
  filesystem:
    transport: stdio
    command: npx
    args: ["-y", "@modelcontextprotocol/server-filesystem", "/tmp"]
    disabled_tools: [write_file]
  remote:
    transport: network-stream
    url: https://tools.example.com/mcp
    enabled: false
"#;
        let config = GatewayConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.settings.connect_timeout_ms, 5000);
        assert_eq!(config.settings.max_attempts, 4);
        // unspecified settings keep their defaults
        assert_eq!(config.settings.degrade_bounds, vec![1000, 500]);

        let fs = &config.servers["filesystem"];
        assert_eq!(fs.name, "filesystem");
        assert!(fs.enabled);
        assert!(fs.disabled_tools.contains("write_file"));
        assert_eq!(fs.transport.kind(), "stdio");

        let remote = &config.servers["remote"];
        assert!(!remote.enabled);
        assert_eq!(
            remote.transport,
            TransportConfig::Http {
                url: "https://tools.example.com/mcp".to_string(),
                headers: BTreeMap::new(),
            }
        );
    }

    #[test]
    fn test_degrade_bounds_must_decrease() {
        let yaml = r#"
settings:
  degrade_bounds: [500, 1000]
"#;
        assert!(matches!(
            GatewayConfig::from_yaml(yaml),
            Err(ConfigError::InvalidSettings(msg)) if msg.contains("strictly decreasing")
        ));

        let flat = GatewaySettings {
            degrade_bounds: vec![800, 800],
            ..Default::default()
        };
        assert!(GatewayConfig::from_servers(flat, Vec::new()).is_err());

        let below_floor = GatewaySettings {
            degrade_bounds: vec![1000, 50],
            ..Default::default()
        };
        assert!(matches!(
            below_floor.validate(),
            Err(ConfigError::InvalidSettings(msg)) if msg.contains("below degrade_floor")
        ));

        assert!(GatewaySettings::default().validate().is_ok());
        let custom = GatewaySettings {
            degrade_bounds: vec![4000, 2000, 300],
            degrade_floor: 200,
            ..Default::default()
        };
        assert!(custom.validate().is_ok());
    }

    #[test]
    fn test_yaml_rejects_delimiter_in_name() {
        let yaml = r#"
servers:
  bad__name:
    transport: stdio
    command: echo
"#;
        assert!(matches!(
            GatewayConfig::from_yaml(yaml),
            Err(ConfigError::InvalidServerName(_))
        ));
    }

    #[test]
    fn test_validate_server_name() {
        assert!(validate_server_name("github").is_ok());
        assert!(validate_server_name("my-server_1").is_ok());
        assert!(validate_server_name("").is_err());
        assert!(validate_server_name("a__b").is_err());
        assert!(validate_server_name("has space").is_err());
    }

    #[test]
    fn test_effective_timeouts() {
        let settings = GatewaySettings::default();
        let plain = ServerDescriptor::stdio("a", "cmd");
        assert_eq!(plain.connect_timeout(&settings), Duration::from_secs(30));
        assert_eq!(plain.discovery_timeout(&settings), Duration::from_secs(60));

        let tuned = plain
            .with_connect_timeout(Duration::from_millis(250))
            .with_discovery_timeout(Duration::from_secs(2));
        assert_eq!(tuned.connect_timeout(&settings), Duration::from_millis(250));
        assert_eq!(tuned.discovery_timeout(&settings), Duration::from_secs(2));
    }

    #[test]
    fn test_config_mutations() {
        let mut config = GatewayConfig::from_servers(
            GatewaySettings::default(),
            vec![ServerDescriptor::stdio("alpha", "alpha-server")],
        )
        .unwrap();

        assert!(matches!(
            config.add_server(ServerDescriptor::stdio("alpha", "other")),
            Err(ConfigError::ServerExists(_))
        ));

        config.set_tool_enabled("alpha", "delete_all", false).unwrap();
        assert!(config.servers["alpha"].disabled_tools.contains("delete_all"));
        config.set_tool_enabled("alpha", "delete_all", true).unwrap();
        assert!(config.servers["alpha"].disabled_tools.is_empty());

        config.set_server_enabled("alpha", false).unwrap();
        assert!(!config.servers["alpha"].enabled);

        assert!(matches!(
            config.set_server_enabled("ghost", true),
            Err(ConfigError::ServerNotFound(_))
        ));
        config.remove_server("alpha").unwrap();
        assert!(config.servers.is_empty());
    }

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("MCPGATE_TEST_TOKEN", "secret");
        assert_eq!(expand_env_vars("Bearer ${MCPGATE_TEST_TOKEN}"), "Bearer secret");
        assert_eq!(
            expand_env_vars("${MCPGATE_TEST_SURELY_UNSET}/x"),
            "${MCPGATE_TEST_SURELY_UNSET}/x"
        );
        assert_eq!(expand_env_vars("no vars"), "no vars");

        let http = ServerDescriptor::http("remote", "https://example.com")
            .with_header("Authorization", "Bearer ${MCPGATE_TEST_TOKEN}");
        match http.transport.expanded() {
            TransportConfig::Http { headers, .. } => {
                assert_eq!(headers["Authorization"], "Bearer secret");
            }
            other => panic!("unexpected transport: {:?}", other),
        }
    }
}
