//! Stable tool identities
//!
//! Remote tools are namespaced as `mcp__{server}__{tool}` so tools from
//! different servers never collide with each other or with local tools.

use std::fmt;

use crate::config::IDENTITY_DELIMITER;

/// Prefix of every remote tool identity
pub const REMOTE_PREFIX: &str = "mcp";

/// Compound identity of a remote tool
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ToolIdentity {
    pub server: String,
    pub tool: String,
}

impl ToolIdentity {
    pub fn new(server: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            tool: tool.into(),
        }
    }

    /// Render as the single-token identity
    pub fn render(&self) -> String {
        format!(
            "{REMOTE_PREFIX}{d}{}{d}{}",
            self.server,
            self.tool,
            d = IDENTITY_DELIMITER
        )
    }

    /// Split a rendered identity back into its parts.
    ///
    /// Returns `None` for anything that isn't `mcp__{server}__{tool}` with
    /// both parts non-empty. Tool names may themselves contain the
    /// delimiter; server names cannot.
    pub fn parse(identity: &str) -> Option<Self> {
        let rest = identity
            .strip_prefix(REMOTE_PREFIX)?
            .strip_prefix(IDENTITY_DELIMITER)?;
        let (server, tool) = rest.split_once(IDENTITY_DELIMITER)?;
        if server.is_empty() || tool.is_empty() {
            return None;
        }
        Some(Self::new(server, tool))
    }
}

impl fmt::Display for ToolIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        assert_eq!(
            ToolIdentity::new("filesystem", "read_file").render(),
            "mcp__filesystem__read_file"
        );
        assert_eq!(
            ToolIdentity::new("github", "create_issue").to_string(),
            "mcp__github__create_issue"
        );
    }

    #[test]
    fn test_parse_round_trip() {
        let id = ToolIdentity::new("github", "create_issue");
        assert_eq!(ToolIdentity::parse(&id.render()), Some(id));

        // delimiter inside the tool name stays with the tool
        let odd = ToolIdentity::new("srv", "weird__tool");
        assert_eq!(ToolIdentity::parse("mcp__srv__weird__tool"), Some(odd));
    }

    #[test]
    fn test_parse_rejects_unexpected_shapes() {
        assert_eq!(ToolIdentity::parse("read_file"), None);
        assert_eq!(ToolIdentity::parse("mcp__onlyserver"), None);
        assert_eq!(ToolIdentity::parse("mcp____tool"), None);
        assert_eq!(ToolIdentity::parse("mcp__server__"), None);
        assert_eq!(ToolIdentity::parse("agent__reviewer"), None);
        assert_eq!(ToolIdentity::parse("mcpx__a__b"), None);
    }
}
