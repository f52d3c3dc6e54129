//! Remote tools wrapped behind the uniform tool interface

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::handler::{ToolHandler, ToolKind};
use super::identity::ToolIdentity;
use crate::gateway::{Invocation, InvocationError, InvocationExecutor};
use crate::mcp::{McpSession, ToolInfo};
use crate::types::{CancellationToken, ToolOutput};

/// A tool served by a connected MCP server
///
/// Remote tools are always treated as side-effecting: nothing a server
/// advertises is trusted to be read-only.
pub struct RemoteTool {
    identity: ToolIdentity,
    rendered: String,
    description: String,
    input_schema: Value,
    session: Arc<dyn McpSession>,
    executor: Arc<InvocationExecutor>,
}

impl RemoteTool {
    pub fn new(
        server: &str,
        info: ToolInfo,
        session: Arc<dyn McpSession>,
        executor: Arc<InvocationExecutor>,
    ) -> Self {
        let identity = ToolIdentity::new(server, &info.name);
        let description = synthesize_description(&identity, info.description.as_deref(), &info.input_schema);
        let input_schema = if info.input_schema.is_object() {
            info.input_schema
        } else {
            serde_json::json!({ "type": "object", "properties": {} })
        };

        Self {
            rendered: identity.render(),
            identity,
            description,
            input_schema,
            session,
            executor,
        }
    }

    pub fn tool_identity(&self) -> &ToolIdentity {
        &self.identity
    }

    /// Invoke and report attempts and degradations alongside the output
    pub async fn invoke_detailed(
        &self,
        input: Value,
        cancel: &CancellationToken,
    ) -> Result<Invocation, InvocationError> {
        self.executor
            .execute(self.session.as_ref(), &self.identity.tool, input, cancel)
            .await
    }
}

#[async_trait]
impl ToolHandler for RemoteTool {
    fn identity(&self) -> &str {
        &self.rendered
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Remote
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn server(&self) -> Option<&str> {
        Some(&self.identity.server)
    }

    async fn invoke(
        &self,
        input: Value,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput, InvocationError> {
        self.invoke_detailed(input, cancel).await.map(|inv| inv.output)
    }
}

/// Build the description shown to the model.
///
/// Starts from the server's description (or a generic one naming the tool
/// and server) and appends the required parameters and one line per
/// declared parameter with its type and description.
pub fn synthesize_description(identity: &ToolIdentity, description: Option<&str>, schema: &Value) -> String {
    let mut out = match description.map(str::trim) {
        Some(d) if !d.is_empty() => d.to_string(),
        _ => format!("Tool '{}' from MCP server '{}'", identity.tool, identity.server),
    };

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return out;
    };
    if properties.is_empty() {
        return out;
    }

    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    if !required.is_empty() {
        out.push_str("\n\nRequired parameters: ");
        out.push_str(&required.join(", "));
    }

    out.push_str("\n\nParameters:");
    for (name, prop) in properties {
        let ty = param_type(prop);
        out.push_str(&format!("\n- {} ({}", name, ty));
        if required.contains(&name.as_str()) {
            out.push_str(", required");
        }
        out.push(')');
        if let Some(desc) = prop.get("description").and_then(Value::as_str) {
            let desc = desc.trim();
            if !desc.is_empty() {
                out.push_str(": ");
                out.push_str(desc);
            }
        }
    }

    out
}

fn param_type(prop: &Value) -> String {
    match prop.get("type") {
        Some(Value::String(t)) => t.clone(),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" | "),
        _ if prop.get("enum").is_some() => "enum".to_string(),
        _ => "any".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_description_lists_parameters() {
        let id = ToolIdentity::new("filesystem", "write_file");
        let schema = json!({
            "type": "object",
            "properties": {
                "content": { "type": "string", "description": "Text to write" },
                "path": { "type": "string", "description": "Destination path" },
                "append": { "type": ["boolean", "null"] }
            },
            "required": ["path", "content"]
        });

        let desc = synthesize_description(&id, Some("Write a file"), &schema);
        assert!(desc.starts_with("Write a file\n\nRequired parameters: path, content"));
        assert!(desc.contains("\n- path (string, required): Destination path"));
        assert!(desc.contains("\n- content (string, required): Text to write"));
        assert!(desc.contains("\n- append (boolean | null)"));
    }

    #[test]
    fn test_description_fallbacks() {
        let id = ToolIdentity::new("github", "ping");
        let desc = synthesize_description(&id, None, &json!({"type": "object"}));
        assert_eq!(desc, "Tool 'ping' from MCP server 'github'");

        let desc = synthesize_description(&id, Some("   "), &json!({}));
        assert_eq!(desc, "Tool 'ping' from MCP server 'github'");
    }
}
