//! The uniform tool contract exposed to the orchestrator
//!
//! Every tool the orchestrator can call implements `ToolHandler`, tagged
//! by `ToolKind`:
//! - `Builtin`: an in-process async function (`BuiltinTool`)
//! - `Remote`: a tool served by an MCP server (`RemoteTool`)
//! - `Agent`: a sub-agent exposed as a tool (`AgentTool`)

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::gateway::InvocationError;
use crate::types::{CancellationToken, ToolOutput, ToolSpec};

/// Which family a tool belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Builtin,
    Remote,
    Agent,
}

/// A tool the orchestrator can call
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Stable identity, unique within a registry
    fn identity(&self) -> &str;

    /// Description shown to the model
    fn description(&self) -> &str;

    /// JSON Schema of the input
    fn input_schema(&self) -> &Value;

    fn kind(&self) -> ToolKind;

    /// Whether the tool is known to be free of side effects
    fn is_read_only(&self) -> bool {
        false
    }

    /// Whether the orchestrator should ask before calling
    fn requires_confirmation(&self) -> bool {
        !self.is_read_only()
    }

    /// Server serving this tool, for remote tools
    fn server(&self) -> Option<&str> {
        None
    }

    /// Definition handed to the model
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.identity().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema().clone(),
            read_only: self.is_read_only(),
        }
    }

    /// Run the tool
    async fn invoke(
        &self,
        input: Value,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput, InvocationError>;
}

type BuiltinFn = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<ToolOutput, String>> + Send + Sync>;

/// In-process tool backed by an async function
pub struct BuiltinTool {
    name: String,
    description: String,
    input_schema: Value,
    read_only: bool,
    handler: BuiltinFn,
}

impl BuiltinTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolOutput, String>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            read_only: false,
            handler: Arc::new(move |input| -> BoxFuture<'static, Result<ToolOutput, String>> {
                Box::pin(handler(input))
            }),
        }
    }

    /// Mark the tool side-effect free
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

#[async_trait]
impl ToolHandler for BuiltinTool {
    fn identity(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Builtin
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    async fn invoke(
        &self,
        input: Value,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput, InvocationError> {
        if cancel.is_cancelled() {
            return Err(InvocationError::Cancelled { attempts: 0 });
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(InvocationError::Cancelled { attempts: 1 }),
            result = (self.handler)(input) => result.map_err(InvocationError::ToolError),
        }
    }
}

/// Runs a sub-agent on a prompt
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run(&self, prompt: &str, cancel: &CancellationToken) -> Result<String, String>;
}

/// Prefix of agent tool identities
pub const AGENT_PREFIX: &str = "agent__";

/// A sub-agent exposed as a tool taking a single `prompt`
pub struct AgentTool {
    identity: String,
    description: String,
    input_schema: Value,
    runner: Arc<dyn AgentRunner>,
}

impl AgentTool {
    pub fn new(
        agent_id: &str,
        description: impl Into<String>,
        runner: Arc<dyn AgentRunner>,
    ) -> Self {
        Self {
            identity: format!("{AGENT_PREFIX}{agent_id}"),
            description: description.into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "prompt": {
                        "type": "string",
                        "description": "Task or question for the agent"
                    }
                },
                "required": ["prompt"]
            }),
            runner,
        }
    }
}

#[async_trait]
impl ToolHandler for AgentTool {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Agent
    }

    async fn invoke(
        &self,
        input: Value,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput, InvocationError> {
        if cancel.is_cancelled() {
            return Err(InvocationError::Cancelled { attempts: 0 });
        }

        let prompt = input
            .get("prompt")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                InvocationError::ToolError("missing required string parameter 'prompt'".to_string())
            })?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(InvocationError::Cancelled { attempts: 1 }),
            result = self.runner.run(prompt, cancel) => result
                .map(ToolOutput::text)
                .map_err(InvocationError::ToolError),
        }
    }
}
