//! Gateway between an agent orchestrator and external MCP servers
//!
//! - `ConnectionSupervisor`: concurrent, deadline-bounded connects and the
//!   per-server connection state
//! - `discover_tools`: capability check plus tool listing under a deadline
//! - `InvocationExecutor`: retry with input degradation, backoff and
//!   cancellation
//! - `Gateway`: owns all of the above and publishes the tool registry

mod discovery;
mod error;
mod executor;
mod service;
mod status;
mod supervisor;

pub use discovery::{discover_tools, DiscoveryOutcome};
pub use error::{is_request_rejection, GatewayError, GatewayResult, InvocationError};
pub use executor::{degrade_input, truncation_marker, Invocation, InvocationExecutor, RetryPolicy};
pub use service::Gateway;
pub use status::{ProbeReport, ServerState, ServerStatus};
pub use supervisor::{ConnectOutcome, ConnectionState, ConnectionSupervisor};
