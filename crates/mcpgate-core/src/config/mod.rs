//! Server configuration
//!
//! Supports multiple configuration sources:
//! - `MemoryConfigStore`: In-memory for testing
//! - `FileConfigStore`: YAML file-based (user/workspace level)

mod traits;
mod server;
mod memory;
mod file;

pub use traits::{ServerConfigStore, ConfigError, ConfigResult};
pub use server::{
    ServerDescriptor, TransportConfig, GatewaySettings, GatewayConfig,
    validate_server_name, expand_env_vars, IDENTITY_DELIMITER,
};
pub use memory::MemoryConfigStore;
pub use file::{FileConfigStore, ConfigLevel};
