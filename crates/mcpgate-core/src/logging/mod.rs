//! Logging abstractions for runtime-agnostic logging

mod traits;
mod noop;
mod console;
mod memory;
mod file_logger;

pub use traits::{Logger, SharedLogger};
pub use noop::NoOpLogger;
pub use console::ConsoleLogger;
pub use memory::MemoryLogger;
pub use file_logger::{FileLogger, LogLevel};
