//! In-memory logger

use parking_lot::Mutex;

use super::file_logger::LogLevel;
use super::traits::Logger;

/// Logger that keeps every entry in memory
///
/// Handy in tests, and for hosts that want to show recent gateway events
/// next to server status.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    entries: Mutex<Vec<(LogLevel, String)>>,
}

impl MemoryLogger {
    /// Create an empty memory logger
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all captured entries
    pub fn entries(&self) -> Vec<(LogLevel, String)> {
        self.entries.lock().clone()
    }

    /// Whether any entry at `level` contains `needle`
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|(l, m)| *l == level && m.contains(needle))
    }

    /// Drop all captured entries
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    fn push(&self, level: LogLevel, message: &str) {
        self.entries.lock().push((level, message.to_string()));
    }
}

impl Logger for MemoryLogger {
    fn debug(&self, message: &str) {
        self.push(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.push(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.push(LogLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.push(LogLevel::Error, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_logger_captures() {
        let logger = MemoryLogger::new();
        logger.info("connected to alpha");
        logger.warn("discovery timed out for beta");

        assert_eq!(logger.entries().len(), 2);
        assert!(logger.contains(LogLevel::Warn, "beta"));
        assert!(!logger.contains(LogLevel::Info, "beta"));

        logger.clear();
        assert!(logger.entries().is_empty());
    }
}
