//! File-based logger
//!
//! Useful when the gateway is embedded in a host whose stderr isn't visible
//! (editor extension hosts, stdio-driven agents).

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use parking_lot::Mutex;

use super::traits::Logger;

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    /// Parse a level name; unknown names fall back to `Debug`
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Debug,
        }
    }

    /// Level from `MCPGATE_LOG_LEVEL`, defaulting to `Info`
    pub fn from_env() -> Self {
        std::env::var("MCPGATE_LOG_LEVEL")
            .map(|v| Self::parse(&v))
            .unwrap_or(LogLevel::Info)
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO "),
            LogLevel::Warn => write!(f, "WARN "),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Logger that appends timestamped lines to a file
pub struct FileLogger {
    path: PathBuf,
    min_level: LogLevel,
    file: Mutex<File>,
}

impl FileLogger {
    /// Open (or create) the log file at `path` in append mode
    pub fn open(path: impl Into<PathBuf>, min_level: LogLevel) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            min_level,
            file: Mutex::new(file),
        })
    }

    /// Default log location (`<tmp>/mcpgate.log`), level from the environment
    pub fn default_location() -> io::Result<Self> {
        Self::open(Self::default_log_path(), LogLevel::from_env())
    }

    /// Default log file path
    pub fn default_log_path() -> PathBuf {
        std::env::temp_dir().join("mcpgate.log")
    }

    /// Path this logger writes to
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, level: LogLevel, message: &str) {
        if level < self.min_level {
            return;
        }

        let timestamp = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| {
                let secs = d.as_secs();
                let millis = d.subsec_millis();
                let hours = (secs % 86400) / 3600;
                let mins = (secs % 3600) / 60;
                let secs = secs % 60;
                format!("{:02}:{:02}:{:02}.{:03}", hours, mins, secs, millis)
            })
            .unwrap_or_else(|_| "??:??:??.???".to_string());

        let mut file = self.file.lock();
        // A failing log write must never take a tool call down with it.
        let _ = writeln!(file, "[{}] [{}] {}", timestamp, level, message);
        let _ = file.flush();
    }
}

impl Logger for FileLogger {
    fn debug(&self, message: &str) {
        self.write(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.write(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.write(LogLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.write(LogLevel::Error, message);
    }
}

impl std::fmt::Debug for FileLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileLogger")
            .field("path", &self.path)
            .field("min_level", &self.min_level)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_log_levels() {
        assert!(LogLevel::Info > LogLevel::Debug);
        assert!(LogLevel::Warn > LogLevel::Info);
        assert!(LogLevel::Error > LogLevel::Warn);
        assert_eq!(LogLevel::parse("WARNING"), LogLevel::Warn);
        assert_eq!(LogLevel::parse("nonsense"), LogLevel::Debug);
    }

    #[test]
    fn test_file_logger_respects_level() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("gate.log");
        let logger = FileLogger::open(&path, LogLevel::Info).unwrap();

        logger.debug("hidden");
        logger.info("shown");
        logger.error("also shown");

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("hidden"));
        assert!(content.contains("[INFO ] shown"));
        assert!(content.contains("[ERROR] also shown"));
    }
}
