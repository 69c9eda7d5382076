//! Logging Abstractions
//!
//! Structured log entries and the sink trait used to mirror engine logs into a
//! host logging pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Structured log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// Target module/component
    pub target: String,
    /// Log message
    pub message: String,
    /// Structured fields
    pub fields: HashMap<String, String>,
    /// Span/trace ID for distributed tracing
    pub span_id: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            target: target.into(),
            message: message.into(),
            fields: HashMap::new(),
            span_id: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_span_id(mut self, span_id: impl Into<String>) -> Self {
        self.span_id = Some(span_id.into());
        self
    }
}

/// Logger sink trait
///
/// Forwards structured logs from the core to host logging pipelines:
/// the launcher's log window, a rotating file, or the system journal.
///
/// Entries carry the resource id, ticket and folder name as fields; hosts that
/// must not record user paths should enable path redaction in the logging
/// configuration rather than filtering here.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::logging::{LoggerSink, LogEntry, LogLevel};
///
/// async fn log_error(logger: &dyn LoggerSink, error: &str) {
///     let entry = LogEntry::new(LogLevel::Error, "core", error)
///         .with_field("folder", "mods");
///     logger.log(entry).await.ok();
/// }
/// ```
#[async_trait::async_trait]
pub trait LoggerSink: Send + Sync {
    /// Forward a log entry to the host logging system
    async fn log(&self, entry: LogEntry) -> Result<()>;

    /// Flush any buffered logs
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Get the minimum log level that will be processed
    ///
    /// Logs below this level can be filtered out at the source for performance.
    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

/// Console logger implementation for testing/development
#[derive(Debug, Clone)]
pub struct ConsoleLogger {
    pub min_level: LogLevel,
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
        }
    }
}

#[async_trait::async_trait]
impl LoggerSink for ConsoleLogger {
    async fn log(&self, entry: LogEntry) -> Result<()> {
        if entry.level >= self.min_level {
            let level_str = match entry.level {
                LogLevel::Trace => "TRACE",
                LogLevel::Debug => "DEBUG",
                LogLevel::Info => "INFO",
                LogLevel::Warn => "WARN",
                LogLevel::Error => "ERROR",
            };

            println!(
                "[{}] {} {}: {}",
                entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
                level_str,
                entry.target,
                entry.message
            );

            if !entry.fields.is_empty() {
                println!("  Fields: {:?}", entry.fields);
            }
        }
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_entry_builder() {
        let entry = LogEntry::new(LogLevel::Info, "core_sync::model", "Update finished")
            .with_field("folder", "mods")
            .with_span_id("update");

        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.target, "core_sync::model");
        assert_eq!(entry.message, "Update finished");
        assert_eq!(entry.fields.get("folder"), Some(&"mods".to_string()));
        assert_eq!(entry.span_id, Some("update".to_string()));
    }

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Warn < LogLevel::Error);
    }

    #[tokio::test]
    async fn test_console_logger() {
        let logger = ConsoleLogger {
            min_level: LogLevel::Warn,
        };
        let entry = LogEntry::new(LogLevel::Info, "test", "filtered out");

        assert_eq!(logger.min_level(), LogLevel::Warn);
        logger.log(entry).await.unwrap();
    }
}
