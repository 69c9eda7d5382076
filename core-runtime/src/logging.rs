//! # Logging & Tracing Infrastructure
//!
//! Provides structured logging with the `tracing` crate, supporting:
//! - JSON, pretty and compact output formats
//! - Module-level filtering through `EnvFilter`
//! - Path redaction for hosts that must not record user directories
//! - Integration with host logging via `LoggerSink`
//!
//! ## Overview
//!
//! This module configures the `tracing-subscriber` registry and mirrors every
//! event that survives filtering into an optional [`LoggerSink`]. Engine code
//! logs resource paths through [`display_path`], which honours the
//! `redact_paths` setting installed by [`init_logging`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use bridge_traits::logging::{ConsoleLogger, LogLevel};
//! use std::sync::Arc;
//!
//! let config = LoggingConfig::default()
//!     .with_format(LogFormat::Compact)
//!     .with_level(LogLevel::Debug)
//!     .with_logger_sink(Arc::new(ConsoleLogger::default()));
//!
//! init_logging(config)?;
//! tracing::info!(folder = "mods", "Engine started");
//! ```

use crate::error::{Error, Result};

use bridge_traits::logging::{LogEntry, LogLevel, LoggerSink};

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::{
    filter::EnvFilter,
    fmt::format::FmtSpan,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
    Layer,
};

/// Crates whose level follows [`LoggingConfig::level`] in the default filter.
const WORKSPACE_TARGETS: &[&str] = &[
    "core_async",
    "core_runtime",
    "core_metadata",
    "core_sync",
    "bridge_desktop",
];

static REDACT_PATHS: AtomicBool = AtomicBool::new(false);

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable pretty format with colors
    Pretty,
    /// Structured JSON format for machine parsing
    Json,
    /// Compact single-line format
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        #[cfg(debug_assertions)]
        return Self::Pretty;

        #[cfg(not(debug_assertions))]
        return Self::Compact;
    }
}

/// Logging configuration
#[derive(Clone)]
pub struct LoggingConfig {
    /// Output format
    pub format: LogFormat,
    /// Minimum log level
    pub level: LogLevel,
    /// Log file names instead of full paths
    pub redact_paths: bool,
    /// Custom filter string (e.g., "core_sync=trace,notify=warn")
    pub filter: Option<String>,
    /// Optional logger sink for forwarding logs to host
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Emit span enter/exit events
    pub enable_spans: bool,
    /// Display target module in logs
    pub display_target: bool,
    /// Display thread info
    pub display_thread_info: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            redact_paths: false,
            filter: None,
            logger_sink: None,
            enable_spans: false,
            display_target: true,
            // Scans and parses hop between pool threads
            display_thread_info: true,
        }
    }
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("format", &self.format)
            .field("level", &self.level)
            .field("redact_paths", &self.redact_paths)
            .field("filter", &self.filter)
            .field("has_logger_sink", &self.logger_sink.is_some())
            .field("enable_spans", &self.enable_spans)
            .finish()
    }
}

impl LoggingConfig {
    /// Set log format
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set minimum log level
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Log file names only
    pub fn with_path_redaction(mut self, redact: bool) -> Self {
        self.redact_paths = redact;
        self
    }

    /// Set custom filter string
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Set logger sink for host integration
    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    /// Enable or disable span events
    pub fn with_spans(mut self, enable: bool) -> Self {
        self.enable_spans = enable;
        self
    }

    /// Enable or disable target display
    pub fn with_target(mut self, display: bool) -> Self {
        self.display_target = display;
        self
    }

    /// Enable or disable thread info
    pub fn with_thread_info(mut self, display: bool) -> Self {
        self.display_thread_info = display;
        self
    }
}

/// Initialize the logging system
///
/// Call once during startup. Subsequent calls return [`Error::Logging`].
///
/// # Errors
///
/// Returns an error if:
/// - Logging is already initialized
/// - The filter string is invalid
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;

    let sink_layer = LoggerSinkLayer::new(config.logger_sink.clone());
    let span_events = if config.enable_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let registry = tracing_subscriber::registry().with(filter).with(sink_layer);

    let result = match config.format {
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(config.display_target)
                    .with_thread_ids(config.display_thread_info)
                    .with_thread_names(config.display_thread_info)
                    .with_span_events(span_events)
                    .with_writer(io::stdout),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(config.enable_spans)
                    .with_span_list(config.enable_spans)
                    .with_target(config.display_target)
                    .with_thread_ids(config.display_thread_info)
                    .with_thread_names(config.display_thread_info)
                    .with_writer(io::stdout),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(config.display_target)
                    .with_thread_ids(config.display_thread_info)
                    .with_thread_names(config.display_thread_info)
                    .with_span_events(span_events)
                    .with_writer(io::stdout),
            )
            .try_init(),
    };

    result.map_err(|e| Error::Logging(e.to_string()))?;
    REDACT_PATHS.store(config.redact_paths, Ordering::SeqCst);
    Ok(())
}

fn level_directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let filter_string = match &config.filter {
        Some(custom_filter) => custom_filter.clone(),
        None => {
            // Our crates at the configured level, noisy dependencies at warn
            let level = level_directive(config.level);
            let mut directives: Vec<String> = WORKSPACE_TARGETS
                .iter()
                .map(|target| format!("{}={}", target, level))
                .collect();
            directives.push("notify=warn".to_string());
            directives.push("zip=warn".to_string());
            directives.join(",")
        }
    };

    EnvFilter::try_new(filter_string)
        .map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))
}

/// Layer that forwards events to a `LoggerSink` implementation.
struct LoggerSinkLayer {
    sink: Option<Arc<dyn LoggerSink>>,
}

impl LoggerSinkLayer {
    fn new(sink: Option<Arc<dyn LoggerSink>>) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for LoggerSinkLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(sink) = self.sink.as_ref() else {
            return;
        };

        let metadata = event.metadata();
        let level = tracing_level_to_log_level(*metadata.level());

        if level < sink.min_level() {
            return;
        }

        let mut visitor = SinkVisitor::default();
        event.record(&mut visitor);

        let message = visitor
            .message
            .unwrap_or_else(|| metadata.name().to_string());

        let mut entry = LogEntry::new(level, metadata.target(), message);
        for (key, value) in visitor.fields {
            entry = entry.with_field(key, value);
        }

        if let Some(span) = ctx.lookup_current() {
            entry.span_id = Some(span.name().to_string());
        }

        let sink = Arc::clone(sink);

        // Inside the runtime the sink runs as a task; outside it, inline.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(err) = sink.log(entry).await {
                    eprintln!("LoggerSink error: {}", err);
                }
            });
            return;
        }

        match tokio::runtime::Builder::new_current_thread().build() {
            Ok(runtime) => {
                if let Err(err) = runtime.block_on(sink.log(entry)) {
                    eprintln!("LoggerSink error: {}", err);
                }
            }
            Err(err) => eprintln!("LoggerSink runtime unavailable: {}", err),
        }
    }
}

#[derive(Default)]
struct SinkVisitor {
    message: Option<String>,
    fields: HashMap<String, String>,
}

impl SinkVisitor {
    fn record_value(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = Some(value);
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for SinkVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_value(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_value(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record_value(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record_value(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.record_value(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_value(field, format!("{:?}", value));
    }
}

fn tracing_level_to_log_level(level: tracing::Level) -> LogLevel {
    match level {
        tracing::Level::TRACE => LogLevel::Trace,
        tracing::Level::DEBUG => LogLevel::Debug,
        tracing::Level::INFO => LogLevel::Info,
        tracing::Level::WARN => LogLevel::Warn,
        tracing::Level::ERROR => LogLevel::Error,
    }
}

/// Strip a path string to its final component.
///
/// ```ignore
/// use core_runtime::logging::strip_path;
///
/// assert_eq!(strip_path("/home/steve/.minecraft/mods/sodium.jar"), "sodium.jar");
/// ```
pub fn strip_path(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Render a path for logging.
///
/// Returns the full path, or only its file name when path redaction was
/// enabled by [`init_logging`].
pub fn display_path(path: &Path) -> String {
    let full = path.display().to_string();
    if REDACT_PATHS.load(Ordering::SeqCst) {
        strip_path(&full).to_string()
    } else {
        full
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as SinkResult;
    use std::sync::Mutex;

    #[test]
    fn test_logging_config_builder() {
        let config = LoggingConfig::default()
            .with_format(LogFormat::Json)
            .with_level(LogLevel::Debug)
            .with_path_redaction(true)
            .with_filter("core_sync=trace")
            .with_spans(true)
            .with_target(false)
            .with_thread_info(false);

        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, LogLevel::Debug);
        assert!(config.redact_paths);
        assert_eq!(config.filter, Some("core_sync=trace".to_string()));
        assert!(config.enable_spans);
        assert!(!config.display_target);
        assert!(!config.display_thread_info);
    }

    #[test]
    fn test_strip_path() {
        assert_eq!(strip_path("/home/steve/mods/sodium.jar"), "sodium.jar");
        assert_eq!(strip_path("C:\\Games\\mods\\sodium.jar"), "sodium.jar");
        assert_eq!(strip_path("sodium.jar"), "sodium.jar");
        assert_eq!(strip_path("/var/mods/"), "");
    }

    #[test]
    fn test_default_filter_lists_workspace_crates() {
        let config = LoggingConfig::default().with_level(LogLevel::Debug);
        let filter = build_filter(&config).unwrap().to_string();
        assert!(filter.contains("core_sync=debug"));
        assert!(filter.contains("core_metadata=debug"));
        assert!(filter.contains("notify=warn"));
    }

    #[test]
    fn test_build_custom_filter() {
        let config = LoggingConfig::default().with_filter("core_sync=trace,zip=error");
        let filter = build_filter(&config).unwrap();
        assert!(filter.to_string().contains("core_sync=trace"));
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let config = LoggingConfig::default().with_filter("core_sync=[[");
        assert!(matches!(build_filter(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_logger_sink_layer_forwards_event() {
        let sink = Arc::new(TestLoggerSink::default());
        let trait_sink: Arc<dyn LoggerSink> = sink.clone();
        let layer = LoggerSinkLayer::new(Some(trait_sink));
        let subscriber = tracing_subscriber::registry().with(layer);
        let _guard = tracing::subscriber::set_default(subscriber);

        tracing::warn!(target: "core_sync::model", resource_id = "broken.jar", "Parse failed");

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.target, "core_sync::model");
        assert_eq!(entry.message, "Parse failed");
        assert_eq!(entry.level, LogLevel::Warn);
        assert_eq!(
            entry.fields.get("resource_id"),
            Some(&"broken.jar".to_string())
        );
    }

    #[test]
    fn test_logger_sink_respects_min_level() {
        let sink = Arc::new(TestLoggerSink::default());
        let trait_sink: Arc<dyn LoggerSink> = sink.clone();
        let subscriber = tracing_subscriber::registry().with(LoggerSinkLayer::new(Some(trait_sink)));
        let _guard = tracing::subscriber::set_default(subscriber);

        tracing::debug!("below threshold");

        assert!(sink.entries.lock().unwrap().is_empty());
    }

    #[derive(Default)]
    struct TestLoggerSink {
        entries: Mutex<Vec<LogEntry>>,
    }

    #[async_trait]
    impl LoggerSink for TestLoggerSink {
        async fn log(&self, entry: LogEntry) -> SinkResult<()> {
            let mut entries = self.entries.lock().unwrap();
            entries.push(entry);
            Ok(())
        }

        fn min_level(&self) -> LogLevel {
            LogLevel::Info
        }
    }
}
