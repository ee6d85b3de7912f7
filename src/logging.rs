//! Logging
//!
//! Two halves:
//! - [`LogSink`], the small capability the command machinery logs through.
//!   Components receive it as an `Arc<dyn LogSink>` at construction time.
//! - [`init_tracing`], which installs the process-wide `tracing` subscriber.
//!   Only the binary calls it.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Default handle reported with every sink message
pub const DEFAULT_LOG_HANDLE: &str = "cmdguard";

/// Destination for command progress and outcome messages
pub trait LogSink: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

/// Forwards sink messages to `tracing`
#[derive(Debug, Clone)]
pub struct TracingSink {
    handle: String,
}

impl TracingSink {
    /// Create a sink whose events carry `handle` as a field
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
        }
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }
}

impl Default for TracingSink {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_HANDLE)
    }
}

impl LogSink for TracingSink {
    fn info(&self, message: &str) {
        tracing::info!(handle = %self.handle, "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(handle = %self.handle, "{}", message);
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl LogSink for NoopSink {
    fn info(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}

/// Severity of a captured sink message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkLevel {
    Info,
    Error,
}

/// One message captured by [`MemorySink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkRecord {
    pub level: SinkLevel,
    pub message: String,
}

/// Keeps every message in memory, in order
///
/// Useful for embedding callers that want to show the log themselves, and in
/// tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<SinkRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, level: SinkLevel, message: &str) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SinkRecord {
                level,
                message: message.to_string(),
            });
    }

    /// Snapshot of everything logged so far
    pub fn records(&self) -> Vec<SinkRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Messages logged at `level`
    pub fn messages(&self, level: SinkLevel) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|r| r.level == level)
            .map(|r| r.message)
            .collect()
    }

    /// Whether any message at `level` contains `needle`
    pub fn contains(&self, level: SinkLevel, needle: &str) -> bool {
        self.messages(level).iter().any(|m| m.contains(needle))
    }
}

impl LogSink for MemorySink {
    fn info(&self, message: &str) {
        self.push(SinkLevel::Info, message);
    }

    fn error(&self, message: &str) {
        self.push(SinkLevel::Error, message);
    }
}

/// Shared default sink
pub fn default_sink() -> Arc<dyn LogSink> {
    Arc::new(TracingSink::default())
}

/// Severity names accepted in config files and on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Corresponding `tracing` level (`Critical` has none of its own)
    pub fn as_tracing_level(self) -> Level {
        match self {
            Self::Debug => Level::DEBUG,
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warning" | "warn" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "critical" => Ok(Self::Critical),
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: debug, info, warning, error, critical",
                s
            ),
        }
    }
}

/// Output format for the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                s
            ),
        }
    }
}

/// Build the env filter used by [`init_tracing`]
///
/// `RUST_LOG` wins when set; otherwise `level` (or DEBUG when verbose).
pub fn env_filter(level: LogLevel, verbose: bool) -> EnvFilter {
    let level = if verbose {
        Level::DEBUG
    } else {
        level.as_tracing_level()
    };
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

/// Install the global tracing subscriber
///
/// Logs go to stderr so that command output relayed on stdout stays clean.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(level: LogLevel, format: LogFormat, verbose: bool) -> anyhow::Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter(level, verbose));

    let result = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("INFO".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("warn".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("Warning".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("critical".parse::<LogLevel>().unwrap(), LogLevel::Critical);
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_log_level_to_tracing() {
        assert_eq!(LogLevel::Debug.as_tracing_level(), Level::DEBUG);
        assert_eq!(LogLevel::Info.as_tracing_level(), Level::INFO);
        assert_eq!(LogLevel::Warning.as_tracing_level(), Level::WARN);
        assert_eq!(LogLevel::Error.as_tracing_level(), Level::ERROR);
        assert_eq!(LogLevel::Critical.as_tracing_level(), Level::ERROR);
    }

    #[test]
    fn test_log_levels_are_ordered() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Error < LogLevel::Critical);
    }

    #[test]
    fn test_log_level_display_round_trips() {
        for level in [
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warning,
            LogLevel::Error,
            LogLevel::Critical,
        ] {
            assert_eq!(level.to_string().parse::<LogLevel>().unwrap(), level);
        }
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!(LogFormat::default(), LogFormat::Compact);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_tracing_sink_handle() {
        assert_eq!(TracingSink::default().handle(), "cmdguard");
        let sink = TracingSink::new("_custom_logger");
        assert_eq!(sink.handle(), "_custom_logger");
        // No subscriber installed: calls must still be harmless
        sink.info("hello");
        sink.error("bye");
    }

    #[test]
    fn test_memory_sink_keeps_order_and_level() {
        let sink = MemorySink::new();
        sink.info("Executing command: git status");
        sink.error("Command failed: git status");
        sink.info("All commands executed successfully");

        let records = sink.records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].level, SinkLevel::Error);
        assert_eq!(
            sink.messages(SinkLevel::Info),
            ["Executing command: git status", "All commands executed successfully"]
        );
        assert!(sink.contains(SinkLevel::Error, "failed"));
        assert!(!sink.contains(SinkLevel::Info, "failed"));
    }

    #[test]
    fn test_sink_is_object_safe() {
        let sinks: Vec<Arc<dyn LogSink>> = vec![default_sink(), Arc::new(NoopSink)];
        for sink in sinks {
            sink.info("message");
        }
    }

    #[test]
    fn test_subscriber_can_be_built_in_each_format() {
        // Mirrors init_tracing without touching the global default
        let _compact = tracing_subscriber::fmt()
            .with_env_filter(env_filter(LogLevel::Info, false))
            .compact()
            .with_test_writer()
            .finish();
        let _json = tracing_subscriber::fmt()
            .with_env_filter(env_filter(LogLevel::Debug, true))
            .json()
            .with_test_writer()
            .finish();
    }
}
