//! Structured logging
//!
//! Entries carry a level, the emitting component, an optional operation id
//! and sorted key/value fields. Everything is written to stderr so stdout
//! carries only the test result.
//!
//! A run shares one scope between all loggers derived from the same
//! root, so worker tasks log with the run's session id and the id of the
//! phase currently executing.

use crate::error::{AppError, Result};
use crate::models::{Config, LatencyStat, TransferRunResult};
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Severity of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Per-request transfer and probe noise
    Trace,
    Debug,
    /// Phase progress
    Info,
    /// Degraded but continuing, e.g. nearest-server fallback
    Warn,
    /// A phase failed
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    fn painted(&self) -> String {
        let label = format!("{:>5}", self.as_str());
        match self {
            LogLevel::Trace => label.as_str().dimmed().to_string(),
            LogLevel::Debug => label.as_str().cyan().to_string(),
            LogLevel::Info => label.as_str().green().to_string(),
            LogLevel::Warn => label.as_str().yellow().to_string(),
            LogLevel::Error => label.as_str().red().bold().to_string(),
        }
    }

    /// Default threshold for the verbosity flags of a run
    pub fn for_flags(verbose: bool, debug: bool) -> Self {
        if debug {
            LogLevel::Debug
        } else if verbose {
            LogLevel::Info
        } else {
            LogLevel::Warn
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(AppError::parse(format!("Invalid log level: {}", s))),
        }
    }
}

/// One structured log record
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    /// Component that emitted the entry, e.g. `RANKER`
    pub component: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    /// Id of the operation (phase) the entry belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, serde_json::Value>,
    /// `file:line` of the call site, set by the `log_*!` macros
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl LogEntry {
    /// Single human-readable line
    pub fn to_text(&self, use_color: bool) -> String {
        let level = if use_color {
            self.level.painted()
        } else {
            format!("{:>5}", self.level.as_str())
        };

        let mut line = format!(
            "{} {} [{}] {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            level,
            self.component,
            self.message
        );

        if let Some(operation) = &self.operation {
            line.push_str(&format!(" ({})", operation.get(..8).unwrap_or(operation)));
        }

        if !self.fields.is_empty() {
            let fields: Vec<String> = self.fields.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            line.push(' ');
            line.push_str(&fields.join(" "));
        }

        if let Some(location) = &self.location {
            line.push_str(&format!(" @{}", location));
        }

        line
    }

    /// Single JSON object line
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            serde_json::json!({ "message": self.message, "serialize_error": e.to_string() }).to_string()
        })
    }
}

/// How entries are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    /// One JSON object per line, used with `--debug`
    Json,
}

/// State shared by every logger of one run
#[derive(Debug, Default)]
struct RunScope {
    session: Option<String>,
    operation: Option<String>,
}

/// Component logger.
///
/// Cheap to clone; clones and [`Logger::named`] children share the run scope.
#[derive(Debug, Clone)]
pub struct Logger {
    component: String,
    /// `None` silences the logger entirely
    threshold: Option<LogLevel>,
    format: LogFormat,
    use_color: bool,
    scope: Arc<RwLock<RunScope>>,
}

impl Logger {
    pub fn new(component: &str, threshold: LogLevel) -> Self {
        Self {
            component: component.to_string(),
            threshold: Some(threshold),
            format: LogFormat::Text,
            use_color: false,
            scope: Arc::new(RwLock::new(RunScope::default())),
        }
    }

    /// Logger that never writes; used by tests and library callers
    pub fn quiet(component: &str) -> Self {
        Self {
            threshold: None,
            ..Self::new(component, LogLevel::Error)
        }
    }

    /// Threshold and format derived from the run configuration.
    ///
    /// An explicit `log_level` wins over the verbose/debug mapping.
    pub fn with_config(component: &str, config: &Config) -> Self {
        let threshold = config
            .log_level
            .as_deref()
            .and_then(|level| level.parse().ok())
            .unwrap_or_else(|| LogLevel::for_flags(config.verbose, config.debug));

        Self {
            format: if config.debug { LogFormat::Json } else { LogFormat::Text },
            use_color: config.enable_color,
            ..Self::new(component, threshold)
        }
    }

    /// Child logger for another component in the same run
    pub fn named(&self, component: &str) -> Self {
        Self {
            component: component.to_string(),
            ..self.clone()
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn threshold(&self) -> Option<LogLevel> {
        self.threshold
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        self.threshold.is_some_and(|threshold| level >= threshold)
    }

    pub async fn set_session(&self, session: &str) {
        self.scope.write().await.session = Some(session.to_string());
    }

    /// Mark the start of a run phase; entries logged until the matching
    /// [`Logger::end_operation`] carry the returned id.
    pub async fn start_operation(&self, name: &str) -> String {
        let id = Uuid::new_v4().to_string();
        self.scope.write().await.operation = Some(id.clone());

        self.debug(&format!("{} started", name))
            .field("operation", name)
            .log()
            .await;

        id
    }

    pub async fn end_operation(&self, id: &str, name: &str, success: bool) {
        let level = if success { LogLevel::Debug } else { LogLevel::Error };
        self.entry(level, &format!("{} {}", name, if success { "finished" } else { "failed" }))
            .field("operation", name)
            .field("success", success)
            .log()
            .await;

        let mut scope = self.scope.write().await;
        if scope.operation.as_deref() == Some(id) {
            scope.operation = None;
        }
    }

    pub fn entry(&self, level: LogLevel, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder {
            logger: self,
            level,
            message: message.to_string(),
            fields: BTreeMap::new(),
            location: None,
        }
    }

    pub fn trace(&self, message: &str) -> LogEntryBuilder<'_> {
        self.entry(LogLevel::Trace, message)
    }

    pub fn debug(&self, message: &str) -> LogEntryBuilder<'_> {
        self.entry(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> LogEntryBuilder<'_> {
        self.entry(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> LogEntryBuilder<'_> {
        self.entry(LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> LogEntryBuilder<'_> {
        self.entry(LogLevel::Error, message)
    }

    fn render(&self, entry: &LogEntry) -> String {
        match self.format {
            LogFormat::Text => entry.to_text(self.use_color),
            LogFormat::Json => entry.to_json(),
        }
    }

    async fn emit(
        &self,
        level: LogLevel,
        message: String,
        fields: BTreeMap<String, serde_json::Value>,
        location: Option<String>,
    ) {
        let entry = {
            let scope = self.scope.read().await;
            LogEntry {
                timestamp: Utc::now(),
                level,
                component: self.component.clone(),
                message,
                session: scope.session.clone(),
                operation: scope.operation.clone(),
                fields,
                location,
            }
        };

        let _ = writeln!(io::stderr(), "{}", self.render(&entry));
    }
}

/// Collects fields for one entry; nothing is written until [`LogEntryBuilder::log`]
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    level: LogLevel,
    message: String,
    fields: BTreeMap<String, serde_json::Value>,
    location: Option<String>,
}

impl LogEntryBuilder<'_> {
    /// Record the call site; only shown when the logger runs at Debug or below
    pub fn location(mut self, file: &str, line: u32) -> Self {
        if self.logger.enabled(LogLevel::Debug) {
            self.location = Some(format!("{}:{}", file, line));
        }
        self
    }

    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(value) = serde_json::to_value(value) {
            self.fields.insert(key.to_string(), value);
        }
        self
    }

    pub fn latency(self, stat: &LatencyStat) -> Self {
        self.field("latency_ms", stat.average_ms)
            .field("jitter_ms", stat.jitter_ms)
            .field("samples", stat.sample_count)
    }

    pub fn transfer(self, result: &TransferRunResult) -> Self {
        self.field("bandwidth_bps", result.bandwidth_bytes_per_sec)
            .field("average_bps", result.average_bytes_per_sec())
            .field("bytes", result.total_bytes)
            .field("elapsed_ms", result.elapsed_ms())
    }

    pub fn error_info(self, error: &AppError) -> Self {
        let builder = self
            .field("error_category", error.category())
            .field("exit_code", error.exit_code());
        match error.phase() {
            Some(phase) => builder.field("phase", phase.label()),
            None => builder,
        }
    }

    pub async fn log(self) {
        if self.logger.enabled(self.level) {
            self.logger.emit(self.level, self.message, self.fields, self.location).await;
        }
    }
}

/// Creates component loggers that share one session id per run
pub struct LoggerFactory {
    config: Config,
    session_id: String,
    scope: Arc<RwLock<RunScope>>,
}

impl LoggerFactory {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            session_id: Uuid::new_v4().to_string(),
            scope: Arc::new(RwLock::new(RunScope::default())),
        }
    }

    pub async fn create_logger(&self, component: &str) -> Logger {
        let logger = Logger {
            scope: self.scope.clone(),
            ..Logger::with_config(component, &self.config)
        };
        logger.set_session(&self.session_id).await;
        logger
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

/// `log_info!(logger, "fmt", args..)`: log a formatted message with its call site
#[macro_export]
macro_rules! log_trace {
    ($logger:expr, $($arg:tt)*) => {
        $logger.trace(&format!($($arg)*)).location(file!(), line!()).log().await
    };
}

#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.debug(&format!($($arg)*)).location(file!(), line!()).log().await
    };
}

#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)*) => {
        $logger.info(&format!($($arg)*)).location(file!(), line!()).log().await
    };
}

#[macro_export]
macro_rules! log_warn {
    ($logger:expr, $($arg:tt)*) => {
        $logger.warn(&format!($($arg)*)).location(file!(), line!()).log().await
    };
}

#[macro_export]
macro_rules! log_error {
    ($logger:expr, $($arg:tt)*) => {
        $logger.error(&format!($($arg)*)).location(file!(), line!()).log().await
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Phase;
    use std::time::Duration;

    fn sample_entry() -> LogEntry {
        let mut fields = BTreeMap::new();
        fields.insert("workers".to_string(), serde_json::json!(4));
        fields.insert("server".to_string(), serde_json::json!("4242"));
        LogEntry {
            timestamp: Utc::now(),
            level: LogLevel::Info,
            component: "RANKER".to_string(),
            message: "Selected server".to_string(),
            session: Some("session-1".to_string()),
            operation: Some("abc".to_string()),
            fields,
            location: None,
        }
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!(" trace ".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert!("loud".parse::<LogLevel>().is_err());
        assert!(LogLevel::Trace < LogLevel::Error);
    }

    #[test]
    fn test_threshold_from_config() {
        let debug = Logger::with_config("T", &Config { debug: true, verbose: true, ..Default::default() });
        assert_eq!(debug.threshold(), Some(LogLevel::Debug));
        assert_eq!(debug.format, LogFormat::Json);

        let default = Logger::with_config("T", &Config::default());
        assert_eq!(default.threshold(), Some(LogLevel::Warn));
        assert!(!default.enabled(LogLevel::Info));
        assert!(default.enabled(LogLevel::Error));

        let explicit = Logger::with_config(
            "T",
            &Config { verbose: true, log_level: Some("error".to_string()), ..Default::default() },
        );
        assert_eq!(explicit.threshold(), Some(LogLevel::Error));
    }

    #[test]
    fn test_quiet_logger_is_disabled() {
        let logger = Logger::quiet("T");
        assert!(!logger.enabled(LogLevel::Error));
        assert_eq!(logger.threshold(), None);
    }

    #[test]
    fn test_text_line_has_sorted_fields_and_short_operation() {
        let line = sample_entry().to_text(false);
        assert!(line.contains(" INFO [RANKER] Selected server (abc)"));
        assert!(line.ends_with("server=\"4242\" workers=4"));
    }

    #[test]
    fn test_location_is_rendered_when_present() {
        let entry = LogEntry {
            location: Some("src/server/ranker.rs:42".to_string()),
            ..sample_entry()
        };
        assert!(entry.to_text(false).ends_with(" @src/server/ranker.rs:42"));

        let value: serde_json::Value = serde_json::from_str(&entry.to_json()).unwrap();
        assert_eq!(value["location"], "src/server/ranker.rs:42");

        let bare: serde_json::Value = serde_json::from_str(&sample_entry().to_json()).unwrap();
        assert!(bare.get("location").is_none());
    }

    #[test]
    fn test_builder_location_only_at_debug() {
        let debug = Logger::new("T", LogLevel::Debug);
        let builder = debug.info("x").location("src/lib.rs", 7);
        assert_eq!(builder.location.as_deref(), Some("src/lib.rs:7"));

        let warn = Logger::new("T", LogLevel::Warn);
        assert!(warn.warn("x").location("src/lib.rs", 7).location.is_none());
    }

    #[tokio::test]
    async fn test_macros_expand_in_async_code() {
        let logger = Logger::quiet("T");
        let servers = 3;
        crate::log_trace!(logger, "trace {}", servers);
        crate::log_debug!(logger, "debug {}", servers);
        crate::log_info!(logger, "info");
        crate::log_warn!(logger, "warn {} {}", servers, "x");
        crate::log_error!(logger, "error");
    }

    #[test]
    fn test_json_line() {
        let value: serde_json::Value = serde_json::from_str(&sample_entry().to_json()).unwrap();
        assert_eq!(value["level"], "info");
        assert_eq!(value["component"], "RANKER");
        assert_eq!(value["fields"]["workers"], 4);
        assert_eq!(value["session"], "session-1");
    }

    #[tokio::test]
    async fn test_named_children_share_scope() {
        let root = Logger::quiet("ROOT");
        root.set_session("run-1").await;

        let child = root.named("DOWNLOAD");
        assert_eq!(child.component(), "DOWNLOAD");
        assert_eq!(child.scope.read().await.session.as_deref(), Some("run-1"));
    }

    #[tokio::test]
    async fn test_operation_scope() {
        let logger = Logger::quiet("ORCH");
        let id = logger.start_operation("download").await;
        assert_eq!(logger.named("W").scope.read().await.operation.as_deref(), Some(id.as_str()));

        // A stale id does not clear a newer operation
        logger.end_operation("other", "upload", true).await;
        assert!(logger.scope.read().await.operation.is_some());

        logger.end_operation(&id, "download", false).await;
        assert!(logger.scope.read().await.operation.is_none());
    }

    #[tokio::test]
    async fn test_builder_accepts_domain_fields() {
        let logger = Logger::quiet("T");
        let stat = LatencyStat { average_ms: 12.5, jitter_ms: 1.0, sample_count: 5 };
        let result = TransferRunResult {
            bandwidth_bytes_per_sec: 1000,
            total_bytes: 10_000,
            elapsed: Duration::from_secs(10),
        };

        logger.info("measurement")
            .latency(&stat)
            .transfer(&result)
            .error_info(&AppError::network("x").in_phase(Phase::MeasuringUpload))
            .log()
            .await;
    }

    #[tokio::test]
    async fn test_factory_loggers_share_session() {
        let factory = LoggerFactory::new(Config::default());
        let a = factory.create_logger("ORCH").await;
        let b = factory.create_logger("CLI").await;

        assert_eq!(a.scope.read().await.session.as_deref(), Some(factory.session_id()));
        assert!(Arc::ptr_eq(&a.scope, &b.scope));
    }
}
