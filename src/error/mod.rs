//! Error taxonomy of a speed test run
//!
//! Phase failures reach the caller wrapped in [`AppError::Phase`]; probe and
//! worker failures never do, they only show up as fewer samples or lower
//! throughput.

use crate::types::Phase;
use colored::{Color, Colorize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Parsing error: {0}")]
    Parse(String),

    /// Connection-level failure talking to a collaborator
    #[error("Network error: {0}")]
    Network(String),

    /// The peer answered, but not with something usable
    #[error("HTTP request error: {0}")]
    HttpRequest(String),

    /// A per-request timeout or the overall run deadline
    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Location unavailable: {0}")]
    LocationUnavailable(String),

    /// Directory fetch failed, or it listed no servers
    #[error("Server directory unavailable: {0}")]
    DirectoryUnavailable(String),

    /// Explicit server id absent from the directory
    #[error("Server not found: {0}")]
    ServerNotFound(String),

    /// Zero of the requested latency probes succeeded
    #[error("No successful latency samples from {0}")]
    NoSuccessfulSamples(String),

    /// Stopped from outside (Ctrl-C or a cancelled token)
    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("{phase} phase failed: {source}")]
    Phase {
        phase: Phase,
        #[source]
        source: Box<AppError>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }

    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network(message.into())
    }

    pub fn http_request<S: Into<String>>(message: S) -> Self {
        Self::HttpRequest(message.into())
    }

    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout(message.into())
    }

    pub fn location_unavailable<S: Into<String>>(message: S) -> Self {
        Self::LocationUnavailable(message.into())
    }

    pub fn directory_unavailable<S: Into<String>>(message: S) -> Self {
        Self::DirectoryUnavailable(message.into())
    }

    pub fn server_not_found<S: Into<String>>(id: S) -> Self {
        Self::ServerNotFound(id.into())
    }

    pub fn no_successful_samples<S: Into<String>>(endpoint: S) -> Self {
        Self::NoSuccessfulSamples(endpoint.into())
    }

    pub fn cancelled<S: Into<String>>(message: S) -> Self {
        Self::Cancelled(message.into())
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Attach the phase that raised this error.
    ///
    /// The innermost phase wins: an already wrapped error is returned as is.
    pub fn in_phase(self, phase: Phase) -> Self {
        match self {
            wrapped @ Self::Phase { .. } => wrapped,
            other => Self::Phase {
                phase,
                source: Box::new(other),
            },
        }
    }

    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::Phase { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// The error beneath any phase wrapper
    pub fn root_cause(&self) -> &AppError {
        match self {
            Self::Phase { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Short tag used in console output and log fields
    pub fn category(&self) -> &'static str {
        match self.root_cause() {
            Self::Config(_) => "CONFIG",
            Self::Validation(_) => "VALIDATION",
            Self::Parse(_) => "PARSE",
            Self::Network(_) => "NETWORK",
            Self::HttpRequest(_) => "HTTP",
            Self::Timeout(_) => "TIMEOUT",
            Self::Io(_) => "IO",
            Self::LocationUnavailable(_) => "LOCATION",
            Self::DirectoryUnavailable(_) => "DIRECTORY",
            Self::ServerNotFound(_) => "SERVER",
            Self::NoSuccessfulSamples(_) => "LATENCY",
            Self::Cancelled(_) => "CANCELLED",
            Self::Phase { .. } | Self::Internal(_) => "INTERNAL",
        }
    }

    /// Transient failures that a second run may not hit
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::Network(_)
                | Self::HttpRequest(_)
                | Self::Timeout(_)
                | Self::LocationUnavailable(_)
                | Self::DirectoryUnavailable(_)
                | Self::NoSuccessfulSamples(_)
        )
    }

    /// Same variant with `context: ` prepended to its message
    fn prefixed(self, context: &str) -> Self {
        let join = |message: String| format!("{}: {}", context, message);
        match self {
            Self::Config(m) => Self::Config(join(m)),
            Self::Validation(m) => Self::Validation(join(m)),
            Self::Parse(m) => Self::Parse(join(m)),
            Self::Network(m) => Self::Network(join(m)),
            Self::HttpRequest(m) => Self::HttpRequest(join(m)),
            Self::Timeout(m) => Self::Timeout(join(m)),
            Self::Io(m) => Self::Io(join(m)),
            Self::LocationUnavailable(m) => Self::LocationUnavailable(join(m)),
            Self::DirectoryUnavailable(m) => Self::DirectoryUnavailable(join(m)),
            Self::Cancelled(m) => Self::Cancelled(join(m)),
            Self::Internal(m) => Self::Internal(join(m)),
            Self::Phase { phase, source } => Self::Phase {
                phase,
                source: Box::new(source.prefixed(context)),
            },
            // Ids and endpoints stay bare so callers can match on them
            other @ (Self::ServerNotFound(_) | Self::NoSuccessfulSamples(_)) => other,
        }
    }

    /// Process exit status for `nst`
    pub fn exit_code(&self) -> i32 {
        match self.root_cause() {
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => 1,
            Self::Network(_) | Self::HttpRequest(_) => 2,
            Self::Timeout(_) => 3,
            Self::LocationUnavailable(_) | Self::DirectoryUnavailable(_) => 4,
            Self::Io(_) => 5,
            Self::ServerNotFound(_) | Self::NoSuccessfulSamples(_) => 6,
            Self::Cancelled(_) => 130,
            Self::Phase { .. } | Self::Internal(_) => 99,
        }
    }

    fn color(&self) -> Color {
        match self.root_cause() {
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => Color::Red,
            Self::Network(_) | Self::HttpRequest(_) => Color::Yellow,
            Self::Timeout(_) | Self::Cancelled(_) => Color::Blue,
            Self::LocationUnavailable(_) | Self::DirectoryUnavailable(_) => Color::Magenta,
            Self::Io(_) | Self::ServerNotFound(_) | Self::NoSuccessfulSamples(_) => Color::Cyan,
            Self::Phase { .. } | Self::Internal(_) => Color::BrightRed,
        }
    }

    /// `[CATEGORY] message`, colored by category when `use_color` is set
    pub fn format_for_console(&self, use_color: bool) -> String {
        let category = self.category();
        let message = self.to_string();

        if use_color {
            let color = self.color();
            format!("[{}] {}", category.color(color).bold(), message.as_str().color(color))
        } else {
            format!("[{}] {}", category, message)
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<url::ParseError> for AppError {
    fn from(error: url::ParseError) -> Self {
        Self::parse(format!("URL parse error: {}", error))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::parse(format!("JSON parse error: {}", error))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::timeout(error.to_string())
        } else if error.is_connect() || error.is_request() {
            Self::network(error.to_string())
        } else {
            Self::http_request(error.to_string())
        }
    }
}

impl From<std::num::ParseIntError> for AppError {
    fn from(error: std::num::ParseIntError) -> Self {
        Self::parse(format!("Integer parse error: {}", error))
    }
}

impl From<std::num::ParseFloatError> for AppError {
    fn from(error: std::num::ParseFloatError) -> Self {
        Self::parse(format!("Float parse error: {}", error))
    }
}

impl From<std::str::ParseBoolError> for AppError {
    fn from(error: std::str::ParseBoolError) -> Self {
        Self::parse(format!("Boolean parse error: {}", error))
    }
}

impl From<dotenv::Error> for AppError {
    fn from(error: dotenv::Error) -> Self {
        Self::config(format!("Environment file error: {}", error))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::internal(format!("Worker task failed: {}", error))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::internal(format!("{:#}", error))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Prefix a failure with what was being attempted, keeping its category
pub trait ErrorContext<T> {
    fn context(self, context: &str) -> Result<T>;

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<AppError>,
{
    fn context(self, context: &str) -> Result<T> {
        self.map_err(|e| e.into().prefixed(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().prefixed(&f()))
    }
}

/// Renders terminal errors for the console and for `--json`
pub struct ErrorReporter {
    pub use_color: bool,
    pub verbose: bool,
}

impl ErrorReporter {
    pub fn new(use_color: bool, verbose: bool) -> Self {
        Self { use_color, verbose }
    }

    /// Console rendering; verbose mode adds the phase and exit status
    pub fn render(&self, error: &AppError) -> String {
        let mut out = error.format_for_console(self.use_color);

        if self.verbose {
            if let Some(phase) = error.phase() {
                out.push_str(&format!("\n  phase: {}", phase));
            }
            out.push_str(&format!("\n  exit status: {}", error.exit_code()));
        }

        out
    }

    /// `{"error": "...", "phase": "..."}`; `phase` only for phase failures
    pub fn render_json(error: &AppError) -> String {
        let mut body = serde_json::json!({ "error": error.to_string() });
        if let Some(phase) = error.phase() {
            body["phase"] = serde_json::Value::String(phase.to_string());
        }
        body.to_string()
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}
