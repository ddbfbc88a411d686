//! Log event data model.
//!
//! A [`LogEvent`] is an immutable snapshot of one log occurrence. Producers build it once with
//! the consuming builder methods below; every sink only ever sees `&LogEvent`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordered severity. `Debug < Info < Warning < Error < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[serde(alias = "DEBUG", alias = "Debug", alias = "trace")]
    Debug,
    #[serde(alias = "INFO", alias = "Info")]
    Info,
    #[serde(alias = "WARNING", alias = "Warning", alias = "warn", alias = "WARN")]
    Warning,
    #[serde(alias = "ERROR", alias = "Error")]
    Error,
    #[serde(alias = "CRITICAL", alias = "Critical", alias = "fatal")]
    Critical,
}

impl Level {
    /// All levels, lowest first.
    pub const ALL: [Level; 5] =
        [Level::Debug, Level::Info, Level::Warning, Level::Error, Level::Critical];

    /// Upper-case level name as written to stores and digests.
    pub fn name(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // pad() so `{:<7}` style width specs work in formatters
        f.pad(self.name())
    }
}

/// Error returned when a string does not name a level.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level '{0}'")]
pub struct ParseLevelError(pub String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warning" | "warn" => Ok(Level::Warning),
            "error" => Ok(Level::Error),
            "critical" | "fatal" => Ok(Level::Critical),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE | tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warning,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// One frame of a captured stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    pub file: String,
    pub line: u32,
    pub function: String,
}

impl StackFrame {
    pub fn new(file: impl Into<String>, line: u32, function: impl Into<String>) -> Self {
        Self { file: file.into(), line, function: function.into() }
    }
}

/// Failure context attached to an event emitted while handling an error.
///
/// `frames` is ordered outermost first; the last frame is the one nearest the failure site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub value: String,
    pub frames: Vec<StackFrame>,
}

impl Failure {
    pub fn new(value: impl Into<String>, frames: Vec<StackFrame>) -> Self {
        Self { value: value.into(), frames }
    }

    /// Render an error and its `source()` chain as the failure value.
    pub fn from_error(err: &(dyn std::error::Error + 'static), frames: Vec<StackFrame>) -> Self {
        let mut value = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            value.push_str(": ");
            value.push_str(&cause.to_string());
            source = cause.source();
        }
        Self { value, frames }
    }

    /// Frame nearest the failure site.
    pub fn innermost(&self) -> Option<&StackFrame> {
        self.frames.last()
    }
}

/// Immutable snapshot of one log occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub source_module: String,
    pub source_function: String,
    pub source_line: u32,
    pub message: String,
    pub failure: Option<Failure>,
}

impl LogEvent {
    /// New event stamped with the current time and an unknown source location.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            source_module: String::new(),
            source_function: String::new(),
            source_line: 0,
            message: message.into(),
            failure: None,
        }
    }

    /// Set the source location.
    pub fn at(mut self, module: impl Into<String>, function: impl Into<String>, line: u32) -> Self {
        self.source_module = module.into();
        self.source_function = function.into();
        self.source_line = line;
        self
    }

    /// Attach a failure context.
    pub fn with_failure(mut self, failure: Failure) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Override the timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// `"<module>.<function>(<line>)"`.
    pub fn source_label(&self) -> String {
        format!("{}.{}({})", self.source_module, self.source_function, self.source_line)
    }

    pub fn has_failure(&self) -> bool {
        self.failure.is_some()
    }
}
