//! Flatten an event's failure context into one compact, portable string.
//!
//! Only the innermost frame is reported, rendered as `"<file>:<line>, in <function>"`. An
//! installation prefix can be stripped from the file path (replaced with `.`) so persisted
//! records read the same on every deployment.
//!
//! ```rust
//! use logfan::{Failure, Level, LogEvent, StackFrame, TracebackNormalizer};
//!
//! let event = LogEvent::new(Level::Error, "read failed").with_failure(Failure::new(
//!     "ValueError: bad",
//!     vec![StackFrame::new("/root/app/mod.py", 42, "run")],
//! ));
//! let normalizer = TracebackNormalizer::with_strip_prefix("/root/app");
//! assert_eq!(normalizer.normalize(&event).unwrap(), "./mod.py:42, in run");
//! ```

use crate::error::PreconditionError;
use crate::event::{LogEvent, StackFrame};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TracebackNormalizer {
    strip_prefix: Option<String>,
}

impl TracebackNormalizer {
    /// Normalizer that leaves file paths untouched.
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizer that replaces a leading `prefix` in file paths with `.`.
    ///
    /// The prefix only matches whole path components: `/srv/app` shortens
    /// `/srv/app/main.py` but leaves `/srv/application/main.py` alone.
    pub fn with_strip_prefix(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim_end_matches('/').to_string();
        Self { strip_prefix: if trimmed.is_empty() { None } else { Some(trimmed) } }
    }

    pub fn strip_prefix(&self) -> Option<&str> {
        self.strip_prefix.as_deref()
    }

    /// Render the innermost frame of `event.failure`.
    ///
    /// Calling this on an event without a failure is a programming error and yields
    /// [`PreconditionError::MissingFailure`].
    pub fn normalize(&self, event: &LogEvent) -> Result<String, PreconditionError> {
        let failure = event.failure.as_ref().ok_or(PreconditionError::MissingFailure)?;
        let frame = failure.innermost().ok_or(PreconditionError::EmptyTraceback)?;
        Ok(clean(&self.render_frame(frame)))
    }

    fn render_frame(&self, frame: &StackFrame) -> String {
        format!("{}:{}, in {}", self.shorten(&frame.file), frame.line, frame.function)
    }

    fn shorten(&self, file: &str) -> String {
        match &self.strip_prefix {
            Some(prefix) => match file.strip_prefix(prefix.as_str()) {
                Some(rest) if rest.is_empty() || rest.starts_with('/') => format!(".{rest}"),
                _ => file.to_string(),
            },
            None => file.to_string(),
        }
    }
}

/// Collapse interior whitespace runs, trim each line, drop empty lines.
fn clean(raw: &str) -> String {
    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
