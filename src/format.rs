//! Event formatters shared by the console sink and digest rendering.

use crate::event::LogEvent;
use std::fmt;
use std::sync::Arc;

/// Pure rendering of one event into text.
pub trait Formatter: Send + Sync {
    fn render(&self, event: &LogEvent) -> String;
}

impl<F> Formatter for F
where
    F: Fn(&LogEvent) -> String + Send + Sync,
{
    fn render(&self, event: &LogEvent) -> String {
        self(event)
    }
}

/// Shared formatter handle.
pub type SharedFormatter = Arc<dyn Formatter>;

/// Default timestamp layout: `16/10/2026 14:03:59`.
pub const DEFAULT_DATE_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Column formatter:
/// `<timestamp> |<LEVEL padded to 7> |<module, 10 wide>|<line, 3 wide> |<function> |<message>`.
///
/// When the event carries a failure, the failure value and its frames follow on their own
/// lines, innermost frame last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternFormatter {
    date_format: String,
    include_failure: bool,
}

impl Default for PatternFormatter {
    fn default() -> Self {
        Self { date_format: DEFAULT_DATE_FORMAT.to_string(), include_failure: true }
    }
}

impl PatternFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different `chrono` strftime layout for the timestamp column.
    pub fn with_date_format(mut self, date_format: impl Into<String>) -> Self {
        self.date_format = date_format.into();
        self
    }

    /// Toggle the trailing failure lines.
    pub fn with_failure(mut self, include: bool) -> Self {
        self.include_failure = include;
        self
    }

    pub fn shared(self) -> SharedFormatter {
        Arc::new(self)
    }
}

impl Formatter for PatternFormatter {
    fn render(&self, event: &LogEvent) -> String {
        let mut out = format!(
            "{} |{:<7} |{:<10.10}|{:<3} |{} |{}",
            event.timestamp.format(&self.date_format),
            event.level,
            event.source_module,
            event.source_line,
            event.source_function,
            event.message,
        );
        if self.include_failure {
            if let Some(failure) = &event.failure {
                for frame in &failure.frames {
                    out.push_str(&format!(
                        "\n  {}:{}, in {}",
                        frame.file, frame.line, frame.function
                    ));
                }
                out.push('\n');
                out.push_str(&failure.value);
            }
        }
        out
    }
}

impl fmt::Debug for dyn Formatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<formatter>")
    }
}
