//! Console sink: one formatted line per event.

use crate::error::SinkError;
use crate::event::LogEvent;
use crate::format::{PatternFormatter, SharedFormatter};
use std::fmt;
use std::io::{self, Write};
use std::sync::Mutex;

pub struct ConsoleSink {
    writer: Mutex<Box<dyn Write + Send>>,
    formatter: SharedFormatter,
}

impl fmt::Debug for ConsoleSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleSink").finish_non_exhaustive()
    }
}

impl ConsoleSink {
    /// Write to standard error.
    pub fn stderr() -> Self {
        Self::with_writer(io::stderr())
    }

    /// Write to standard output.
    pub fn stdout() -> Self {
        Self::with_writer(io::stdout())
    }

    pub fn with_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self { writer: Mutex::new(Box::new(writer)), formatter: PatternFormatter::new().shared() }
    }

    pub fn with_formatter(mut self, formatter: SharedFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn accept(&self, event: &LogEvent) -> Result<(), SinkError> {
        let mut line = self.formatter.render(event);
        line.push('\n');
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        writer.write_all(line.as_bytes())?;
        Ok(())
    }

    pub fn flush(&self) -> Result<(), SinkError> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner()).flush()?;
        Ok(())
    }
}
