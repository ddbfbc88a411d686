//! Fan one event stream out to many sinks.
//!
//! Each attachment pairs a [`Sink`] with a minimum [`Level`]. [`Pipeline::dispatch`] offers an
//! event to every attachment whose minimum is at or below the event's level, in attachment
//! order. A failing sink is logged and reported but never stops delivery to the sinks after it.
//!
//! ```rust
//! use logfan::{Level, LogEvent, MemorySink, Pipeline};
//!
//! let everything = MemorySink::new();
//! let alerts = MemorySink::new();
//! let pipeline = Pipeline::new()
//!     .with(everything.clone(), Level::Debug)
//!     .with(alerts.clone(), Level::Warning);
//!
//! pipeline.dispatch(&LogEvent::new(Level::Info, "calibrating"));
//! pipeline.dispatch(&LogEvent::new(Level::Error, "lamp failed"));
//! assert_eq!(everything.len(), 2);
//! assert_eq!(alerts.messages(), vec!["lamp failed"]);
//! ```

use crate::error::SinkError;
use crate::event::{Level, LogEvent};
use crate::sink::{EventSink, Sink};
use futures::future::{ready, Ready};
use std::convert::Infallible;
use std::sync::{Arc, RwLock, RwLockReadGuard};
use std::task::{Context, Poll};
use tower_service::Service;
use tracing::warn;

#[derive(Debug)]
struct Attachment {
    sink: Sink,
    min_level: Level,
}

/// A sink that failed during dispatch or flush.
#[derive(Debug)]
pub struct SinkFailure {
    /// Attachment index.
    pub index: usize,
    pub sink: &'static str,
    pub error: SinkError,
}

/// Result of offering one event to the pipeline.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Sinks that accepted the event.
    pub accepted: usize,
    /// Sinks skipped because of their minimum level.
    pub skipped: usize,
    pub failures: Vec<SinkFailure>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Cheap to clone; clones share attachments.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    attachments: Arc<RwLock<Vec<Attachment>>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `sink`, receiving events at `min_level` and above.
    pub fn attach(&self, sink: impl Into<Sink>, min_level: Level) {
        let mut guard = self.attachments.write().unwrap_or_else(|e| e.into_inner());
        guard.push(Attachment { sink: sink.into(), min_level });
    }

    /// Builder form of [`Pipeline::attach`].
    pub fn with(self, sink: impl Into<Sink>, min_level: Level) -> Self {
        self.attach(sink, min_level);
        self
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names and minimum levels of the attached sinks, in attachment order.
    pub fn describe(&self) -> Vec<(&'static str, Level)> {
        self.read().iter().map(|a| (a.sink.name(), a.min_level)).collect()
    }

    /// Offer `event` to every eligible sink.
    pub fn dispatch(&self, event: &LogEvent) -> DispatchReport {
        let mut report = DispatchReport::default();
        for (index, attachment) in self.read().iter().enumerate() {
            if event.level < attachment.min_level {
                report.skipped += 1;
                continue;
            }
            match attachment.sink.accept(event) {
                Ok(()) => report.accepted += 1,
                Err(error) => {
                    let sink = attachment.sink.name();
                    warn!(
                        target: "logfan::pipeline",
                        sink,
                        index,
                        error = %error,
                        "sink failed to accept event"
                    );
                    report.failures.push(SinkFailure { index, sink, error });
                }
            }
        }
        report
    }

    /// Flush every sink, e.g. before shutdown. Failures are logged and returned.
    pub fn flush_all(&self) -> Vec<SinkFailure> {
        let mut failures = Vec::new();
        for (index, attachment) in self.read().iter().enumerate() {
            if let Err(error) = attachment.sink.flush() {
                let sink = attachment.sink.name();
                warn!(target: "logfan::pipeline", sink, index, error = %error, "sink failed to flush");
                failures.push(SinkFailure { index, sink, error });
            }
        }
        failures
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Attachment>> {
        self.attachments.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// Dispatch runs to completion inside `call`; wrap alert sinks in an
/// [`crate::worker::AlertWorker`] before driving the pipeline from async code.
impl Service<LogEvent> for Pipeline {
    type Response = DispatchReport;
    type Error = Infallible;
    type Future = Ready<Result<DispatchReport, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: LogEvent) -> Self::Future {
        ready(Ok(self.dispatch(&event)))
    }
}
