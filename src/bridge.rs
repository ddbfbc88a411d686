//! Feed `tracing` events into a [`Pipeline`].
//!
//! [`PipelineLayer`] is a `tracing_subscriber` layer: every event that reaches it becomes a
//! [`LogEvent`] and is dispatched. Field conventions:
//!
//! - `message` becomes the event message;
//! - `function` overrides the source function (otherwise the enclosing span name is used);
//! - `error` becomes a [`Failure`] whose single frame is the emitting call site;
//! - any other field is appended to the message as ` key=value`.
//!
//! ```rust
//! use logfan::{Level, MemorySink, Pipeline, PipelineLayer};
//! use tracing_subscriber::layer::SubscriberExt;
//!
//! let memory = MemorySink::new();
//! let pipeline = Pipeline::new().with(memory.clone(), Level::Warning);
//! let subscriber = tracing_subscriber::registry().with(PipelineLayer::new(pipeline));
//!
//! tracing::subscriber::with_default(subscriber, || {
//!     tracing::info!(target: "station", "warming up");
//!     tracing::warn!(target: "station", sensor = 3, "reading out of range");
//! });
//! assert_eq!(memory.messages(), vec!["reading out of range sensor=3"]);
//! ```

use crate::event::{Failure, Level, LogEvent, StackFrame};
use crate::pipeline::Pipeline;
use std::cell::Cell;
use std::fmt::{self, Write as _};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Targets of this crate's own diagnostics. Feeding them back into the pipeline would let a
/// failing sink report its failure to itself.
const INTERNAL_TARGETS: [&str; 3] = ["logfan::alert", "logfan::pipeline", "logfan::worker"];

thread_local! {
    static DISPATCHING: Cell<bool> = const { Cell::new(false) };
}

/// Clears [`DISPATCHING`] when dropped, including when a sink panics mid-dispatch.
struct DispatchGuard;

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        DISPATCHING.with(|flag| flag.set(false));
    }
}

#[derive(Debug, Clone)]
pub struct PipelineLayer {
    pipeline: Pipeline,
}

impl PipelineLayer {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

impl<S> Layer<S> for PipelineLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();
        if INTERNAL_TARGETS.contains(&meta.target()) {
            return;
        }
        if DISPATCHING.with(|flag| flag.replace(true)) {
            return;
        }
        let _guard = DispatchGuard;

        let mut fields = FieldVisitor::default();
        event.record(&mut fields);

        let function = fields
            .function
            .take()
            .or_else(|| ctx.event_span(event).map(|span| span.name().to_string()))
            .unwrap_or_else(|| "-".to_string());
        let line = meta.line().unwrap_or(0);

        let mut log_event = LogEvent::new(Level::from(*meta.level()), fields.message())
            .at(meta.target(), function.clone(), line);
        if let Some(value) = fields.error.take() {
            let frame = StackFrame::new(meta.file().unwrap_or("<unknown>"), line, function);
            log_event = log_event.with_failure(Failure::new(value, vec![frame]));
        }

        self.pipeline.dispatch(&log_event);
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    extra: String,
    function: Option<String>,
    error: Option<String>,
}

impl FieldVisitor {
    fn message(&self) -> String {
        let mut out = self.message.clone();
        out.push_str(&self.extra);
        out
    }

    fn record_text(&mut self, field: &Field, text: String) {
        match field.name() {
            "message" => self.message = text,
            "function" => self.function = Some(text),
            "error" => self.error = Some(text),
            name => {
                let _ = write!(self.extra, " {name}={text}");
            }
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_text(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        let text = Failure::from_error(value, Vec::new()).value;
        self.record_text(field, text);
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_text(field, format!("{value:?}"));
    }
}
