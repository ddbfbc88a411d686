//! Move alert buffering and delivery off the producer's thread.
//!
//! [`AlertWorker`] owns a bounded queue and a single tokio task. Producers only pay for a
//! `try_send`; the task feeds events to the wrapped [`BufferedAlertSink`] on the blocking pool,
//! one at a time, so there is still at most one flush in flight. A full queue drops the event,
//! counts it in [`AlertWorker::dropped`] and logs a warning on `logfan::worker` for the first
//! drop and every power-of-two drop after it.

use crate::alert::{BufferedAlertSink, FlushOutcome};
use crate::error::{ConfigError, SinkError};
use crate::event::LogEvent;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

enum Command {
    Event(LogEvent),
    Flush(Option<oneshot::Sender<FlushOutcome>>),
    Shutdown(oneshot::Sender<FlushOutcome>),
}

#[derive(Clone)]
pub struct AlertWorker {
    tx: mpsc::Sender<Command>,
    dropped: Arc<AtomicU64>,
    pending_flush: Arc<AtomicBool>,
    sink: Arc<BufferedAlertSink>,
    task: Arc<std::sync::Mutex<Option<JoinHandle<()>>>>,
}

impl std::fmt::Debug for AlertWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertWorker")
            .field("sink", &self.sink)
            .field("dropped", &self.dropped())
            .finish()
    }
}

impl AlertWorker {
    /// Start the worker on the current tokio runtime.
    pub fn spawn(sink: Arc<BufferedAlertSink>, queue_capacity: usize) -> Result<Self, ConfigError> {
        let handle = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;
        Self::spawn_on(&handle, sink, queue_capacity)
    }

    /// Start the worker on `handle`.
    pub fn spawn_on(
        handle: &Handle,
        sink: Arc<BufferedAlertSink>,
        queue_capacity: usize,
    ) -> Result<Self, ConfigError> {
        if queue_capacity == 0 {
            return Err(ConfigError::InvalidQueueCapacity);
        }
        let (tx, rx) = mpsc::channel(queue_capacity);
        let pending_flush = Arc::new(AtomicBool::new(false));
        let task = handle.spawn(run(rx, sink.clone(), pending_flush.clone()));
        Ok(Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
            pending_flush,
            sink,
            task: Arc::new(std::sync::Mutex::new(Some(task))),
        })
    }

    /// Queue an event without blocking.
    pub fn accept(&self, event: &LogEvent) -> Result<(), SinkError> {
        match self.tx.try_send(Command::Event(event.clone())) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped.is_power_of_two() {
                    warn!(
                        target: "logfan::worker",
                        dropped,
                        level = %event.level,
                        "alert worker queue full; event dropped"
                    );
                }
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SinkError::QueueClosed),
        }
    }

    /// Ask the worker to flush without waiting for the result.
    ///
    /// When the queue is full the flush is still recorded and runs after the worker's next
    /// command, but the caller gets [`SinkError::QueueFull`] so the delay is visible.
    pub fn request_flush(&self) -> Result<(), SinkError> {
        match self.tx.try_send(Command::Flush(None)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.pending_flush.store(true, Ordering::Release);
                Err(SinkError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SinkError::QueueClosed),
        }
    }

    /// Flush after every event queued so far has been buffered.
    pub async fn flush(&self) -> Result<FlushOutcome, SinkError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(Command::Flush(Some(reply))).await.map_err(|_| SinkError::QueueClosed)?;
        rx.await.map_err(|_| SinkError::QueueClosed)
    }

    /// Drain the queue, flush, and stop the worker task.
    pub async fn shutdown(&self) -> Result<FlushOutcome, SinkError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(Command::Shutdown(reply)).await.map_err(|_| SinkError::QueueClosed)?;
        let outcome = rx.await.map_err(|_| SinkError::QueueClosed)?;
        let task = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                warn!(target: "logfan::worker", error = %err, "alert worker task failed");
            }
        }
        Ok(outcome)
    }

    /// Events dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn sink(&self) -> &Arc<BufferedAlertSink> {
        &self.sink
    }
}

async fn run(
    mut rx: mpsc::Receiver<Command>,
    sink: Arc<BufferedAlertSink>,
    pending_flush: Arc<AtomicBool>,
) {
    debug!(target: "logfan::worker", capacity = sink.capacity(), "alert worker started");
    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::Event(event) => {
                let sink = sink.clone();
                if let Err(err) = tokio::task::spawn_blocking(move || sink.accept(&event)).await {
                    warn!(target: "logfan::worker", error = %err, "alert sink panicked while accepting");
                }
            }
            Command::Flush(reply) => {
                let outcome = flush_blocking(&sink).await;
                if let Some(reply) = reply {
                    let _ = reply.send(outcome);
                }
            }
            Command::Shutdown(reply) => {
                rx.close();
                while let Ok(cmd) = rx.try_recv() {
                    if let Command::Event(event) = cmd {
                        let sink = sink.clone();
                        let _ = tokio::task::spawn_blocking(move || sink.accept(&event)).await;
                    }
                }
                let outcome = flush_blocking(&sink).await;
                let _ = reply.send(outcome);
                break;
            }
        }
        if pending_flush.swap(false, Ordering::AcqRel) {
            flush_blocking(&sink).await;
        }
    }
    debug!(target: "logfan::worker", "alert worker stopped");
}

async fn flush_blocking(sink: &Arc<BufferedAlertSink>) -> FlushOutcome {
    let sink = sink.clone();
    match tokio::task::spawn_blocking(move || sink.flush()).await {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(target: "logfan::worker", error = %err, "alert sink panicked while flushing");
            FlushOutcome::default()
        }
    }
}
