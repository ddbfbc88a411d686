//! Buffered alert sink: batch alert-worthy events into digest messages.
//!
//! Events accumulate in a bounded buffer. When the buffer reaches capacity, or on an explicit
//! [`BufferedAlertSink::flush`], the buffered events are rendered into one digest and handed to
//! the [`MailSender`]. The buffer is emptied before delivery is attempted, and a batch whose
//! delivery fails is logged once and discarded.
//!
//! Locking:
//! - `state` guards the live buffer and an ordered outbox of snapshotted batches. A snapshot is
//!   taken and queued in the same critical section as the append that filled the buffer, so no
//!   event is ever in two batches and none is lost between snapshot and the next append.
//! - `delivery` is held while draining the outbox, so at most one delivery per sink is in flight.
//!   Producers appending during a slow delivery land in the fresh buffer; a producer that fills
//!   it again waits for `delivery`, and batches go out in snapshot order.
//!
//! All work happens on the calling thread. Wrap the sink in [`crate::worker::AlertWorker`] to
//! move it off the producer's path.

use crate::digest::{render_digest, DigestLayout};
use crate::error::ConfigError;
use crate::event::{Level, LogEvent};
use crate::format::{PatternFormatter, SharedFormatter};
use crate::mail::{MailMessage, MailSender};
use crate::retry::{DeliveryExhausted, DeliveryRetry};
use crate::target::DeliveryTarget;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// Historical default buffer size.
pub const DEFAULT_CAPACITY: usize = 50;

/// Called synchronously, after the warning is logged, for every message that could not be
/// delivered. Receives the failure and the number of events the message carried.
pub type DeliveryErrorHook = Arc<dyn Fn(&DeliveryExhausted, usize) + Send + Sync>;

/// What a flush did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    /// Batches drained from the sink.
    pub batches: usize,
    /// Events contained in those batches.
    pub events: usize,
    /// Messages accepted by the mail sender.
    pub sent: usize,
    /// Messages that failed and were discarded.
    pub failed: usize,
}

impl FlushOutcome {
    /// Nothing was buffered.
    pub fn is_empty(&self) -> bool {
        self.batches == 0
    }
}

#[derive(Default)]
struct AlertState {
    entries: Vec<LogEvent>,
    outbox: VecDeque<Vec<LogEvent>>,
}

pub struct BufferedAlertSink {
    target: DeliveryTarget,
    capacity: usize,
    mailer: Arc<dyn MailSender>,
    formatter: SharedFormatter,
    layout: DigestLayout,
    critical_copy: bool,
    retry: DeliveryRetry,
    on_error: Option<DeliveryErrorHook>,
    state: Mutex<AlertState>,
    delivery: Mutex<()>,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl fmt::Debug for BufferedAlertSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferedAlertSink")
            .field("target", &self.target)
            .field("capacity", &self.capacity)
            .field("buffered", &self.len())
            .field("layout", &self.layout)
            .field("critical_copy", &self.critical_copy)
            .field("retry", &self.retry)
            .finish()
    }
}

impl BufferedAlertSink {
    /// Create a sink that flushes every `capacity` events.
    ///
    /// Fails with [`ConfigError::InvalidCapacity`] when `capacity` is zero. Recipient and server
    /// address validation happens when the [`DeliveryTarget`] is built.
    pub fn new<M>(target: DeliveryTarget, capacity: usize, mailer: M) -> Result<Self, ConfigError>
    where
        M: MailSender + 'static,
    {
        if capacity < 1 {
            return Err(ConfigError::InvalidCapacity(capacity));
        }
        Ok(Self {
            target,
            capacity,
            mailer: Arc::new(mailer),
            formatter: PatternFormatter::new().shared(),
            layout: DigestLayout::Merged,
            critical_copy: false,
            retry: DeliveryRetry::none(),
            on_error: None,
            state: Mutex::new(AlertState { entries: Vec::with_capacity(capacity), ..Default::default() }),
            delivery: Mutex::new(()),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        })
    }

    /// Formatter used for each digest block.
    pub fn with_formatter(mut self, formatter: SharedFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn with_layout(mut self, layout: DigestLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Also send CRITICAL entries in a second, separately subjected message.
    pub fn with_critical_copy(mut self, enabled: bool) -> Self {
        self.critical_copy = enabled;
        self
    }

    pub fn with_retry(mut self, retry: DeliveryRetry) -> Self {
        self.retry = retry;
        self
    }

    pub fn on_delivery_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&DeliveryExhausted, usize) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    pub fn target(&self) -> &DeliveryTarget {
        &self.target
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events currently buffered.
    pub fn len(&self) -> usize {
        self.lock_state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Messages successfully handed to the mail sender.
    pub fn delivered_batches(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Messages discarded after a delivery failure.
    pub fn dropped_batches(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Buffer `event`; flush on this thread if the buffer is now full.
    pub fn accept(&self, event: &LogEvent) {
        let full = {
            let mut state = self.lock_state();
            state.entries.push(event.clone());
            if state.entries.len() >= self.capacity {
                let batch = std::mem::take(&mut state.entries);
                state.outbox.push_back(batch);
                true
            } else {
                false
            }
        };
        if full {
            self.drain();
        }
    }

    /// Deliver whatever is buffered. A no-op when nothing is buffered.
    pub fn flush(&self) -> FlushOutcome {
        {
            let mut state = self.lock_state();
            if !state.entries.is_empty() {
                let batch = std::mem::take(&mut state.entries);
                state.outbox.push_back(batch);
            } else if state.outbox.is_empty() {
                return FlushOutcome::default();
            }
        }
        self.drain()
    }

    fn drain(&self) -> FlushOutcome {
        let _delivering = self.delivery.lock().unwrap_or_else(|e| e.into_inner());
        let mut outcome = FlushOutcome::default();
        loop {
            let next = self.lock_state().outbox.pop_front();
            match next {
                Some(batch) => self.deliver(&batch, &mut outcome),
                None => break,
            }
        }
        outcome
    }

    fn deliver(&self, batch: &[LogEvent], outcome: &mut FlushOutcome) {
        outcome.batches += 1;
        outcome.events += batch.len();

        let body = render_digest(batch, self.formatter.as_ref(), self.layout);
        let message = MailMessage::compose(&self.target, self.target.subject(), body);
        self.send(&message, batch.len(), outcome);

        if self.critical_copy {
            let critical: Vec<LogEvent> =
                batch.iter().filter(|e| e.level == Level::Critical).cloned().collect();
            if !critical.is_empty() {
                let body = render_digest(&critical, self.formatter.as_ref(), DigestLayout::Merged);
                let message =
                    MailMessage::compose(&self.target, self.target.critical_subject(), body);
                self.send(&message, critical.len(), outcome);
            }
        }
    }

    fn send(&self, message: &MailMessage, events: usize, outcome: &mut FlushOutcome) {
        match self.retry.run(|_| self.mailer.send(message)) {
            Ok(attempts) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                outcome.sent += 1;
                debug!(
                    target: "logfan::alert",
                    subject = %message.subject,
                    events,
                    attempts,
                    "alert digest delivered"
                );
            }
            Err(err) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                outcome.failed += 1;
                warn!(
                    target: "logfan::alert",
                    station = %self.target.station_id(),
                    events,
                    error = %err,
                    "alert digest delivery failed; batch discarded"
                );
                if let Some(hook) = &self.on_error {
                    hook(&err, events);
                }
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, AlertState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::blocks;
    use crate::error::DeliveryError;
    use crate::mail::MemoryMailSender;
    use crate::sleeper::InstantSleeper;
    use crate::target::Credentials;
    use std::sync::atomic::AtomicUsize;

    fn target() -> DeliveryTarget {
        DeliveryTarget::new(
            "smtp.example.org:587",
            Credentials::new("station@example.org", "secret"),
            "station@example.org",
            "ops@example.org",
            "msp1",
        )
        .unwrap()
    }

    fn plain() -> SharedFormatter {
        Arc::new(|e: &LogEvent| format!("{}|{}", e.level.name(), e.message))
    }

    fn event(i: usize) -> LogEvent {
        LogEvent::new(Level::Error, format!("event {i}"))
    }

    #[derive(Debug, Default)]
    struct FailingMailer {
        calls: AtomicUsize,
    }

    impl MailSender for FailingMailer {
        fn send(&self, _message: &MailMessage) -> Result<(), DeliveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(DeliveryError::transport("connection refused"))
        }
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = BufferedAlertSink::new(target(), 0, MemoryMailSender::new()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCapacity(0)));
    }

    #[test]
    fn reaching_capacity_delivers_exactly_once_in_order() {
        for capacity in 1..=8 {
            let mailer = MemoryMailSender::new();
            let sink = BufferedAlertSink::new(target(), capacity, mailer.clone())
                .unwrap()
                .with_formatter(plain());
            for i in 0..capacity {
                sink.accept(&event(i));
            }
            assert!(sink.is_empty());
            let sent = mailer.sent();
            assert_eq!(sent.len(), 1, "capacity {capacity}");
            let parts = blocks(&sent[0].body);
            let expected: Vec<String> = (0..capacity).map(|i| format!("ERROR|event {i}")).collect();
            assert_eq!(parts, expected);
            assert_eq!(sent[0].subject, "[MSP1] Error log sent by LOGFAN");
        }
    }

    #[test]
    fn below_capacity_never_delivers() {
        let mailer = MemoryMailSender::new();
        let sink = BufferedAlertSink::new(target(), 3, mailer.clone()).unwrap();
        sink.accept(&event(0));
        sink.accept(&event(1));
        assert_eq!(sink.len(), 2);
        assert!(mailer.is_empty());
    }

    #[test]
    fn explicit_flush_delivers_once_and_empties() {
        let mailer = MemoryMailSender::new();
        let sink = BufferedAlertSink::new(target(), 10, mailer.clone()).unwrap();
        sink.accept(&event(0));
        let outcome = sink.flush();
        assert_eq!(outcome, FlushOutcome { batches: 1, events: 1, sent: 1, failed: 0 });
        assert!(sink.is_empty());
        assert_eq!(mailer.len(), 1);
        assert_eq!(sink.delivered_batches(), 1);
    }

    #[test]
    fn flush_on_empty_is_a_noop() {
        let mailer = MemoryMailSender::new();
        let sink = BufferedAlertSink::new(target(), 2, mailer.clone()).unwrap();
        assert!(sink.flush().is_empty());
        assert!(mailer.is_empty());
    }

    #[test]
    fn failed_delivery_discards_batch_and_calls_hook() {
        let mailer = Arc::new(FailingMailer::default());
        let hook_calls = Arc::new(AtomicUsize::new(0));
        let seen = hook_calls.clone();
        let sink = BufferedAlertSink::new(target(), 2, mailer.clone())
            .unwrap()
            .on_delivery_error(move |err, events| {
                assert_eq!(events, 2);
                assert!(matches!(err.last, DeliveryError::Transport(_)));
                seen.fetch_add(1, Ordering::SeqCst);
            });
        sink.accept(&event(0));
        sink.accept(&event(1));
        assert!(sink.is_empty());
        assert_eq!(mailer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(hook_calls.load(Ordering::SeqCst), 1);
        assert_eq!(sink.dropped_batches(), 1);
        // nothing re-queued
        assert!(sink.flush().is_empty());
    }

    #[test]
    fn bounded_retry_is_applied() {
        let mailer = Arc::new(FailingMailer::default());
        let retry = DeliveryRetry::builder().max_attempts(3).sleeper(InstantSleeper).build().unwrap();
        let sink = BufferedAlertSink::new(target(), 1, mailer.clone()).unwrap().with_retry(retry);
        sink.accept(&event(0));
        assert_eq!(mailer.calls.load(Ordering::SeqCst), 3);
        assert_eq!(sink.dropped_batches(), 1);
    }

    #[test]
    fn critical_entries_get_a_second_message() {
        let mailer = MemoryMailSender::new();
        let sink = BufferedAlertSink::new(target(), 3, mailer.clone())
            .unwrap()
            .with_formatter(plain())
            .with_critical_copy(true);
        sink.accept(&LogEvent::new(Level::Warning, "w"));
        sink.accept(&LogEvent::new(Level::Critical, "c"));
        sink.accept(&LogEvent::new(Level::Error, "e"));
        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(blocks(&sent[0].body).len(), 3);
        assert_eq!(sent[1].subject, "[MSP1] CRITICAL log sent by LOGFAN");
        assert_eq!(blocks(&sent[1].body), vec!["CRITICAL|c".to_string()]);
    }

    #[test]
    fn critical_copy_skipped_without_critical_entries() {
        let mailer = MemoryMailSender::new();
        let sink = BufferedAlertSink::new(target(), 1, mailer.clone())
            .unwrap()
            .with_critical_copy(true);
        sink.accept(&event(0));
        assert_eq!(mailer.len(), 1);
    }

    #[test]
    fn severity_layout_is_used_for_main_digest() {
        let mailer = MemoryMailSender::new();
        let sink = BufferedAlertSink::new(target(), 2, mailer.clone())
            .unwrap()
            .with_formatter(plain())
            .with_layout(DigestLayout::BySeverity);
        sink.accept(&LogEvent::new(Level::Warning, "w"));
        sink.accept(&LogEvent::new(Level::Critical, "c"));
        let body = &mailer.sent()[0].body;
        assert!(body.starts_with("== CRITICAL (1) =="));
    }
}
