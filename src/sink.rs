//! The capability every sink offers, and the closed set of sink kinds a pipeline can hold.

use crate::alert::BufferedAlertSink;
use crate::console::ConsoleSink;
use crate::error::SinkError;
use crate::event::LogEvent;
use crate::memory::MemorySink;
use crate::persist::PersistenceSink;
use crate::worker::AlertWorker;
use std::fmt;
use std::sync::Arc;

/// Consumes log events.
pub trait EventSink: Send + Sync + fmt::Debug {
    /// Offer one event. The event is only read.
    fn accept(&self, event: &LogEvent) -> Result<(), SinkError>;

    /// Push out anything buffered.
    fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Short name for diagnostics.
    fn name(&self) -> &'static str;
}

impl EventSink for ConsoleSink {
    fn accept(&self, event: &LogEvent) -> Result<(), SinkError> {
        ConsoleSink::accept(self, event)
    }

    fn flush(&self) -> Result<(), SinkError> {
        ConsoleSink::flush(self)
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

impl EventSink for PersistenceSink {
    fn accept(&self, event: &LogEvent) -> Result<(), SinkError> {
        PersistenceSink::accept(self, event)
    }

    fn name(&self) -> &'static str {
        "persistence"
    }
}

impl EventSink for BufferedAlertSink {
    fn accept(&self, event: &LogEvent) -> Result<(), SinkError> {
        BufferedAlertSink::accept(self, event);
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        BufferedAlertSink::flush(self);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "alert"
    }
}

impl EventSink for AlertWorker {
    fn accept(&self, event: &LogEvent) -> Result<(), SinkError> {
        AlertWorker::accept(self, event)
    }

    fn flush(&self) -> Result<(), SinkError> {
        self.request_flush()
    }

    fn name(&self) -> &'static str {
        "alert-worker"
    }
}

impl EventSink for MemorySink {
    fn accept(&self, event: &LogEvent) -> Result<(), SinkError> {
        MemorySink::accept(self, event);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Every kind of sink a [`crate::Pipeline`] can hold.
#[derive(Debug)]
pub enum Sink {
    Console(ConsoleSink),
    Persistence(PersistenceSink),
    /// Shared so the caller can keep a handle for explicit flushes.
    Alert(Arc<BufferedAlertSink>),
    AlertWorker(AlertWorker),
    Memory(MemorySink),
}

impl Sink {
    fn inner(&self) -> &dyn EventSink {
        match self {
            Sink::Console(s) => s,
            Sink::Persistence(s) => s,
            Sink::Alert(s) => s.as_ref(),
            Sink::AlertWorker(s) => s,
            Sink::Memory(s) => s,
        }
    }
}

impl EventSink for Sink {
    fn accept(&self, event: &LogEvent) -> Result<(), SinkError> {
        self.inner().accept(event)
    }

    fn flush(&self) -> Result<(), SinkError> {
        self.inner().flush()
    }

    fn name(&self) -> &'static str {
        self.inner().name()
    }
}

impl From<ConsoleSink> for Sink {
    fn from(sink: ConsoleSink) -> Self {
        Sink::Console(sink)
    }
}

impl From<PersistenceSink> for Sink {
    fn from(sink: PersistenceSink) -> Self {
        Sink::Persistence(sink)
    }
}

impl From<BufferedAlertSink> for Sink {
    fn from(sink: BufferedAlertSink) -> Self {
        Sink::Alert(Arc::new(sink))
    }
}

impl From<Arc<BufferedAlertSink>> for Sink {
    fn from(sink: Arc<BufferedAlertSink>) -> Self {
        Sink::Alert(sink)
    }
}

impl From<AlertWorker> for Sink {
    fn from(sink: AlertWorker) -> Self {
        Sink::AlertWorker(sink)
    }
}

impl From<MemorySink> for Sink {
    fn from(sink: MemorySink) -> Self {
        Sink::Memory(sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Level;
    use crate::mail::MemoryMailSender;
    use crate::persist::MemoryLogStore;
    use crate::target::{Credentials, DeliveryTarget};

    #[test]
    fn enum_dispatches_to_variant() {
        let memory = MemorySink::new();
        let sink: Sink = memory.clone().into();
        assert_eq!(sink.name(), "memory");
        sink.accept(&LogEvent::new(Level::Info, "hi")).unwrap();
        assert_eq!(memory.len(), 1);

        let store = MemoryLogStore::new();
        let sink: Sink = PersistenceSink::new(store.clone()).into();
        assert_eq!(sink.name(), "persistence");
        sink.accept(&LogEvent::new(Level::Info, "stored")).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn alert_variant_flushes_through_shared_handle() {
        let target =
            DeliveryTarget::new("h:25", Credentials::new("u", "p"), "f@x", "t@x", "st").unwrap();
        let mailer = MemoryMailSender::new();
        let alert = Arc::new(BufferedAlertSink::new(target, 5, mailer.clone()).unwrap());
        let sink: Sink = alert.clone().into();
        sink.accept(&LogEvent::new(Level::Error, "e")).unwrap();
        assert_eq!(alert.len(), 1);
        sink.flush().unwrap();
        assert!(alert.is_empty());
        assert_eq!(mailer.len(), 1);
    }
}
