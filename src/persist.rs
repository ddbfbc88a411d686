//! Per-event persistence into a [`LogStore`].
//!
//! Each event is mapped to `(level, source, message)`. When the event carries a failure the
//! message becomes
//! `EXCEPTION:<message>, TYPE/VALUE:<failure value>, TRACEBACK:<innermost frame>`.
//! Store errors propagate unchanged; persistence is not best-effort.

use crate::error::{SinkError, StorageError};
use crate::event::LogEvent;
use crate::traceback::TracebackNormalizer;
use std::sync::{Arc, Mutex};

/// Storage collaborator.
pub trait LogStore: Send + Sync + std::fmt::Debug {
    fn append(&self, level: &str, source: &str, message: &str) -> Result<(), StorageError>;
}

impl<T: LogStore + ?Sized> LogStore for Arc<T> {
    fn append(&self, level: &str, source: &str, message: &str) -> Result<(), StorageError> {
        (**self).append(level, source, message)
    }
}

/// One row handed to a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub level: String,
    pub source: String,
    pub message: String,
}

/// In-memory store, mostly for tests and inspection.
#[derive(Debug, Clone, Default)]
pub struct MemoryLogStore {
    records: Arc<Mutex<Vec<StoredRecord>>>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<StoredRecord> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogStore for MemoryLogStore {
    fn append(&self, level: &str, source: &str, message: &str) -> Result<(), StorageError> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).push(StoredRecord {
            level: level.to_string(),
            source: source.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}

#[derive(Debug)]
pub struct PersistenceSink {
    store: Arc<dyn LogStore>,
    normalizer: TracebackNormalizer,
}

impl PersistenceSink {
    pub fn new<S: LogStore + 'static>(store: S) -> Self {
        Self { store: Arc::new(store), normalizer: TracebackNormalizer::new() }
    }

    /// Normalizer used for failure events (for example one that strips the install root).
    pub fn with_normalizer(mut self, normalizer: TracebackNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Store one event.
    pub fn accept(&self, event: &LogEvent) -> Result<(), SinkError> {
        let body = self.body(event)?;
        self.store.append(event.level.name(), &event.source_label(), &body)?;
        Ok(())
    }

    fn body(&self, event: &LogEvent) -> Result<String, SinkError> {
        match &event.failure {
            Some(failure) => {
                let traceback = self.normalizer.normalize(event)?;
                Ok(format!(
                    "EXCEPTION:{}, TYPE/VALUE:{}, TRACEBACK:{}",
                    event.message, failure.value, traceback
                ))
            }
            None => Ok(event.message.clone()),
        }
    }
}
