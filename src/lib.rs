#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # logfan
//!
//! Fan one stream of structured log events out to several sinks, each with its own severity
//! threshold:
//!
//! - **Console**: one formatted line per event.
//! - **Persistence**: one record per event in a [`LogStore`], with failures flattened into a
//!   single normalized traceback line.
//! - **Buffered alerts**: events accumulate until the buffer is full (or explicitly flushed),
//!   then go out as one email digest through a [`MailSender`]. A failed delivery is logged once
//!   and the batch is discarded.
//!
//! Sinks are synchronous and thread-safe. [`AlertWorker`] moves alert delivery onto a tokio
//! task, [`Pipeline`] is also a `tower::Service<LogEvent>`, and [`PipelineLayer`] feeds
//! `tracing` events in.
//!
//! ## Quick Start
//!
//! ```rust
//! use logfan::{
//!     BufferedAlertSink, Credentials, DeliveryTarget, Level, LogEvent, MemoryLogStore,
//!     MemoryMailSender, PersistenceSink, Pipeline,
//! };
//!
//! let target = DeliveryTarget::new(
//!     "smtp.example.org:587",
//!     Credentials::new("station@example.org", "secret"),
//!     "station@example.org",
//!     "ops@example.org; oncall@example.org",
//!     "pv-7",
//! )
//! .unwrap();
//! let mailer = MemoryMailSender::new();
//! let store = MemoryLogStore::new();
//!
//! let pipeline = Pipeline::new()
//!     .with(PersistenceSink::new(store.clone()), Level::Debug)
//!     .with(BufferedAlertSink::new(target, 2, mailer.clone()).unwrap(), Level::Warning);
//!
//! pipeline.dispatch(&LogEvent::new(Level::Info, "calibrated").at("radiometer", "calibrate", 12));
//! pipeline.dispatch(&LogEvent::new(Level::Error, "lamp failed").at("radiometer", "measure", 40));
//! pipeline.dispatch(&LogEvent::new(Level::Critical, "shutter stuck").at("shutter", "close", 7));
//!
//! assert_eq!(store.len(), 3);
//! assert_eq!(mailer.len(), 1);
//! assert_eq!(mailer.sent()[0].subject, "[PV-7] Error log sent by LOGFAN");
//! ```

pub mod alert;
pub mod backoff;
pub mod bridge;
pub mod config;
pub mod console;
pub mod digest;
pub mod error;
pub mod event;
pub mod format;
pub mod mail;
pub mod memory;
pub mod persist;
pub mod pipeline;
pub mod retry;
pub mod sink;
pub mod sleeper;
pub mod target;
pub mod traceback;
pub mod worker;

// Re-exports
pub use alert::{BufferedAlertSink, DeliveryErrorHook, FlushOutcome, DEFAULT_CAPACITY};
pub use backoff::{Backoff, BackoffError};
pub use bridge::PipelineLayer;
pub use config::{AlertConfig, AssembledPipeline, Collaborators, PipelineConfig};
pub use console::ConsoleSink;
pub use digest::DigestLayout;
pub use error::{ConfigError, DeliveryError, PreconditionError, SinkError, StorageError};
pub use event::{Failure, Level, LogEvent, ParseLevelError, StackFrame};
pub use format::{Formatter, PatternFormatter, SharedFormatter};
pub use mail::{MailMessage, MailSender, MemoryMailSender};
pub use memory::MemorySink;
pub use persist::{LogStore, MemoryLogStore, PersistenceSink, StoredRecord};
pub use pipeline::{DispatchReport, Pipeline, SinkFailure};
pub use retry::{DeliveryExhausted, DeliveryRetry, DeliveryRetryBuilder, RetryBuildError};
pub use sink::{EventSink, Sink};
pub use sleeper::{InstantSleeper, Sleeper, ThreadSleeper, TrackingSleeper};
pub use target::{Credentials, DeliveryTarget};
pub use traceback::TracebackNormalizer;
pub use worker::AlertWorker;
