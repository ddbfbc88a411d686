//! Error types for the log pipeline.
//!
//! Severity of each family:
//! - [`ConfigError`]: invalid construction arguments, surfaced at startup.
//! - [`PreconditionError`]: programmer misuse of the traceback normalizer.
//! - [`DeliveryError`]: mail delivery failed; recovered inside the alert sink.
//! - [`StorageError`]: the log store rejected an append; propagated to the caller.
//! - [`SinkError`]: what a sink hands back to the pipeline.
use crate::retry::RetryBuildError;
use std::io;
use thiserror::Error;

/// Invalid configuration or construction arguments.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Buffer capacity must be at least one.
    #[error("alert buffer capacity must be >= 1 (got {0})")]
    InvalidCapacity(usize),
    /// No recipient survived parsing.
    #[error("delivery target has no recipients")]
    NoRecipients,
    /// Server address is not of the form `host:port`.
    #[error("server address '{0}' is not of the form host:port")]
    InvalidServerAddress(String),
    /// Port part of the server address is not a valid port number.
    #[error("invalid port '{port}' in server address '{address}'")]
    InvalidPort { address: String, port: String },
    /// Worker queue capacity must be at least one.
    #[error("worker queue capacity must be >= 1")]
    InvalidQueueCapacity,
    /// The alert worker needs a tokio runtime to run on.
    #[error("alert worker requires a running tokio runtime")]
    NoRuntime,
    /// A sink is enabled but the collaborator it needs was not supplied.
    #[error("an enabled sink needs a {0} but none was supplied")]
    MissingCollaborator(&'static str),
    #[error(transparent)]
    InvalidRetry(#[from] RetryBuildError),
    /// Configuration sources could not be merged or extracted.
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Load(Box::new(err))
    }
}

/// The traceback normalizer was called on an event it cannot handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    /// The event carries no failure context.
    #[error("event has no failure attached; traceback normalization requires one")]
    MissingFailure,
    /// The failure has no stack frames.
    #[error("failure has an empty traceback")]
    EmptyTraceback,
}

/// Delivery collaborator failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The server could not be reached or the exchange failed.
    #[error("transport error: {0}")]
    Transport(String),
    /// The server rejected the credentials.
    #[error("authentication rejected: {0}")]
    Auth(String),
}

impl DeliveryError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Authentication failures will not succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// The log store rejected an append.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("log store unavailable: {0}")]
    Unavailable(String),
    #[error("log store rejected record: {0}")]
    Rejected(String),
    #[error("log store i/o error: {0}")]
    Io(#[from] io::Error),
}

impl StorageError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }
}

/// Error returned by a sink's `accept`.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    #[error("sink write failed: {0}")]
    Write(#[from] io::Error),
    /// The worker behind the sink has shut down.
    #[error("sink worker queue is closed")]
    QueueClosed,
    /// The worker queue had no room; the request was deferred rather than queued.
    #[error("sink worker queue is full")]
    QueueFull,
}
