//! Pipeline configuration.
//!
//! [`PipelineConfig`] is loaded with `figment`: built-in defaults, then an optional TOML file,
//! then `LOGFAN_`-prefixed environment variables (`__` separates nested keys, e.g.
//! `LOGFAN_ALERT__CAPACITY=10`). [`PipelineConfig::build`] turns it into a ready [`Pipeline`]
//! with console, store and alert sinks attached in that order.
//!
//! ```toml
//! [console]
//! min_level = "info"
//!
//! [store]
//! strip_prefix = "/opt/station"
//!
//! [alert]
//! enabled = true
//! server_port = "smtp.example.org:587"
//! user = "station@example.org"
//! password = "secret"
//! recipient = "ops@example.org; oncall@example.org"
//! station_id = "pv-7"
//! ```

use crate::alert::{BufferedAlertSink, DEFAULT_CAPACITY};
use crate::backoff::Backoff;
use crate::console::ConsoleSink;
use crate::digest::DigestLayout;
use crate::error::ConfigError;
use crate::event::Level;
use crate::format::{PatternFormatter, DEFAULT_DATE_FORMAT};
use crate::mail::MailSender;
use crate::persist::{LogStore, PersistenceSink};
use crate::pipeline::Pipeline;
use crate::retry::DeliveryRetry;
use crate::target::{Credentials, DeliveryTarget, DEFAULT_PRODUCT};
use crate::traceback::TracebackNormalizer;
use crate::worker::AlertWorker;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "LOGFAN_";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub console: ConsoleConfig,
    pub store: StoreConfig,
    pub alert: AlertConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub min_level: Level,
    /// chrono format string for the timestamp column.
    pub date_format: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self { enabled: true, min_level: Level::Debug, date_format: DEFAULT_DATE_FORMAT.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub enabled: bool,
    pub min_level: Level,
    /// Install root replaced by `.` in normalized tracebacks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strip_prefix: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { enabled: true, min_level: Level::Debug, strip_prefix: None }
    }
}

/// Email digest settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub enabled: bool,
    pub min_level: Level,
    /// Events per digest.
    pub capacity: usize,
    /// `host:port` of the mail server.
    pub server_port: String,
    /// Login user, also used as the sender address.
    pub user: String,
    pub password: String,
    /// Comma or semicolon separated recipients.
    pub recipient: String,
    pub station_id: String,
    pub product: String,
    pub layout: DigestLayout,
    pub critical_copy: bool,
    /// Total delivery attempts per digest; 1 disables retry.
    pub max_attempts: usize,
    pub backoff_secs: u64,
    /// Run the sink behind an [`AlertWorker`] with this queue size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_queue: Option<usize>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_level: Level::Warning,
            capacity: DEFAULT_CAPACITY,
            server_port: String::new(),
            user: String::new(),
            password: String::new(),
            recipient: String::new(),
            station_id: String::new(),
            product: DEFAULT_PRODUCT.to_string(),
            layout: DigestLayout::Merged,
            critical_copy: false,
            max_attempts: 1,
            backoff_secs: 5,
            worker_queue: None,
        }
    }
}

impl fmt::Debug for AlertConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertConfig")
            .field("enabled", &self.enabled)
            .field("min_level", &self.min_level)
            .field("capacity", &self.capacity)
            .field("server_port", &self.server_port)
            .field("user", &self.user)
            .field("recipient", &self.recipient)
            .field("station_id", &self.station_id)
            .field("product", &self.product)
            .field("layout", &self.layout)
            .field("critical_copy", &self.critical_copy)
            .field("max_attempts", &self.max_attempts)
            .field("backoff_secs", &self.backoff_secs)
            .field("worker_queue", &self.worker_queue)
            .finish_non_exhaustive()
    }
}

impl AlertConfig {
    /// Validate the delivery fields into a [`DeliveryTarget`].
    pub fn delivery_target(&self) -> Result<DeliveryTarget, ConfigError> {
        let target = DeliveryTarget::new(
            &self.server_port,
            Credentials::new(self.user.clone(), self.password.clone()),
            self.user.clone(),
            &self.recipient,
            self.station_id.clone(),
        )?;
        Ok(target.with_product(self.product.clone()))
    }

    pub fn retry(&self) -> Result<DeliveryRetry, ConfigError> {
        Ok(DeliveryRetry::builder()
            .max_attempts(self.max_attempts)
            .backoff(Backoff::exponential(Duration::from_secs(self.backoff_secs)))
            .build()?)
    }
}

/// The external collaborators a configured pipeline needs.
#[derive(Default)]
pub struct Collaborators {
    /// Required when the store sink is enabled.
    pub store: Option<Arc<dyn LogStore>>,
    /// Required when the alert sink is enabled.
    pub mailer: Option<Arc<dyn MailSender>>,
    /// Console destination; standard error when absent.
    pub console: Option<Box<dyn Write + Send>>,
}

impl Collaborators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store<S: LogStore + 'static>(mut self, store: S) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    pub fn with_mailer<M: MailSender + 'static>(mut self, mailer: M) -> Self {
        self.mailer = Some(Arc::new(mailer));
        self
    }

    pub fn with_console<W: Write + Send + 'static>(mut self, writer: W) -> Self {
        self.console = Some(Box::new(writer));
        self
    }
}

/// A built pipeline plus handles to the alert sink for explicit flush or shutdown.
#[derive(Debug)]
pub struct AssembledPipeline {
    pub pipeline: Pipeline,
    pub alert: Option<Arc<BufferedAlertSink>>,
    pub worker: Option<AlertWorker>,
}

impl PipelineConfig {
    /// Defaults, then `path` if it exists, then environment overrides.
    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(PipelineConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment(path))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        Ok(figment.extract()?)
    }

    /// Attach the enabled sinks to a new pipeline. The alert worker, when configured, is spawned
    /// on the current tokio runtime.
    pub fn build(&self, collaborators: Collaborators) -> Result<AssembledPipeline, ConfigError> {
        let Collaborators { store, mailer, console } = collaborators;
        let pipeline = Pipeline::new();

        if self.console.enabled {
            let formatter =
                PatternFormatter::new().with_date_format(self.console.date_format.clone()).shared();
            let sink = match console {
                Some(writer) => ConsoleSink::with_writer(writer),
                None => ConsoleSink::stderr(),
            };
            pipeline.attach(sink.with_formatter(formatter), self.console.min_level);
        }

        if self.store.enabled {
            let store = store.ok_or(ConfigError::MissingCollaborator("log store"))?;
            let normalizer = match &self.store.strip_prefix {
                Some(prefix) => TracebackNormalizer::with_strip_prefix(prefix.clone()),
                None => TracebackNormalizer::new(),
            };
            pipeline
                .attach(PersistenceSink::new(store).with_normalizer(normalizer), self.store.min_level);
        }

        let mut alert_handle = None;
        let mut worker = None;
        if self.alert.enabled {
            let mailer = mailer.ok_or(ConfigError::MissingCollaborator("mail sender"))?;
            let alert = Arc::new(
                BufferedAlertSink::new(self.alert.delivery_target()?, self.alert.capacity, mailer)?
                    .with_layout(self.alert.layout)
                    .with_critical_copy(self.alert.critical_copy)
                    .with_retry(self.alert.retry()?),
            );
            match self.alert.worker_queue {
                Some(queue) => {
                    let spawned = AlertWorker::spawn(alert.clone(), queue)?;
                    pipeline.attach(spawned.clone(), self.alert.min_level);
                    worker = Some(spawned);
                }
                None => pipeline.attach(alert.clone(), self.alert.min_level),
            }
            alert_handle = Some(alert);
        }

        debug!(sinks = pipeline.len(), "log pipeline assembled");
        Ok(AssembledPipeline { pipeline, alert: alert_handle, worker })
    }
}
