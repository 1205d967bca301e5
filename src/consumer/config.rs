//! Consumer configuration
//!
//! All settings are fixed at construction; there is no runtime
//! reconfiguration. The TOML form uses kebab-case keys:
//!
//! ```toml
//! consumer-tag = "orders-worker"
//! batch-size = 8
//! auto-ack = true
//! dispose-timeout-secs = 30
//! max-buffered = 1000
//! ```

use crate::consumer::error::{ConsumerError, ConsumerResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONSUMER_TAG: &str = "ackgate";
pub const DEFAULT_DISPOSE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_DRAIN_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_END_OF_STREAM_BACKOFF_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConsumerConfig {
    /// Identifier used in diagnostics and on every delivery
    #[serde(default = "default_consumer_tag")]
    pub consumer_tag: String,

    /// Maximum deliveries in the handler at once
    pub batch_size: usize,

    /// Acknowledge on the handler's behalf when it completes
    #[serde(default = "default_auto_ack")]
    pub auto_ack: bool,

    /// Upper bound on the drain wait during disposal
    #[serde(default = "default_dispose_timeout_secs")]
    pub dispose_timeout_secs: u64,

    /// How often the drain re-checks the in-flight count
    #[serde(default = "default_drain_poll_interval_ms")]
    pub drain_poll_interval_ms: u64,

    /// Pause after a pop hits a closed queue
    #[serde(default = "default_end_of_stream_backoff_ms")]
    pub end_of_stream_backoff_ms: u64,

    /// Deliveries the queue buffers before pushes are refused, unbounded if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_buffered: Option<usize>,
}

fn default_consumer_tag() -> String {
    DEFAULT_CONSUMER_TAG.to_string()
}

fn default_auto_ack() -> bool {
    true
}

fn default_dispose_timeout_secs() -> u64 {
    DEFAULT_DISPOSE_TIMEOUT_SECS
}

fn default_drain_poll_interval_ms() -> u64 {
    DEFAULT_DRAIN_POLL_INTERVAL_MS
}

fn default_end_of_stream_backoff_ms() -> u64 {
    DEFAULT_END_OF_STREAM_BACKOFF_MS
}

impl ConsumerConfig {
    /// Create a configuration with default timings and auto-ack enabled
    ///
    /// # Example
    ///
    /// ```
    /// use ackgate::consumer::ConsumerConfig;
    /// use std::time::Duration;
    ///
    /// let config = ConsumerConfig::new("orders-worker", 8)
    ///     .with_auto_ack(false)
    ///     .with_dispose_timeout(Duration::from_secs(10));
    ///
    /// assert!(config.validate().is_ok());
    /// assert_eq!(config.dispose_timeout(), Duration::from_secs(10));
    /// ```
    pub fn new(consumer_tag: impl Into<String>, batch_size: usize) -> Self {
        Self {
            consumer_tag: consumer_tag.into(),
            batch_size,
            auto_ack: default_auto_ack(),
            dispose_timeout_secs: DEFAULT_DISPOSE_TIMEOUT_SECS,
            drain_poll_interval_ms: DEFAULT_DRAIN_POLL_INTERVAL_MS,
            end_of_stream_backoff_ms: DEFAULT_END_OF_STREAM_BACKOFF_MS,
            max_buffered: None,
        }
    }

    pub fn with_auto_ack(mut self, auto_ack: bool) -> Self {
        self.auto_ack = auto_ack;
        self
    }

    /// Whole seconds; sub-second parts are dropped
    pub fn with_dispose_timeout(mut self, timeout: Duration) -> Self {
        self.dispose_timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_drain_poll_interval(mut self, interval: Duration) -> Self {
        self.drain_poll_interval_ms = saturating_millis(interval);
        self
    }

    pub fn with_end_of_stream_backoff(mut self, backoff: Duration) -> Self {
        self.end_of_stream_backoff_ms = saturating_millis(backoff);
        self
    }

    pub fn with_max_buffered(mut self, max_buffered: usize) -> Self {
        self.max_buffered = Some(max_buffered);
        self
    }

    pub fn dispose_timeout(&self) -> Duration {
        Duration::from_secs(self.dispose_timeout_secs)
    }

    pub fn drain_poll_interval(&self) -> Duration {
        Duration::from_millis(self.drain_poll_interval_ms)
    }

    pub fn end_of_stream_backoff(&self) -> Duration {
        Duration::from_millis(self.end_of_stream_backoff_ms)
    }

    /// Reject settings the consumer cannot run with
    pub fn validate(&self) -> ConsumerResult<()> {
        if self.batch_size < 1 {
            return Err(invalid("batch-size must be greater than or equal to 1"));
        }
        if self.consumer_tag.trim().is_empty() {
            return Err(invalid("consumer-tag cannot be empty"));
        }
        if self.drain_poll_interval_ms == 0 {
            return Err(invalid("drain-poll-interval-ms must be greater than 0"));
        }
        if self.max_buffered == Some(0) {
            return Err(invalid("max-buffered must be greater than 0"));
        }
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> ConsumerResult<Self> {
        let config: Self = toml::from_str(contents).map_err(|e| invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub async fn load(path: impl AsRef<Path>) -> ConsumerResult<Self> {
        let path = path.as_ref();
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| ConsumerError::ConfigLoad {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;

        Self::from_toml_str(&contents).map_err(|e| match e {
            ConsumerError::InvalidConfiguration { message } => ConsumerError::ConfigLoad {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn invalid(message: impl Into<String>) -> ConsumerError {
    ConsumerError::InvalidConfiguration {
        message: message.into(),
    }
}
