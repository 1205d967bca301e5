//! Configuration file discovery and merging
//!
//! Precedence, lowest first: built-in defaults, the configuration file, the
//! command line.
//!
//! ```toml
//! log-level = "info"
//! log-format = "ext"
//! color = true
//!
//! [consumer]
//! consumer-tag = "billing"
//! batch-size = 8
//! auto-ack = false
//! dispose-timeout-secs = 10
//! ```

use crate::app::cli::Args;
use crate::app::demo::DemoSettings;
use crate::consumer::api::{ConsumerConfig, ConsumerError, ConsumerResult, DEFAULT_CONSUMER_TAG};
use crate::core::logging::LogFormat;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_BATCH_SIZE: usize = 4;

/// Contents of `ackgate.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct AppConfig {
    pub log_level: Option<String>,
    pub log_format: Option<String>,
    pub log_file: Option<PathBuf>,
    pub color: Option<bool>,
    pub consumer: Option<ConsumerSection>,
}

/// `[consumer]` table; every key optional so the command line can fill gaps
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConsumerSection {
    pub consumer_tag: Option<String>,
    pub batch_size: Option<usize>,
    pub auto_ack: Option<bool>,
    pub dispose_timeout_secs: Option<u64>,
    pub drain_poll_interval_ms: Option<u64>,
    pub end_of_stream_backoff_ms: Option<u64>,
    pub max_buffered: Option<usize>,
}

/// Logging options after merging the file with the command line
#[derive(Debug, Clone, PartialEq)]
pub struct LogSettings {
    pub level: Option<String>,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
    pub color: bool,
}

/// `<config dir>/ackgate/ackgate.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("ackgate").join("ackgate.toml"))
}

impl AppConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, String> {
        toml::from_str(contents).map_err(|e| e.to_string())
    }

    pub async fn load(path: &Path) -> ConsumerResult<Self> {
        let config_error = |message: String| ConsumerError::ConfigLoad {
            path: path.to_path_buf(),
            message,
        };
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| config_error(e.to_string()))?;
        Self::from_toml_str(&contents).map_err(config_error)
    }

    /// Load the explicit file, which must exist, or the default file if present
    pub async fn discover(explicit: Option<&Path>) -> ConsumerResult<(Option<PathBuf>, Self)> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => default_config_path().filter(|path| path.exists()),
        };

        match path {
            Some(path) => {
                let config = Self::load(&path).await?;
                Ok((Some(path), config))
            }
            None => Ok((None, Self::default())),
        }
    }

    pub fn log_settings(&self, args: &Args) -> ConsumerResult<LogSettings> {
        let format = match args.log_format.as_ref().or(self.log_format.as_ref()) {
            Some(name) => LogFormat::from_str(name).map_err(|_| ConsumerError::InvalidConfiguration {
                message: format!("unknown log-format '{}' (expected text, ext or json)", name),
            })?,
            None => LogFormat::default(),
        };

        let file = args
            .log_file
            .clone()
            .or_else(|| self.log_file.clone())
            .filter(|path| path.as_os_str() != "none");

        let color = args
            .color_override()
            .or(self.color)
            .unwrap_or_else(|| std::io::IsTerminal::is_terminal(&std::io::stdout()));

        Ok(LogSettings {
            level: args.log_level.clone().or_else(|| self.log_level.clone()),
            format,
            file,
            color,
        })
    }

    /// Build the validated consumer and demo settings
    pub fn demo_settings(&self, args: &Args) -> ConsumerResult<DemoSettings> {
        let section = self.consumer.clone().unwrap_or_default();

        let consumer_tag = args
            .consumer_tag
            .clone()
            .or(section.consumer_tag)
            .unwrap_or_else(|| DEFAULT_CONSUMER_TAG.to_string());
        let batch_size = args
            .batch_size
            .or(section.batch_size)
            .unwrap_or(DEFAULT_BATCH_SIZE);

        let mut consumer = ConsumerConfig::new(consumer_tag, batch_size);
        if args.manual_ack {
            consumer.auto_ack = false;
        } else if let Some(auto_ack) = section.auto_ack {
            consumer.auto_ack = auto_ack;
        }
        if let Some(timeout) = args.dispose_timeout {
            consumer = consumer.with_dispose_timeout(timeout);
        } else if let Some(secs) = section.dispose_timeout_secs {
            consumer.dispose_timeout_secs = secs;
        }
        if let Some(millis) = section.drain_poll_interval_ms {
            consumer.drain_poll_interval_ms = millis;
        }
        if let Some(millis) = section.end_of_stream_backoff_ms {
            consumer.end_of_stream_backoff_ms = millis;
        }
        consumer.max_buffered = section.max_buffered;
        consumer.validate()?;

        Ok(DemoSettings {
            consumer,
            messages: args.messages,
            work: args.work,
            decline_every: args.decline_every,
        })
    }
}
