//! Command line arguments

use crate::core::validation::{
    validate_consumer_tag, validate_millis, validate_positive_int, validate_seconds,
};
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

/// Command line options; unset options fall back to the configuration file
#[derive(Parser, Debug, Clone)]
#[command(name = "ackgate")]
#[command(about = "Bounded-concurrency message consumer running against an in-process broker")]
#[command(version)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Consumer tag reported in logs and deliveries
    #[arg(short = 't', long = "consumer-tag", value_name = "TAG", value_parser = validate_consumer_tag)]
    pub consumer_tag: Option<String>,

    /// Maximum deliveries in the handler at once
    #[arg(short = 'b', long = "batch-size", value_name = "COUNT", value_parser = validate_positive_int)]
    pub batch_size: Option<usize>,

    /// Deliveries the in-process broker publishes
    #[arg(short = 'n', long = "messages", value_name = "COUNT", default_value = "100", value_parser = validate_positive_int)]
    pub messages: usize,

    /// Simulated processing time per delivery
    #[arg(short = 'w', long = "work-ms", value_name = "MILLIS", default_value = "25", value_parser = validate_millis)]
    pub work: Duration,

    /// Acknowledge only deliveries the handler declines
    #[arg(long = "manual-ack", action = ArgAction::SetTrue)]
    pub manual_ack: bool,

    /// Decline every Nth delivery
    #[arg(long = "decline-every", value_name = "N", value_parser = validate_positive_int)]
    pub decline_every: Option<usize>,

    /// Seconds dispose waits for in-flight deliveries
    #[arg(long = "dispose-timeout", value_name = "SECS", value_parser = validate_seconds)]
    pub dispose_timeout: Option<Duration>,

    /// Log level
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(short = 'o', long = "log-format", value_name = "FORMAT", value_parser = ["text", "ext", "json"])]
    pub log_format: Option<String>,

    /// Log file path (use 'none' to disable file logging)
    #[arg(short = 'f', long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Force colored output
    #[arg(long = "color", action = ArgAction::SetTrue, conflicts_with = "no_color")]
    pub color: bool,

    /// Disable colored output
    #[arg(long = "no-color", action = ArgAction::SetTrue)]
    pub no_color: bool,
}

impl Args {
    /// `Some(true)` for --color, `Some(false)` for --no-color
    pub fn color_override(&self) -> Option<bool> {
        match (self.color, self.no_color) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["ackgate"]).unwrap();

        assert_eq!(args.messages, 100);
        assert_eq!(args.work, Duration::from_millis(25));
        assert_eq!(args.batch_size, None);
        assert!(!args.manual_ack);
        assert_eq!(args.color_override(), None);
    }

    #[test]
    fn test_all_options() {
        let args = Args::try_parse_from([
            "ackgate",
            "--config-file",
            "/tmp/ackgate.toml",
            "--consumer-tag",
            "billing",
            "-b",
            "8",
            "-n",
            "500",
            "--work-ms",
            "0",
            "--manual-ack",
            "--decline-every",
            "10",
            "--dispose-timeout",
            "5",
            "--log-level",
            "debug",
            "--log-format",
            "json",
            "--no-color",
        ])
        .unwrap();

        assert_eq!(args.config_file, Some(PathBuf::from("/tmp/ackgate.toml")));
        assert_eq!(args.consumer_tag.as_deref(), Some("billing"));
        assert_eq!(args.batch_size, Some(8));
        assert_eq!(args.messages, 500);
        assert_eq!(args.work, Duration::ZERO);
        assert!(args.manual_ack);
        assert_eq!(args.decline_every, Some(10));
        assert_eq!(args.dispose_timeout, Some(Duration::from_secs(5)));
        assert_eq!(args.log_format.as_deref(), Some("json"));
        assert_eq!(args.color_override(), Some(false));
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(Args::try_parse_from(["ackgate", "--batch-size", "0"]).is_err());
        assert!(Args::try_parse_from(["ackgate", "--consumer-tag", "a b"]).is_err());
        assert!(Args::try_parse_from(["ackgate", "--log-format", "xml"]).is_err());
        assert!(Args::try_parse_from(["ackgate", "--color", "--no-color"]).is_err());
    }
}
