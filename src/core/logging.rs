//! Logging backend
//!
//! The crate logs through the `log` facade; the binary installs a
//! `flexi_logger` backend with one of three line formats.

use colored::Colorize;
use flexi_logger::{DeferredNow, FileSpec, FormatFunction, Logger, LoggerHandle};
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

static LOGGER_HANDLE: OnceLock<Mutex<LoggerHandle>> = OnceLock::new();

/// Log line layout
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::VariantNames,
)]
#[strum(serialize_all = "lowercase")]
pub enum LogFormat {
    /// Timestamp, level and message
    #[default]
    Text,
    /// Text plus the source location
    Ext,
    /// One JSON object per line
    Json,
}

/// Install the global logger
///
/// Can only succeed once per process; later calls return the backend's
/// "already initialized" error.
pub fn init_logging(
    log_level: Option<&str>,
    log_format: LogFormat,
    log_file: Option<&Path>,
    color_enabled: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut logger = Logger::try_with_str(log_level.unwrap_or("info"))?
        .format(format_function(log_format, color_enabled && log_file.is_none()));

    if let Some(path) = log_file {
        logger = logger.log_to_file(FileSpec::try_from(path)?);
    }

    let handle = logger.start()?;
    let _ = LOGGER_HANDLE.set(Mutex::new(handle));
    Ok(())
}

/// Flush buffered output, if a logger was installed
pub fn flush_logging() {
    if let Some(handle) = LOGGER_HANDLE.get() {
        if let Ok(handle) = handle.lock() {
            handle.flush();
        }
    }
}

fn format_function(log_format: LogFormat, color_enabled: bool) -> FormatFunction {
    match (log_format, color_enabled) {
        (LogFormat::Json, _) => json_format,
        (LogFormat::Ext, true) => extended_color_format,
        (LogFormat::Ext, false) => extended_format,
        (LogFormat::Text, true) => simple_color_format,
        (LogFormat::Text, false) => simple_format,
    }
}

fn level_tag(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "ERR",
        log::Level::Warn => "WRN",
        log::Level::Info => "INF",
        log::Level::Debug => "DBG",
        log::Level::Trace => "TRC",
    }
}

fn colored_level_tag(level: log::Level) -> colored::ColoredString {
    let tag = level_tag(level);
    match level {
        log::Level::Error => tag.red().bold(),
        log::Level::Warn => tag.yellow(),
        log::Level::Info => tag.green(),
        log::Level::Debug => tag.blue(),
        log::Level::Trace => tag.magenta(),
    }
}

fn timestamp(now: &mut DeferredNow) -> String {
    now.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

// "2025-01-01 12:00:00.000 INF message"
fn simple_format(
    w: &mut dyn Write,
    now: &mut DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    write!(
        w,
        "{} {} {}",
        timestamp(now),
        level_tag(record.level()),
        record.args()
    )
}

fn simple_color_format(
    w: &mut dyn Write,
    now: &mut DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    write!(
        w,
        "{} {} {}",
        timestamp(now).dimmed(),
        colored_level_tag(record.level()),
        record.args()
    )
}

// "2025-01-01 12:00:00.000 INF message (consumer/engine.rs:42)"
fn extended_format(
    w: &mut dyn Write,
    now: &mut DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    write!(
        w,
        "{} {} {} ({})",
        timestamp(now),
        level_tag(record.level()),
        record.args(),
        format_target_as_path(record.target(), record.line())
    )
}

fn extended_color_format(
    w: &mut dyn Write,
    now: &mut DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    write!(
        w,
        "{} {} {} ({})",
        timestamp(now).dimmed(),
        colored_level_tag(record.level()),
        record.args(),
        format_target_as_path(record.target(), record.line()).dimmed()
    )
}

fn json_format(
    w: &mut dyn Write,
    now: &mut DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    let line = serde_json::json!({
        "timestamp": now.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        "level": level_tag(record.level()),
        "message": record.args().to_string(),
        "target": format_target_as_path(record.target(), record.line()),
    });

    match serde_json::to_string(&line) {
        Ok(json) => w.write_all(json.as_bytes()),
        Err(_) => w.write_all(b"{\"error\":\"Failed to serialize log message\"}"),
    }
}

// ackgate::consumer::engine -> consumer/engine.rs:NN
fn format_target_as_path(target: &str, line: Option<u32>) -> String {
    let path_like = match target.strip_prefix("ackgate::") {
        Some(module) => module.replace("::", "/") + ".rs",
        None => target.replace("::", "/"),
    };

    match line {
        Some(line) => format!("{}:{}", path_like, line),
        None => path_like,
    }
}
