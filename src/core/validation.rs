//! Validation utilities for CLI arguments
//!
//! Each function has the shape clap expects from a `value_parser`.

use std::time::Duration;

/// Validate positive integer value
pub fn validate_positive_int(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("Value must be greater than 0".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("'{}' is not a valid positive integer", value)),
    }
}

/// Validate a consumer tag: non-blank, no whitespace, at most 255 bytes
pub fn validate_consumer_tag(value: &str) -> Result<String, String> {
    if value.trim().is_empty() {
        return Err("Consumer tag cannot be empty".to_string());
    }
    if value.chars().any(char::is_whitespace) {
        return Err(format!("Consumer tag '{}' cannot contain whitespace", value));
    }
    // AMQP short string limit
    if value.len() > 255 {
        return Err("Consumer tag cannot be longer than 255 bytes".to_string());
    }
    Ok(value.to_string())
}

/// Validate a duration given in whole seconds (zero allowed)
pub fn validate_seconds(value: &str) -> Result<Duration, String> {
    value
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| format!("'{}' is not a valid number of seconds", value))
}

/// Validate a duration given in milliseconds (zero allowed)
pub fn validate_millis(value: &str) -> Result<Duration, String> {
    value
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| format!("'{}' is not a valid number of milliseconds", value))
}
