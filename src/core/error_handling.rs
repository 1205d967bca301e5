//! Generic error handling utilities
//!
//! Fatal errors are reported through one function so the binary shows the
//! same shape of message whatever module the error came from.

/// Trait for errors that can distinguish between user-actionable and system errors
///
/// When `is_user_actionable()` returns `true`, `user_message()` should return
/// `Some(message)` with something the user can fix (a bad config value, a
/// missing file). System errors return `None` and are reported with the
/// operation context instead.
pub trait ContextualError: std::error::Error {
    fn is_user_actionable(&self) -> bool;

    fn user_message(&self) -> Option<&str>;
}

/// Log a fatal error with the detail level its kind calls for
///
/// # Examples
/// ```rust,no_run
/// # use ackgate::core::error_handling::log_error_with_context;
/// # use ackgate::consumer::ConsumerError;
/// let error = ConsumerError::InvalidConfiguration {
///     message: "batch-size must be greater than or equal to 1".to_string(),
/// };
/// log_error_with_context(&error, "Starting consumer");
/// // Logs: "FATAL: batch-size must be greater than or equal to 1"
/// ```
pub fn log_error_with_context<E: ContextualError + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    match error.user_message() {
        Some(user_msg) if error.is_user_actionable() => log::error!("FATAL: {}", user_msg),
        _ => log::error!("FATAL: {}: {}", operation_context, error),
    }
    log::debug!("DEBUG_DETAILS: {:?}", error);
}

/// Process exit code for a fatal error
pub fn exit_code_for<E: ContextualError>(error: &E) -> i32 {
    if error.is_user_actionable() {
        2
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::ConsumerError;
    use std::path::PathBuf;

    #[test]
    fn test_configuration_errors_exit_with_usage_code() {
        let error = ConsumerError::ConfigLoad {
            path: PathBuf::from("/nowhere/ackgate.toml"),
            message: "No such file or directory".to_string(),
        };
        assert!(error.is_user_actionable());
        assert_eq!(exit_code_for(&error), 2);
    }

    #[test]
    fn test_system_errors_exit_with_failure_code() {
        let error = ConsumerError::Runtime {
            message: "no reactor running".to_string(),
        };
        assert!(!error.is_user_actionable());
        assert_eq!(error.user_message(), None);
        assert_eq!(exit_code_for(&error), 1);

        // Must not panic without a logger installed
        log_error_with_context(&error, "Starting consumer");
    }
}
