//! Consumer Error Types

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    #[error("Invalid consumer configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("Failed to load configuration from {}: {message}", path.display())]
    ConfigLoad { path: PathBuf, message: String },

    #[error("Delivery queue is full (max size: {max_size})")]
    QueueFull { max_size: usize },

    #[error("Delivery queue is closed")]
    EndOfStream,

    #[error("Admission gate is closed")]
    GateClosed,

    #[error("Message handler malfunctioned on delivery {delivery_tag}: {message}")]
    HandlerMalfunction { delivery_tag: u64, message: String },

    #[error("Synchronisation failure: {message}")]
    Synchronisation { message: String },

    #[error("Runtime unavailable: {message}")]
    Runtime { message: String },
}

impl crate::core::error_handling::ContextualError for ConsumerError {
    fn is_user_actionable(&self) -> bool {
        matches!(
            self,
            ConsumerError::InvalidConfiguration { .. } | ConsumerError::ConfigLoad { .. }
        )
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ConsumerError::InvalidConfiguration { message } => Some(message),
            ConsumerError::ConfigLoad { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Errors reported by a broker channel when acknowledging or recovering
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel is closed: {reason}")]
    Closed { reason: String },

    #[error("Unknown delivery tag: {tag}")]
    UnknownDeliveryTag { tag: u64 },

    #[error("Transport failure: {message}")]
    Transport { message: String },
}

/// Result type for consumer operations
pub type ConsumerResult<T> = Result<T, ConsumerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error_handling::ContextualError;

    #[test]
    fn test_configuration_errors_are_user_actionable() {
        let error = ConsumerError::InvalidConfiguration {
            message: "batch-size must be greater than or equal to 1".to_string(),
        };
        assert!(error.is_user_actionable());
        assert_eq!(
            error.user_message(),
            Some("batch-size must be greater than or equal to 1")
        );
    }

    #[test]
    fn test_runtime_errors_are_not_user_actionable() {
        let error = ConsumerError::HandlerMalfunction {
            delivery_tag: 7,
            message: "boom".to_string(),
        };
        assert!(!error.is_user_actionable());
        assert_eq!(error.user_message(), None);
        assert_eq!(
            error.to_string(),
            "Message handler malfunctioned on delivery 7: boom"
        );
    }
}
