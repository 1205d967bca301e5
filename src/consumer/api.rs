//! Public API for the consumer engine
//!
//! External modules should import from here rather than directly from internal modules.
//! See module documentation for usage examples and architecture details.

// Consumer and its configuration
pub use crate::consumer::config::{
    ConsumerConfig, DEFAULT_CONSUMER_TAG, DEFAULT_DISPOSE_TIMEOUT_SECS,
    DEFAULT_DRAIN_POLL_INTERVAL_MS, DEFAULT_END_OF_STREAM_BACKOFF_MS,
};
pub use crate::consumer::engine::Consumer;

// Handler contract
pub use crate::consumer::completion::Completion;
pub use crate::consumer::handler::{HandlerError, MessageHandler};

// Broker side
pub use crate::consumer::channel::{BrokerChannel, MemoryChannel};
pub use crate::consumer::delivery::{Delivery, ShutdownInitiator, ShutdownReason};

// Building blocks
pub use crate::consumer::admission::{AdmissionGate, AdmissionPermit};
pub use crate::consumer::queue::DeliveryQueue;

// Error handling
pub use crate::consumer::error::{ChannelError, ConsumerError, ConsumerResult};

// Lifecycle and diagnostics
pub use crate::consumer::events::{ConsumerEvent, ConsumerEventType, ConsumerState};
