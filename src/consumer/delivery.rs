//! Delivery types handed from the broker transport to the consumer
//!
//! A delivery is one broker message in flight. The delivery tag is assigned
//! by the channel and identifies exactly that message when acknowledging it;
//! routing metadata is carried only for diagnostics.

use std::time::SystemTime;

/// One broker message owned by the consumer from pop until it is settled
///
/// # Example
///
/// ```rust
/// use ackgate::consumer::Delivery;
///
/// let delivery = Delivery::new(1, "orders.created", b"{\"id\":42}".to_vec())
///     .with_correlation_id("req-42")
///     .with_consumer_tag("orders-worker");
///
/// assert_eq!(delivery.delivery_tag, 1);
/// assert_eq!(delivery.correlation_id.as_deref(), Some("req-42"));
/// ```
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Channel-scoped identifier used to acknowledge this message
    pub delivery_tag: u64,
    /// Identifier of the consumer the broker delivered to
    pub consumer_tag: String,
    /// Routing key the message was published with
    pub routing_key: String,
    /// Correlation id from the message properties, if any
    pub correlation_id: Option<String>,
    /// Set when the broker has delivered this message before
    pub redelivered: bool,
    /// Time the transport handed the delivery over
    pub received_at: SystemTime,
    /// Opaque payload passed to the handler untouched
    pub body: Vec<u8>,
}

impl Delivery {
    pub fn new(delivery_tag: u64, routing_key: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            delivery_tag,
            consumer_tag: String::new(),
            routing_key: routing_key.into(),
            correlation_id: None,
            redelivered: false,
            received_at: SystemTime::now(),
            body,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_consumer_tag(mut self, consumer_tag: impl Into<String>) -> Self {
        self.consumer_tag = consumer_tag.into();
        self
    }

    pub fn with_redelivered(mut self, redelivered: bool) -> Self {
        self.redelivered = redelivered;
        self
    }

    pub fn body_len(&self) -> usize {
        self.body.len()
    }
}

/// Which side closed the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum ShutdownInitiator {
    Application,
    Library,
    Peer,
}

/// Channel shutdown notification as reported by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReason {
    pub initiator: ShutdownInitiator,
    pub reply_code: u16,
    pub reply_text: String,
}

impl ShutdownReason {
    pub fn new(initiator: ShutdownInitiator, reply_code: u16, reply_text: impl Into<String>) -> Self {
        Self {
            initiator,
            reply_code,
            reply_text: reply_text.into(),
        }
    }

    /// Connection lost underneath the channel
    pub fn connection_lost(reply_text: impl Into<String>) -> Self {
        Self::new(ShutdownInitiator::Library, 541, reply_text)
    }
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({} by {})",
            self.reply_text, self.reply_code, self.initiator
        )
    }
}
