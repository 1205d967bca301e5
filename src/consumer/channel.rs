//! Broker channel capability used for acknowledgement
//!
//! The consumer owns an `Arc<dyn BrokerChannel>` rather than extending a
//! transport type. Only positive acknowledgement is used; unhandled
//! deliveries are acked too (see [`Completion`](crate::consumer::Completion)).

use crate::consumer::delivery::Delivery;
use crate::consumer::error::ChannelError;
use crate::core::sync::handle_mutex_poison;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

pub trait BrokerChannel: Send + Sync {
    /// Acknowledge exactly one delivery
    fn ack(&self, delivery_tag: u64) -> Result<(), ChannelError>;

    /// Whether the channel can still carry acknowledgements
    fn is_open(&self) -> bool {
        true
    }

    /// Ask the broker to redeliver unacknowledged deliveries
    fn recover(&self, _requeue: bool) -> Result<(), ChannelError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Ledger {
    unacked: BTreeSet<u64>,
    acked: Vec<u64>,
}

/// In-process channel that hands out tagged deliveries and records acks
///
/// Acking a tag that was never delivered, or acking the same tag twice,
/// fails with [`ChannelError::UnknownDeliveryTag`] the way a real broker
/// would close the channel for it.
///
/// # Example
///
/// ```rust
/// use ackgate::consumer::{BrokerChannel, MemoryChannel};
///
/// let channel = MemoryChannel::new("orders-worker");
/// let delivery = channel.next_delivery("orders.created", b"{}".to_vec());
///
/// channel.ack(delivery.delivery_tag).unwrap();
/// assert!(channel.ack(delivery.delivery_tag).is_err());
/// assert_eq!(channel.acked(), vec![delivery.delivery_tag]);
/// ```
#[derive(Debug)]
pub struct MemoryChannel {
    consumer_tag: String,
    next_tag: AtomicU64,
    open: AtomicBool,
    close_reason: Mutex<Option<String>>,
    ledger: Mutex<Ledger>,
    failed_acks: AtomicUsize,
    recover_calls: AtomicUsize,
}

impl MemoryChannel {
    pub fn new(consumer_tag: impl Into<String>) -> Self {
        Self {
            consumer_tag: consumer_tag.into(),
            next_tag: AtomicU64::new(1),
            open: AtomicBool::new(true),
            close_reason: Mutex::new(None),
            ledger: Mutex::new(Ledger::default()),
            failed_acks: AtomicUsize::new(0),
            recover_calls: AtomicUsize::new(0),
        }
    }

    /// Produce the next delivery with a fresh, monotonically assigned tag
    pub fn next_delivery(&self, routing_key: impl Into<String>, body: Vec<u8>) -> Delivery {
        let delivery_tag = self.next_tag.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut ledger) = self.ledger.lock() {
            ledger.unacked.insert(delivery_tag);
        }
        Delivery::new(delivery_tag, routing_key, body).with_consumer_tag(self.consumer_tag.clone())
    }

    /// Close the channel; later acks fail with [`ChannelError::Closed`]
    pub fn close(&self, reason: impl Into<String>) {
        if let Ok(mut close_reason) = self.close_reason.lock() {
            close_reason.get_or_insert_with(|| reason.into());
        }
        self.open.store(false, Ordering::Release);
    }

    /// Tags acknowledged so far, in acknowledgement order
    pub fn acked(&self) -> Vec<u64> {
        self.ledger
            .lock()
            .map(|ledger| ledger.acked.clone())
            .unwrap_or_default()
    }

    /// Tags delivered but not yet acknowledged, ascending
    pub fn unacked(&self) -> Vec<u64> {
        self.ledger
            .lock()
            .map(|ledger| ledger.unacked.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn ack_count(&self) -> usize {
        self.ledger.lock().map(|ledger| ledger.acked.len()).unwrap_or(0)
    }

    pub fn failed_acks(&self) -> usize {
        self.failed_acks.load(Ordering::SeqCst)
    }

    pub fn recover_calls(&self) -> usize {
        self.recover_calls.load(Ordering::SeqCst)
    }

    fn closed_error(&self) -> ChannelError {
        let reason = self
            .close_reason
            .lock()
            .ok()
            .and_then(|reason| reason.clone())
            .unwrap_or_else(|| "closed".to_string());
        ChannelError::Closed { reason }
    }
}

impl BrokerChannel for MemoryChannel {
    fn ack(&self, delivery_tag: u64) -> Result<(), ChannelError> {
        if !self.is_open() {
            self.failed_acks.fetch_add(1, Ordering::SeqCst);
            return Err(self.closed_error());
        }

        let mut ledger = handle_mutex_poison(self.ledger.lock(), |message| {
            ChannelError::Transport { message }
        })?;
        if ledger.unacked.remove(&delivery_tag) {
            ledger.acked.push(delivery_tag);
            Ok(())
        } else {
            self.failed_acks.fetch_add(1, Ordering::SeqCst);
            Err(ChannelError::UnknownDeliveryTag { tag: delivery_tag })
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn recover(&self, _requeue: bool) -> Result<(), ChannelError> {
        self.recover_calls.fetch_add(1, Ordering::SeqCst);
        if self.is_open() {
            Ok(())
        } else {
            Err(self.closed_error())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_monotonic() {
        let channel = MemoryChannel::new("c");
        let first = channel.next_delivery("a", vec![]);
        let second = channel.next_delivery("b", vec![]);

        assert_eq!(first.delivery_tag, 1);
        assert_eq!(second.delivery_tag, 2);
        assert_eq!(first.consumer_tag, "c");
        assert_eq!(channel.unacked(), vec![1, 2]);
    }

    #[test]
    fn test_ack_is_exactly_once() {
        let channel = MemoryChannel::new("c");
        let delivery = channel.next_delivery("a", vec![]);

        assert!(channel.ack(delivery.delivery_tag).is_ok());
        assert_eq!(
            channel.ack(delivery.delivery_tag),
            Err(ChannelError::UnknownDeliveryTag {
                tag: delivery.delivery_tag
            })
        );
        assert_eq!(channel.acked(), vec![1]);
        assert_eq!(channel.failed_acks(), 1);
        assert!(channel.unacked().is_empty());
    }

    #[test]
    fn test_closed_channel_rejects_acks() {
        let channel = MemoryChannel::new("c");
        let delivery = channel.next_delivery("a", vec![]);
        channel.close("connection reset");

        assert!(!channel.is_open());
        assert_eq!(
            channel.ack(delivery.delivery_tag),
            Err(ChannelError::Closed {
                reason: "connection reset".to_string()
            })
        );
        assert!(channel.recover(true).is_err());
        assert_eq!(channel.recover_calls(), 1);
        assert_eq!(channel.unacked(), vec![1]);
    }
}
