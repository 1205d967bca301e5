//! Delivery queue between the broker receive path and the consumer loop
//!
//! The transport pushes deliveries from its own thread; the consumer loop pops
//! them in arrival order. Closing the queue is terminal: every pending and
//! future pop fails with [`ConsumerError::EndOfStream`].

use crate::consumer::delivery::Delivery;
use crate::consumer::error::{ConsumerError, ConsumerResult};
use crate::core::sync::handle_mutex_poison;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;

/// Ordered hand-off queue with a terminal closed state
#[derive(Debug)]
pub struct DeliveryQueue {
    /// Buffered deliveries in broker order
    deliveries: Mutex<VecDeque<Delivery>>,

    /// Wakes a pending pop on push, and all of them on close
    available: Notify,

    closed: AtomicBool,

    /// Maximum buffered deliveries, `None` for unbounded
    max_size: Option<usize>,

    queue_id: String,
}

impl DeliveryQueue {
    /// Create an unbounded queue
    pub fn new(queue_id: impl Into<String>) -> Self {
        Self::with_limit(queue_id.into(), None)
    }

    /// Create a queue that rejects pushes beyond `max_size` buffered deliveries
    pub fn bounded(queue_id: impl Into<String>, max_size: usize) -> Self {
        Self::with_limit(queue_id.into(), Some(max_size))
    }

    fn with_limit(queue_id: String, max_size: Option<usize>) -> Self {
        Self {
            deliveries: Mutex::new(VecDeque::new()),
            available: Notify::new(),
            closed: AtomicBool::new(false),
            max_size,
            queue_id,
        }
    }

    pub fn queue_id(&self) -> &str {
        &self.queue_id
    }

    /// Number of buffered deliveries not yet popped
    pub fn len(&self) -> usize {
        self.lock().map(|deliveries| deliveries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Append a delivery; called from the broker receive path
    pub fn push(&self, delivery: Delivery) -> ConsumerResult<()> {
        if self.is_closed() {
            return Err(ConsumerError::EndOfStream);
        }

        {
            let mut deliveries = self.lock()?;
            if let Some(max_size) = self.max_size {
                if deliveries.len() >= max_size {
                    return Err(ConsumerError::QueueFull { max_size });
                }
            }
            log::trace!(
                "Queue {}: buffered delivery {} ({} pending)",
                self.queue_id,
                delivery.delivery_tag,
                deliveries.len() + 1
            );
            deliveries.push_back(delivery);
        }

        self.available.notify_one();
        Ok(())
    }

    /// Wait for the next delivery in arrival order
    ///
    /// Fails with [`ConsumerError::EndOfStream`] once the queue is closed, even
    /// when deliveries are still buffered. Dropping the returned future before
    /// it completes never loses a delivery.
    pub async fn pop(&self) -> ConsumerResult<Delivery> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Register before checking state so a concurrent push or close is not missed
            notified.as_mut().enable();

            if self.is_closed() {
                return Err(ConsumerError::EndOfStream);
            }
            if let Some(delivery) = self.lock()?.pop_front() {
                return Ok(delivery);
            }

            notified.await;
        }
    }

    /// Close the queue; idempotent and irreversible
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            log::debug!("Queue {} closed with {} buffered deliveries", self.queue_id, self.len());
        }
        self.available.notify_waiters();
    }

    fn lock(&self) -> ConsumerResult<MutexGuard<'_, VecDeque<Delivery>>> {
        handle_mutex_poison(self.deliveries.lock(), |message| {
            ConsumerError::Synchronisation { message }
        })
    }
}
