//! Acknowledgement of settled deliveries
//!
//! A [`Completion`] travels with its delivery into the handler and carries the
//! delivery's admission unit. Whichever signal the handler raises, the order
//! is the same: acknowledge (or not, depending on the ack mode), release the
//! unit, then decrement the in-flight count.
//!
//! | signal          | auto-ack | manual ack |
//! |-----------------|----------|------------|
//! | `complete`      | ack      | no ack     |
//! | `not_handled`   | no ack   | ack        |
//!
//! Nothing is acknowledged once the consumer is disposed. Ack failures are
//! logged and dropped, never retried.

use crate::consumer::admission::AdmissionPermit;
use crate::consumer::engine::ConsumerCore;
use crate::consumer::events::ConsumerEventType;
use std::fmt;
use std::sync::Arc;

/// Settlement handle for one dispatched delivery
#[must_use = "a delivery stays in flight until its completion is signalled"]
pub struct Completion {
    delivery_tag: u64,
    core: Arc<ConsumerCore>,
    permit: Option<AdmissionPermit>,
}

impl Completion {
    pub(crate) fn new(delivery_tag: u64, core: Arc<ConsumerCore>, permit: AdmissionPermit) -> Self {
        Self {
            delivery_tag,
            core,
            permit: Some(permit),
        }
    }

    pub fn delivery_tag(&self) -> u64 {
        self.delivery_tag
    }

    /// The handler finished processing the delivery
    pub fn complete(mut self) {
        if self.core.auto_ack() && !self.core.is_disposed() {
            log::trace!(
                "Consumer {}: delivery {} finished, acknowledging",
                self.core.consumer_tag(),
                self.delivery_tag
            );
            self.acknowledge();
        }
        self.core
            .emit(ConsumerEventType::Completed, Some(self.delivery_tag), None);
        self.settle();
    }

    /// The handler declined the delivery
    ///
    /// With manual acknowledgement the delivery is still acked, so a message
    /// no handler wants is removed instead of being redelivered forever.
    pub fn not_handled(mut self) {
        log::debug!(
            "Consumer {}: delivery {} was not handled",
            self.core.consumer_tag(),
            self.delivery_tag
        );
        if !self.core.auto_ack() && !self.core.is_disposed() {
            self.acknowledge();
        }
        self.core
            .emit(ConsumerEventType::NotHandled, Some(self.delivery_tag), None);
        self.settle();
    }

    fn acknowledge(&self) {
        let consumer_tag = self.core.consumer_tag();
        let channel = self.core.channel();

        if !channel.is_open() {
            log::warn!(
                "Consumer {}: channel closed, cannot ack delivery {}; it will be redelivered",
                consumer_tag,
                self.delivery_tag
            );
            self.core.emit(
                ConsumerEventType::AckFailed,
                Some(self.delivery_tag),
                Some("channel closed".to_string()),
            );
            return;
        }

        match channel.ack(self.delivery_tag) {
            Ok(()) => {
                log::debug!("Consumer {}: acked delivery {}", consumer_tag, self.delivery_tag);
                self.core
                    .emit(ConsumerEventType::Acknowledged, Some(self.delivery_tag), None);
            }
            Err(error) => {
                log::error!(
                    "Consumer {}: failed to ack delivery {}: {}",
                    consumer_tag,
                    self.delivery_tag,
                    error
                );
                self.core.emit(
                    ConsumerEventType::AckFailed,
                    Some(self.delivery_tag),
                    Some(error.to_string()),
                );
            }
        }
    }

    fn settle(&mut self) {
        if let Some(permit) = self.permit.take() {
            permit.release();
            self.core.finish_delivery();
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if self.permit.is_some() {
            log::warn!(
                "Consumer {}: delivery {} dropped without a completion signal, releasing it unacknowledged",
                self.core.consumer_tag(),
                self.delivery_tag
            );
            self.core
                .emit(ConsumerEventType::Abandoned, Some(self.delivery_tag), None);
            self.settle();
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("delivery_tag", &self.delivery_tag)
            .field("consumer_tag", &self.core.consumer_tag())
            .field("settled", &self.permit.is_none())
            .finish()
    }
}
