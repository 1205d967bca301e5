//! Admission gate bounding the number of deliveries in the handler
//!
//! Every dispatched delivery holds one [`AdmissionPermit`]. Permits are
//! returned by [`AdmissionPermit::release`] or by dropping them, so a unit can
//! never be returned twice and the number of units in use always stays within
//! `[0, capacity]`.

use crate::consumer::error::{ConsumerError, ConsumerResult};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Counting gate sized to the consumer batch size
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl AdmissionGate {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free unit
    ///
    /// Fails with [`ConsumerError::GateClosed`] once [`close`](Self::close)
    /// has been called, including for callers already waiting.
    pub async fn acquire(&self) -> ConsumerResult<AdmissionPermit> {
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map(AdmissionPermit::new)
            .map_err(|_| ConsumerError::GateClosed)
    }

    /// Take a unit only if one is free right now
    #[cfg(test)]
    pub(crate) fn try_acquire(&self) -> Option<AdmissionPermit> {
        Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .ok()
            .map(AdmissionPermit::new)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Units currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Units currently held by dispatched deliveries
    pub fn in_use(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }

    /// Stop handing out units and wake every waiting acquire
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }
}

/// One unit of admission capacity
#[derive(Debug)]
#[must_use = "dropping a permit releases its admission unit immediately"]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionPermit {
    fn new(permit: OwnedSemaphorePermit) -> Self {
        Self { _permit: permit }
    }

    /// Return the unit to the gate
    pub fn release(self) {}
}
