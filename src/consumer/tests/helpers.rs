//! Shared fixtures for consumer tests

use crate::consumer::api::{
    Completion, ConsumerConfig, ConsumerEvent, ConsumerEventType, Delivery, HandlerError,
    MessageHandler,
};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{sleep, Instant};

/// Config with short poll and backoff intervals so tests run quickly
pub fn fast_config(consumer_tag: &str, batch_size: usize) -> ConsumerConfig {
    ConsumerConfig::new(consumer_tag, batch_size)
        .with_drain_poll_interval(Duration::from_millis(10))
        .with_end_of_stream_backoff(Duration::from_millis(10))
        .with_dispose_timeout(Duration::from_secs(5))
}

/// Handler that keeps every completion until the test settles it
#[derive(Default)]
pub struct ParkingHandler {
    parked: Mutex<Vec<Completion>>,
    seen: Mutex<Vec<u64>>,
}

impl ParkingHandler {
    pub fn parked_count(&self) -> usize {
        self.parked.lock().unwrap().len()
    }

    /// Delivery tags in dispatch order
    pub fn seen_tags(&self) -> Vec<u64> {
        self.seen.lock().unwrap().clone()
    }

    pub fn take(&self, delivery_tag: u64) -> Completion {
        let mut parked = self.parked.lock().unwrap();
        let index = parked
            .iter()
            .position(|completion| completion.delivery_tag() == delivery_tag)
            .unwrap_or_else(|| panic!("delivery {} is not parked", delivery_tag));
        parked.remove(index)
    }

    pub fn take_all(&self) -> Vec<Completion> {
        std::mem::take(&mut *self.parked.lock().unwrap())
    }
}

impl MessageHandler for ParkingHandler {
    fn handle(&self, delivery: Delivery, completion: Completion) -> Result<(), HandlerError> {
        self.seen.lock().unwrap().push(delivery.delivery_tag);
        self.parked.lock().unwrap().push(completion);
        Ok(())
    }
}

/// Poll `condition` until it holds, failing the test after five seconds
pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        sleep(Duration::from_millis(5)).await;
    }
}

/// Everything currently buffered on an event receiver
pub fn drain_events(receiver: &mut broadcast::Receiver<ConsumerEvent>) -> Vec<ConsumerEvent> {
    let mut events = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    events
}

pub fn count_events(events: &[ConsumerEvent], event_type: ConsumerEventType) -> usize {
    events
        .iter()
        .filter(|event| event.event_type == event_type)
        .count()
}
