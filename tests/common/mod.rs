//! Common test utilities and helpers

#![allow(dead_code)]

use ackgate::consumer::api::{Consumer, ConsumerConfig, MemoryChannel, MessageHandler};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

pub fn quick_config(consumer_tag: &str, batch_size: usize) -> ConsumerConfig {
    ConsumerConfig::new(consumer_tag, batch_size)
        .with_drain_poll_interval(Duration::from_millis(10))
        .with_end_of_stream_backoff(Duration::from_millis(10))
        .with_dispose_timeout(Duration::from_secs(5))
}

/// Start a consumer on a fresh in-memory channel
pub fn start_consumer(
    config: ConsumerConfig,
    handler: Arc<dyn MessageHandler>,
) -> (Consumer, Arc<MemoryChannel>) {
    let channel = Arc::new(MemoryChannel::new(config.consumer_tag.clone()));
    let consumer = Consumer::start(config, channel.clone(), handler).expect("consumer should start");
    (consumer, channel)
}

pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        sleep(Duration::from_millis(5)).await;
    }
}
