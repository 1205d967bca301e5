//! Demo runtime: an in-process broker feeding one consumer
//!
//! The handler moves each delivery onto its own tokio task, sleeps for the
//! configured work time and completes it. Every Nth delivery is declined.

use crate::consumer::api::{
    Completion, Consumer, ConsumerConfig, ConsumerEventType, ConsumerResult, Delivery,
    HandlerError, MemoryChannel, MessageHandler,
};
use crate::core::shutdown::ShutdownCoordinator;
use colored::Colorize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::time::Instant;

const SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct DemoSettings {
    pub consumer: ConsumerConfig,
    pub messages: usize,
    pub work: Duration,
    pub decline_every: Option<usize>,
}

#[derive(Debug, Default)]
struct WorkStats {
    completed: AtomicUsize,
    declined: AtomicUsize,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl WorkStats {
    fn settled(&self) -> usize {
        self.completed.load(Ordering::SeqCst) + self.declined.load(Ordering::SeqCst)
    }
}

struct SimulatedWork {
    work: Duration,
    decline_every: Option<usize>,
    stats: Arc<WorkStats>,
}

impl MessageHandler for SimulatedWork {
    fn handle(&self, delivery: Delivery, completion: Completion) -> Result<(), HandlerError> {
        let ordinal = delivery.delivery_tag as usize;
        if self.decline_every.is_some_and(|every| ordinal % every == 0) {
            log::debug!("Declining delivery {} ({})", ordinal, delivery.routing_key);
            self.stats.declined.fetch_add(1, Ordering::SeqCst);
            completion.not_handled();
            return Ok(());
        }

        let stats = Arc::clone(&self.stats);
        let work = self.work;
        tokio::spawn(async move {
            let running = stats.running.fetch_add(1, Ordering::SeqCst) + 1;
            stats.peak.fetch_max(running, Ordering::SeqCst);
            tokio::time::sleep(work).await;
            stats.running.fetch_sub(1, Ordering::SeqCst);
            stats.completed.fetch_add(1, Ordering::SeqCst);
            completion.complete();
        });
        Ok(())
    }
}

/// Outcome of one demo run
#[derive(Debug, Clone, PartialEq)]
pub struct DemoSummary {
    pub consumer_tag: String,
    pub batch_size: usize,
    pub auto_ack: bool,
    pub published: usize,
    pub completed: usize,
    pub declined: usize,
    pub acked: usize,
    pub unacked: usize,
    pub abandoned: usize,
    pub peak_in_flight: usize,
    pub interrupted: bool,
    pub elapsed: Duration,
}

impl DemoSummary {
    pub fn print(&self, color_enabled: bool) {
        colored::control::set_override(color_enabled);

        let mode = if self.auto_ack { "auto-ack" } else { "manual ack" };
        println!(
            "{} {} (batch size {}, {})",
            "Consumer".bold(),
            self.consumer_tag.cyan(),
            self.batch_size,
            mode
        );
        println!("  published       {:>8}", self.published);
        println!("  completed       {:>8}", self.completed.to_string().green());
        println!("  declined        {:>8}", self.declined.to_string().yellow());
        println!("  acknowledged    {:>8}", self.acked);
        println!("  left for broker {:>8}", self.unacked);
        println!("  peak in flight  {:>8}", self.peak_in_flight);
        if self.abandoned > 0 {
            println!("  abandoned       {:>8}", self.abandoned.to_string().red());
        }
        let status = if self.interrupted {
            "interrupted".yellow()
        } else {
            "finished".green()
        };
        println!("  {} in {:.2?}", status, self.elapsed);
    }
}

/// Publish `messages` deliveries, wait for them to settle or for shutdown,
/// then dispose the consumer
pub async fn run(settings: DemoSettings, shutdown: ShutdownCoordinator) -> ConsumerResult<DemoSummary> {
    let started = Instant::now();
    let consumer_tag = settings.consumer.consumer_tag.clone();
    let channel = Arc::new(MemoryChannel::new(consumer_tag.clone()));
    let stats = Arc::new(WorkStats::default());
    let handler = SimulatedWork {
        work: settings.work,
        decline_every: settings.decline_every,
        stats: Arc::clone(&stats),
    };

    let consumer = Consumer::start(settings.consumer.clone(), channel.clone(), Arc::new(handler))?;
    let mut events = consumer.subscribe();

    let mut published = 0;
    for n in 0..settings.messages {
        if shutdown.is_shutdown_requested() {
            break;
        }
        let body = format!("{{\"sequence\":{}}}", n).into_bytes();
        consumer.deliver(channel.next_delivery(format!("demo.partition.{}", n % 4), body))?;
        published += 1;
    }
    log::info!("Published {} deliveries to {}", published, consumer_tag);

    let interrupted = tokio::select! {
        _ = wait_for_settled(&consumer, &stats, published) => false,
        _ = shutdown.requested() => true,
    };
    consumer.dispose().await;

    let mut abandoned = 0;
    loop {
        match events.try_recv() {
            Ok(event) if event.event_type == ConsumerEventType::Abandoned => abandoned += 1,
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(_) => break,
        }
    }

    Ok(DemoSummary {
        consumer_tag,
        batch_size: settings.consumer.batch_size,
        auto_ack: settings.consumer.auto_ack,
        published,
        completed: stats.completed.load(Ordering::SeqCst),
        declined: stats.declined.load(Ordering::SeqCst),
        acked: channel.ack_count(),
        unacked: channel.unacked().len(),
        abandoned,
        peak_in_flight: stats.peak.load(Ordering::SeqCst),
        interrupted,
        elapsed: started.elapsed(),
    })
}

async fn wait_for_settled(consumer: &Consumer, stats: &WorkStats, published: usize) {
    while stats.settled() < published && consumer.state().is_running() {
        tokio::time::sleep(SETTLE_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(batch_size: usize, auto_ack: bool) -> DemoSettings {
        DemoSettings {
            consumer: ConsumerConfig::new("demo", batch_size)
                .with_auto_ack(auto_ack)
                .with_drain_poll_interval(Duration::from_millis(10)),
            messages: 20,
            work: Duration::from_millis(2),
            decline_every: Some(5),
        }
    }

    #[tokio::test]
    async fn test_auto_ack_run() {
        let summary = run(settings(3, true), ShutdownCoordinator::new())
            .await
            .unwrap();

        assert_eq!(summary.published, 20);
        assert_eq!(summary.completed, 16);
        assert_eq!(summary.declined, 4);
        assert_eq!(summary.acked, 16);
        assert_eq!(summary.unacked, 4);
        assert!(summary.peak_in_flight <= 3);
        assert!(!summary.interrupted);
        assert_eq!(summary.abandoned, 0);
    }

    #[tokio::test]
    async fn test_manual_ack_run() {
        let summary = run(settings(2, false), ShutdownCoordinator::new())
            .await
            .unwrap();

        assert_eq!(summary.acked, 4);
        assert_eq!(summary.unacked, 16);
        assert!(!summary.auto_ack);
    }

    #[tokio::test]
    async fn test_shutdown_before_publishing() {
        let shutdown = ShutdownCoordinator::new();
        shutdown.trigger_shutdown();

        let summary = run(settings(2, true), shutdown).await.unwrap();

        assert_eq!(summary.published, 0);
        assert_eq!(summary.acked, 0);
    }
}
