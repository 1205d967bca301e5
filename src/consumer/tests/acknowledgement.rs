//! Tests for acknowledgement decisions on completion signals

#[cfg(test)]
mod tests {
    use crate::consumer::api::{
        ConsumerEventType, ConsumerState, Consumer, Delivery, MemoryChannel,
    };
    use crate::consumer::tests::helpers::{
        count_events, drain_events, fast_config, wait_until, ParkingHandler,
    };
    use std::sync::Arc;
    use tokio::time::{timeout, Duration};

    fn start(
        tag: &str,
        batch_size: usize,
        auto_ack: bool,
    ) -> (Consumer, Arc<MemoryChannel>, Arc<ParkingHandler>) {
        let channel = Arc::new(MemoryChannel::new(tag));
        let handler = Arc::new(ParkingHandler::default());
        let consumer = Consumer::start(
            fast_config(tag, batch_size).with_auto_ack(auto_ack),
            channel.clone(),
            handler.clone(),
        )
        .unwrap();
        (consumer, channel, handler)
    }

    #[tokio::test]
    async fn test_auto_ack_acks_completed_only() {
        let (consumer, channel, handler) = start("auto", 4, true);
        consumer.deliver(channel.next_delivery("k", vec![1])).unwrap();
        consumer.deliver(channel.next_delivery("k", vec![2])).unwrap();
        wait_until("both dispatched", || handler.parked_count() == 2).await;
        assert_eq!(consumer.in_flight(), 2);

        handler.take(1).complete();
        handler.take(2).not_handled();

        assert_eq!(channel.acked(), vec![1]);
        assert_eq!(channel.unacked(), vec![2]);
        assert_eq!(consumer.in_flight(), 0);
        wait_until("units returned", || consumer.available_permits() == 3).await;

        consumer.dispose().await;
    }

    #[tokio::test]
    async fn test_manual_ack_acks_not_handled_only() {
        let (consumer, channel, handler) = start("manual", 4, false);
        consumer.deliver(channel.next_delivery("k", vec![1])).unwrap();
        consumer.deliver(channel.next_delivery("k", vec![2])).unwrap();
        wait_until("both dispatched", || handler.parked_count() == 2).await;

        handler.take(1).complete();
        handler.take(2).not_handled();

        // Completed deliveries are acked by the application itself in manual mode
        assert_eq!(channel.acked(), vec![2]);
        assert_eq!(channel.unacked(), vec![1]);
        assert_eq!(consumer.in_flight(), 0);

        consumer.dispose().await;
    }

    #[tokio::test]
    async fn test_ack_counts_follow_signals() {
        let (consumer, channel, handler) = start("counts", 10, true);
        for n in 0..10u8 {
            consumer.deliver(channel.next_delivery("k", vec![n])).unwrap();
        }
        wait_until("all dispatched", || handler.parked_count() == 10).await;

        for (index, completion) in handler.take_all().into_iter().enumerate() {
            if index % 3 == 0 {
                completion.not_handled();
            } else {
                completion.complete();
            }
        }

        // indexes 0, 3, 6, 9 were declined
        assert_eq!(channel.ack_count(), 6);
        assert_eq!(channel.unacked().len(), 4);
        assert_eq!(consumer.in_flight(), 0);

        consumer.dispose().await;
    }

    #[tokio::test]
    async fn test_closed_channel_skips_ack_but_releases_unit() {
        let (consumer, channel, handler) = start("closed", 2, true);
        let mut events = consumer.subscribe();
        consumer.deliver(channel.next_delivery("k", vec![])).unwrap();
        wait_until("dispatched", || handler.parked_count() == 1).await;

        channel.close("connection reset by peer");
        handler.take(1).complete();

        assert!(channel.acked().is_empty());
        assert_eq!(channel.failed_acks(), 0, "ack must not be attempted on a closed channel");
        assert_eq!(consumer.in_flight(), 0);

        let events = drain_events(&mut events);
        assert_eq!(count_events(&events, ConsumerEventType::AckFailed), 1);
        assert_eq!(count_events(&events, ConsumerEventType::Completed), 1);

        consumer.dispose().await;
    }

    #[tokio::test]
    async fn test_ack_failure_is_logged_not_propagated() {
        let (consumer, channel, handler) = start("unknown-tag", 2, true);
        let mut events = consumer.subscribe();

        // Tag the channel never handed out
        consumer.deliver(Delivery::new(42, "k", vec![])).unwrap();
        wait_until("dispatched", || handler.parked_count() == 1).await;
        handler.take(42).complete();

        assert_eq!(channel.failed_acks(), 1);
        assert_eq!(consumer.in_flight(), 0);
        assert_eq!(consumer.state(), ConsumerState::Running);

        let events = drain_events(&mut events);
        let failure = events
            .iter()
            .find(|event| event.event_type == ConsumerEventType::AckFailed)
            .expect("ack failure event");
        assert_eq!(failure.delivery_tag, Some(42));
        assert!(failure.message.as_deref().unwrap_or_default().contains("42"));

        consumer.dispose().await;
    }

    #[tokio::test]
    async fn test_no_ack_after_dispose() {
        let (consumer, channel, handler) = start("disposed", 2, true);
        let consumer = Arc::new(consumer);
        consumer.deliver(channel.next_delivery("k", vec![])).unwrap();
        wait_until("dispatched", || handler.parked_count() == 1).await;

        let disposer = {
            let consumer = Arc::clone(&consumer);
            tokio::spawn(async move { consumer.dispose().await })
        };
        wait_until("disposed", || consumer.state() == ConsumerState::Disposed).await;

        handler.take(1).complete();
        timeout(Duration::from_secs(2), disposer)
            .await
            .expect("dispose should finish once the delivery settles")
            .unwrap();

        assert!(channel.acked().is_empty());
        assert_eq!(channel.unacked(), vec![1]);
        assert_eq!(consumer.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_dropped_completion_releases_without_ack() {
        let (consumer, channel, handler) = start("dropped", 1, true);
        let mut events = consumer.subscribe();
        consumer.deliver(channel.next_delivery("k", vec![])).unwrap();
        consumer.deliver(channel.next_delivery("k", vec![])).unwrap();
        wait_until("first dispatched", || handler.parked_count() == 1).await;

        drop(handler.take(1));

        assert_eq!(consumer.in_flight(), 0);
        assert!(channel.acked().is_empty());
        wait_until("second dispatched", || handler.seen_tags() == vec![1, 2]).await;

        let events = drain_events(&mut events);
        assert_eq!(count_events(&events, ConsumerEventType::Abandoned), 1);

        handler.take(2).complete();
        assert_eq!(channel.acked(), vec![2]);
        consumer.dispose().await;
    }
}
