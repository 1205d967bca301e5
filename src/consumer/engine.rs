//! Consumer loop, lifecycle and drain-on-dispose
//!
//! One spawned task runs the loop: take an admission unit, pop the next
//! delivery, hand it to the handler together with its [`Completion`]. The
//! completion returns the unit, so at most `batch_size` deliveries sit in the
//! handler at any time. Completion order across deliveries is not tied to
//! delivery order.

use crate::consumer::admission::{AdmissionGate, AdmissionPermit};
use crate::consumer::channel::BrokerChannel;
use crate::consumer::completion::Completion;
use crate::consumer::config::ConsumerConfig;
use crate::consumer::delivery::{Delivery, ShutdownReason};
use crate::consumer::error::{ConsumerError, ConsumerResult};
use crate::consumer::events::{ConsumerEvent, ConsumerEventType, ConsumerState};
use crate::consumer::handler::MessageHandler;
use crate::consumer::queue::DeliveryQueue;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// State shared between the loop task, the completions and the owning handle
pub(crate) struct ConsumerCore {
    config: ConsumerConfig,
    channel: Arc<dyn BrokerChannel>,
    handler: Arc<dyn MessageHandler>,
    queue: Arc<DeliveryQueue>,
    gate: AdmissionGate,
    /// Dispatched but not yet settled
    in_flight: AtomicUsize,
    /// Gate and queue have been closed
    released: AtomicBool,
    state: watch::Sender<ConsumerState>,
    events: broadcast::Sender<ConsumerEvent>,
}

impl ConsumerCore {
    fn new(
        config: ConsumerConfig,
        channel: Arc<dyn BrokerChannel>,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        let (state, _) = watch::channel(ConsumerState::Running);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let queue = match config.max_buffered {
            Some(max_size) => DeliveryQueue::bounded(config.consumer_tag.clone(), max_size),
            None => DeliveryQueue::new(config.consumer_tag.clone()),
        };
        Self {
            queue: Arc::new(queue),
            gate: AdmissionGate::new(config.batch_size),
            in_flight: AtomicUsize::new(0),
            released: AtomicBool::new(false),
            config,
            channel,
            handler,
            state,
            events,
        }
    }

    pub(crate) fn consumer_tag(&self) -> &str {
        &self.config.consumer_tag
    }

    pub(crate) fn auto_ack(&self) -> bool {
        self.config.auto_ack
    }

    pub(crate) fn channel(&self) -> &dyn BrokerChannel {
        self.channel.as_ref()
    }

    pub(crate) fn state(&self) -> ConsumerState {
        *self.state.borrow()
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.state().is_disposed()
    }

    fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Count a delivery as in flight if the consumer is still running
    ///
    /// The state check and the increment happen under the state lock, which
    /// `mark_disposed` also takes, so a drain that starts afterwards always
    /// sees this delivery.
    pub(crate) fn admit(&self) -> bool {
        let state = self.state.borrow();
        if state.is_running() {
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    /// Called exactly once per dispatched delivery, after its unit is released
    pub(crate) fn finish_delivery(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn emit(&self, event_type: ConsumerEventType, delivery_tag: Option<u64>, message: Option<String>) {
        let consumer_tag = self.consumer_tag().to_string();
        let mut event = match delivery_tag {
            Some(tag) => ConsumerEvent::for_delivery(event_type, consumer_tag, tag),
            None => ConsumerEvent::new(event_type, consumer_tag),
        };
        if let Some(message) = message {
            event = event.with_message(message);
        }
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Resolves once the state has left `Running`
    async fn stopped(&self) {
        let mut state = self.state.subscribe();
        let _ = state.wait_for(|state| !state.is_running()).await;
    }

    /// Returns false if the consumer was already disposed
    fn mark_disposed(&self) -> bool {
        self.state.send_if_modified(|state| {
            if state.is_disposed() {
                false
            } else {
                *state = ConsumerState::Disposed;
                true
            }
        })
    }

    /// Close the gate and queue; returns false if that already happened
    fn release_resources(&self) -> bool {
        if self.released.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.gate.close();
        self.queue.close();
        self.emit(ConsumerEventType::Disposed, None, None);
        true
    }

    fn channel_shutdown(&self, reason: &ShutdownReason) {
        self.queue.close();
        self.state.send_if_modified(|state| {
            if state.is_running() {
                *state = ConsumerState::ChannelShutdown;
                true
            } else {
                false
            }
        });
        log::warn!(
            "Channel on consumer {} is shutdown: {}",
            self.consumer_tag(),
            reason.reply_text
        );
        self.emit(
            ConsumerEventType::ChannelShutdown,
            None,
            Some(reason.to_string()),
        );
    }

    async fn run(self: Arc<Self>) {
        log::info!(
            "Consumer {} started (batch size {}, auto-ack {})",
            self.consumer_tag(),
            self.config.batch_size,
            self.config.auto_ack
        );
        self.emit(ConsumerEventType::Started, None, None);

        while self.state().is_running() {
            if let Err(error) = self.wait_and_dispatch().await {
                if let ConsumerError::HandlerMalfunction { delivery_tag, .. } = &error {
                    self.emit(
                        ConsumerEventType::HandlerMalfunction,
                        Some(*delivery_tag),
                        Some(error.to_string()),
                    );
                }
                log::error!("Consumer {} stopping: {}", self.consumer_tag(), error);
                self.dispose().await;
                break;
            }
        }

        log::debug!(
            "Consumer {} loop exited in state {}",
            self.consumer_tag(),
            self.state()
        );
        self.emit(ConsumerEventType::LoopExited, None, None);
    }

    async fn wait_and_dispatch(self: &Arc<Self>) -> ConsumerResult<()> {
        log::trace!("Consumer {}: waiting for an admission unit", self.consumer_tag());
        let permit = tokio::select! {
            acquired = self.gate.acquire() => match acquired {
                Ok(permit) => permit,
                Err(ConsumerError::GateClosed) => return Ok(()),
                Err(error) => return Err(error),
            },
            _ = self.stopped() => return Ok(()),
        };

        if !self.state().is_running() {
            permit.release();
            return Ok(());
        }

        log::trace!("Consumer {}: unit acquired, waiting for a delivery", self.consumer_tag());
        let popped = tokio::select! {
            popped = self.queue.pop() => popped,
            _ = self.stopped() => {
                permit.release();
                return Ok(());
            }
        };

        match popped {
            Ok(delivery) if self.admit() => self.dispatch(delivery, permit),
            Ok(delivery) => {
                log::debug!(
                    "Consumer {}: not dispatching delivery {} after {}, broker will redeliver",
                    self.consumer_tag(),
                    delivery.delivery_tag,
                    self.state()
                );
                permit.release();
                Ok(())
            }
            Err(ConsumerError::EndOfStream) => {
                log::debug!(
                    "Consumer {}: delivery queue closed, backing off for {:?}",
                    self.consumer_tag(),
                    self.config.end_of_stream_backoff()
                );
                self.emit(ConsumerEventType::EndOfStream, None, None);
                tokio::time::sleep(self.config.end_of_stream_backoff()).await;
                permit.release();
                Ok(())
            }
            Err(error) => {
                permit.release();
                Err(error)
            }
        }
    }

    fn dispatch(self: &Arc<Self>, delivery: Delivery, permit: AdmissionPermit) -> ConsumerResult<()> {
        let delivery_tag = delivery.delivery_tag;
        if log::log_enabled!(log::Level::Debug) {
            log::debug!(
                "Consumer {}: received cid {:?}, rkey {}, dtag {}",
                self.consumer_tag(),
                delivery.correlation_id,
                delivery.routing_key,
                delivery_tag
            );
        }

        // Already counted by admit, so a synchronous completion cannot underflow
        self.emit(ConsumerEventType::Dispatched, Some(delivery_tag), None);

        let completion = Completion::new(delivery_tag, Arc::clone(self), permit);
        let handler = Arc::clone(&self.handler);
        match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(delivery, completion))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(ConsumerError::HandlerMalfunction {
                delivery_tag,
                message: source.to_string(),
            }),
            Err(payload) => Err(ConsumerError::HandlerMalfunction {
                delivery_tag,
                message: panic_message(payload.as_ref()),
            }),
        }
    }

    async fn dispose(&self) {
        if !self.mark_disposed() {
            log::debug!("Consumer {} is already disposed", self.consumer_tag());
            return;
        }

        let timeout = self.config.dispose_timeout();
        let deadline = Instant::now() + timeout;
        self.emit(
            ConsumerEventType::Draining,
            None,
            Some(format!("{} deliveries in progress", self.in_flight())),
        );

        loop {
            let in_flight = self.in_flight();
            if in_flight == 0 {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                log::warn!(
                    "Consumer {}: {} deliveries still in progress after {:?}, abandoning them for redelivery",
                    self.consumer_tag(),
                    in_flight,
                    timeout
                );
                break;
            }
            log::info!(
                "Consumer {}: waiting for {} deliveries in progress",
                self.consumer_tag(),
                in_flight
            );
            tokio::time::sleep(self.config.drain_poll_interval().min(deadline - now)).await;
        }

        if self.release_resources() {
            log::info!("Consumer {} disposed", self.consumer_tag());
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("handler panicked: {}", message)
    } else {
        "handler panicked".to_string()
    }
}

async fn supervise(core: Arc<ConsumerCore>, worker: JoinHandle<()>) {
    let interrupted = match worker.await {
        Ok(()) => false,
        Err(error) if error.is_cancelled() => {
            log::warn!("The consumer thread {} is aborted", core.consumer_tag());
            core.emit(ConsumerEventType::LoopExited, None, Some("aborted".to_string()));
            true
        }
        Err(error) => {
            log::error!("The consumer thread {} panicked: {}", core.consumer_tag(), error);
            core.emit(ConsumerEventType::LoopExited, None, Some("panicked".to_string()));
            true
        }
    };

    // The loop may have been cut off inside its own drain
    if interrupted && core.is_disposed() && core.release_resources() {
        log::warn!(
            "Consumer {}: drain interrupted, released with {} deliveries in progress",
            core.consumer_tag(),
            core.in_flight()
        );
    }
}

/// Bounded-concurrency consumer for one broker channel
///
/// # Example
///
/// ```rust,no_run
/// use ackgate::consumer::{Completion, Consumer, ConsumerConfig, Delivery, HandlerError, MemoryChannel};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let channel = Arc::new(MemoryChannel::new("orders-worker"));
/// let handler = |delivery: Delivery, completion: Completion| -> Result<(), HandlerError> {
///     tokio::spawn(async move {
///         println!("processing {}", delivery.delivery_tag);
///         completion.complete();
///     });
///     Ok(())
/// };
///
/// let consumer = Consumer::start(
///     ConsumerConfig::new("orders-worker", 4),
///     channel.clone(),
///     Arc::new(handler),
/// )?;
///
/// consumer.deliver(channel.next_delivery("orders.created", b"{}".to_vec()))?;
/// consumer.dispose().await;
/// # Ok(())
/// # }
/// ```
pub struct Consumer {
    core: Arc<ConsumerCore>,
    worker: AbortHandle,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl Consumer {
    /// Validate the configuration and spawn the consumer loop
    ///
    /// Must be called from within a tokio runtime. The channel is asked to
    /// recover (requeue) anything left unacknowledged by a previous consumer.
    pub fn start(
        config: ConsumerConfig,
        channel: Arc<dyn BrokerChannel>,
        handler: Arc<dyn MessageHandler>,
    ) -> ConsumerResult<Self> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| ConsumerError::Runtime {
            message: e.to_string(),
        })?;

        if let Err(error) = channel.recover(true) {
            log::warn!(
                "Consumer {}: could not recover unacknowledged deliveries: {}",
                config.consumer_tag,
                error
            );
        }

        let core = Arc::new(ConsumerCore::new(config, channel, handler));
        let worker = runtime.spawn(Arc::clone(&core).run());
        let abort = worker.abort_handle();
        let supervisor = runtime.spawn(supervise(Arc::clone(&core), worker));

        Ok(Self {
            core,
            worker: abort,
            supervisor: Mutex::new(Some(supervisor)),
        })
    }

    pub fn consumer_tag(&self) -> &str {
        self.core.consumer_tag()
    }

    pub fn batch_size(&self) -> usize {
        self.core.config.batch_size
    }

    pub fn auto_ack(&self) -> bool {
        self.core.auto_ack()
    }

    pub fn state(&self) -> ConsumerState {
        self.core.state()
    }

    /// Deliveries dispatched to the handler and not yet settled
    pub fn in_flight(&self) -> usize {
        self.core.in_flight()
    }

    /// Admission units currently free
    pub fn available_permits(&self) -> usize {
        self.core.gate.available()
    }

    /// Queue the broker receive path pushes into
    pub fn queue(&self) -> Arc<DeliveryQueue> {
        Arc::clone(&self.core.queue)
    }

    /// Push a delivery onto the consumer's queue
    pub fn deliver(&self, delivery: Delivery) -> ConsumerResult<()> {
        self.core.queue.push(delivery)
    }

    /// Receive diagnostic events from this point on
    pub fn subscribe(&self) -> broadcast::Receiver<ConsumerEvent> {
        self.core.events.subscribe()
    }

    /// Broker notification that the channel is gone
    ///
    /// Closes the queue so a pending pop wakes up; deliveries already in the
    /// handler are left to finish.
    pub fn on_channel_shutdown(&self, reason: &ShutdownReason) {
        self.core.channel_shutdown(reason);
    }

    /// Stop dispatching, drain in-flight work up to the dispose timeout, then
    /// release the admission gate and the queue
    ///
    /// Safe to call from several tasks; only the first call does anything.
    /// A later call returns at once, even while the first one (or the drain
    /// the loop starts after a handler malfunction) is still waiting.
    pub async fn dispose(&self) {
        self.core.dispose().await;
    }

    /// Interrupt the loop task without draining
    pub fn abort(&self) {
        self.worker.abort();
    }

    #[cfg(test)]
    pub(crate) fn core(&self) -> &Arc<ConsumerCore> {
        &self.core
    }

    /// Wait until the loop task has ended
    pub async fn join(&self) {
        let supervisor = self
            .supervisor
            .lock()
            .ok()
            .and_then(|mut supervisor| supervisor.take());
        if let Some(supervisor) = supervisor {
            let _ = supervisor.await;
        }
    }
}

impl Drop for Consumer {
    fn drop(&mut self) {
        let never_disposed = self.core.mark_disposed();
        if self.core.release_resources() && never_disposed {
            log::warn!(
                "Consumer {} dropped without dispose, abandoning {} deliveries in progress",
                self.core.consumer_tag(),
                self.core.in_flight()
            );
        }
    }
}
