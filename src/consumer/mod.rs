//! Bounded-Concurrency Message Consumer
//!
//! Takes deliveries from a broker channel, hands each one to an application
//! handler, and keeps at most `batch_size` deliveries in the handler at once.
//! Acknowledgement happens when the handler signals completion, not when the
//! delivery arrives.
//!
//! # Overview
//!
//! - **Delivery Queue**: ordered hand-off from the broker receive path, closed on shutdown
//! - **Admission Gate**: one unit per in-flight delivery, `batch_size` units in total
//! - **Consumer Loop**: acquire a unit, pop a delivery, dispatch it to the handler
//! - **Acknowledgement**: ack decision made from the ack mode and the handler's signal
//! - **Drain**: dispose waits for in-flight deliveries up to a timeout
//!
//! # Architecture
//!
//! ```text
//!  broker receive path          on_channel_shutdown / dispose
//!          │ deliver                     │ close
//!          ▼                             ▼
//! ┌──────────────────┐  pop   ┌──────────────────┐  handle   ┌───────────────┐
//! │  DeliveryQueue   │───────▶│   consumer loop  │──────────▶│ MessageHandler│
//! └──────────────────┘        └────────┬─────────┘           └───────┬───────┘
//!                                      │ acquire                     │ complete /
//!                                      ▼                             │ not_handled
//!                             ┌──────────────────┐   release  ┌──────┴───────┐
//!                             │  AdmissionGate   │◀───────────│  Completion  │──▶ ack
//!                             └──────────────────┘            └──────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use ackgate::consumer::{Completion, Consumer, ConsumerConfig, Delivery, HandlerError, MemoryChannel};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let channel = Arc::new(MemoryChannel::new("billing"));
//! let config = ConsumerConfig::new("billing", 8)
//!     .with_auto_ack(false)
//!     .with_dispose_timeout(Duration::from_secs(5));
//!
//! let handler = |delivery: Delivery, completion: Completion| -> Result<(), HandlerError> {
//!     tokio::spawn(async move {
//!         if delivery.body.is_empty() {
//!             completion.not_handled();
//!         } else {
//!             completion.complete();
//!         }
//!     });
//!     Ok(())
//! };
//!
//! let consumer = Consumer::start(config, channel.clone(), Arc::new(handler))?;
//! for _ in 0..100 {
//!     consumer.deliver(channel.next_delivery("invoices", b"payload".to_vec()))?;
//! }
//! consumer.dispose().await;
//! # Ok(())
//! # }
//! ```

mod admission;
mod channel;
mod completion;
mod config;
mod delivery;
mod engine;
mod error;
mod events;
mod handler;
mod queue;

pub mod api;

pub use admission::{AdmissionGate, AdmissionPermit};
pub use channel::{BrokerChannel, MemoryChannel};
pub use completion::Completion;
pub use config::ConsumerConfig;
pub use delivery::{Delivery, ShutdownInitiator, ShutdownReason};
pub use engine::Consumer;
pub use error::{ChannelError, ConsumerError, ConsumerResult};
pub use events::{ConsumerEvent, ConsumerEventType, ConsumerState};
pub use handler::{HandlerError, MessageHandler};
pub use queue::DeliveryQueue;

#[cfg(test)]
mod tests;
