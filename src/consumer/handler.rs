//! Application handler contract

use crate::consumer::completion::Completion;
use crate::consumer::delivery::Delivery;

/// Error a handler returns when it cannot even accept a delivery
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Processes deliveries dispatched by the consumer loop
///
/// `handle` should return quickly: the consumer loop is blocked while it runs.
/// Real work usually moves onto another task or thread together with the
/// [`Completion`], which must eventually receive exactly one of
/// [`Completion::complete`] or [`Completion::not_handled`].
///
/// Returning `Err` (or panicking) is treated as a handler malfunction and
/// stops the consumer.
///
/// # Example
///
/// ```rust
/// use ackgate::consumer::{Completion, Delivery, HandlerError, MessageHandler};
///
/// struct Printer;
///
/// impl MessageHandler for Printer {
///     fn handle(&self, delivery: Delivery, completion: Completion) -> Result<(), HandlerError> {
///         if delivery.routing_key.starts_with("audit.") {
///             completion.not_handled();
///             return Ok(());
///         }
///         println!("{} bytes on {}", delivery.body_len(), delivery.routing_key);
///         completion.complete();
///         Ok(())
///     }
/// }
/// ```
pub trait MessageHandler: Send + Sync {
    fn handle(&self, delivery: Delivery, completion: Completion) -> Result<(), HandlerError>;
}

impl<F> MessageHandler for F
where
    F: Fn(Delivery, Completion) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(&self, delivery: Delivery, completion: Completion) -> Result<(), HandlerError> {
        self(delivery, completion)
    }
}
