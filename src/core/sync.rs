//! Synchronization utilities for robust mutex handling
//!
//! Lock poisoning is turned into a domain error at every lock site instead of
//! panicking the caller.

use std::sync::LockResult;

/// Handle poisoned mutex cases with consistent error handling
///
/// # Arguments
/// * `result` - The result from a mutex lock operation
/// * `error_constructor` - Function to create the appropriate error type
///
/// # Examples
/// ```
/// use std::sync::Mutex;
/// use ackgate::core::sync::handle_mutex_poison;
/// use ackgate::consumer::ConsumerError;
///
/// let mutex = Mutex::new(42);
/// let guard = handle_mutex_poison(
///     mutex.lock(),
///     |message| ConsumerError::Synchronisation { message }
/// ).unwrap();
/// assert_eq!(*guard, 42);
/// ```
pub fn handle_mutex_poison<T, E>(
    result: LockResult<T>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<T, E> {
    result.map_err(|poison_err| {
        error_constructor(format!(
            "Internal synchronisation error (mutex poisoned). A panic occurred while holding a lock. PoisonError: {:?}",
            poison_err
        ))
    })
}
