//! Deferred Scheduling
//!
//! The scope never spins its own event loop. The only concurrency hook it
//! consumes is a one-shot "run this later" primitive, abstracted here as
//! [`DeferredScheduler`].
//!
//! # Contract
//!
//! - `schedule` never runs the callback synchronously.
//! - Callbacks scheduled with the same delay run in submission order.
//! - `cancel` on a handle whose callback already ran (or was already
//!   cancelled) is a no-op.
//!
//! # Implementations
//!
//! - [`ManualScheduler`]: callbacks sit in a FIFO queue until the owner pumps
//!   it. Deterministic, used by tests and by hosts that already own a loop.
//! - [`LocalScheduler`]: callbacks become tokio tasks on the current
//!   `LocalSet`, each sleeping for its delay before running.

mod local;
mod manual;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub use local::LocalScheduler;
pub use manual::ManualScheduler;

/// A callback handed to a scheduler.
pub type DeferredCallback = Box<dyn FnOnce() + 'static>;

/// Identifies a scheduled callback so it can be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Generate a new unique handle.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw handle value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for TimerHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// A one-shot deferred-callback scheduler.
pub trait DeferredScheduler {
    /// Arrange for `callback` to run once after `delay`.
    fn schedule(&self, delay: Duration, callback: DeferredCallback) -> TimerHandle;

    /// Prevent a scheduled callback from running.
    fn cancel(&self, handle: TimerHandle);
}
