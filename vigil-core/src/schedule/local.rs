//! Tokio-backed scheduler.
//!
//! Each callback becomes a task on the current `LocalSet`, so callbacks do
//! not need to be `Send` and always run on the thread that owns the scope.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use indexmap::IndexMap;
use tokio::task::AbortHandle;

use super::{DeferredCallback, DeferredScheduler, TimerHandle};

/// A scheduler that runs callbacks as `spawn_local` tasks.
///
/// # Panics
///
/// `schedule` must be called from within a `tokio::task::LocalSet`;
/// `spawn_local` panics otherwise.
#[derive(Default, Clone)]
pub struct LocalScheduler {
    /// Tasks that have not finished yet, in submission order.
    in_flight: Rc<RefCell<IndexMap<TimerHandle, AbortHandle>>>,
}

impl LocalScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of callbacks scheduled but not yet run or cancelled.
    pub fn pending(&self) -> usize {
        self.in_flight.borrow().len()
    }
}

impl DeferredScheduler for LocalScheduler {
    fn schedule(&self, delay: Duration, callback: DeferredCallback) -> TimerHandle {
        let handle = TimerHandle::new();
        let in_flight = Rc::clone(&self.in_flight);

        let task = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            in_flight.borrow_mut().shift_remove(&handle);
            callback();
        });

        self.in_flight
            .borrow_mut()
            .insert(handle, task.abort_handle());
        handle
    }

    fn cancel(&self, handle: TimerHandle) {
        if let Some(task) = self.in_flight.borrow_mut().shift_remove(&handle) {
            task.abort();
        }
    }
}

impl std::fmt::Debug for LocalScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}
