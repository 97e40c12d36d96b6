//! Manually pumped scheduler.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

use super::{DeferredCallback, DeferredScheduler, TimerHandle};

/// A scheduler whose callbacks only run when the owner pumps it.
///
/// Delays are ignored: every callback is one "tick" and ticks run strictly
/// in submission order. Callbacks scheduled while pumping are appended to the
/// back of the queue.
///
/// # Example
///
/// ```rust,ignore
/// let scheduler = Rc::new(ManualScheduler::new());
/// let scope = Scope::new(Model::default(), scheduler.clone());
///
/// scope.eval_async(|s| { s.model_mut().ready = true; Ok(()) });
/// scheduler.run_until_idle(); // the wake-up fires and digests
/// ```
#[derive(Default)]
pub struct ManualScheduler {
    queue: RefCell<VecDeque<(TimerHandle, DeferredCallback)>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of callbacks waiting to run.
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Run the oldest waiting callback.
    ///
    /// Returns `false` if nothing was waiting.
    pub fn run_next(&self) -> bool {
        // Release the queue before running so the callback can schedule more.
        let next = self.queue.borrow_mut().pop_front();
        match next {
            Some((_, callback)) => {
                callback();
                true
            }
            None => false,
        }
    }

    /// Run callbacks until the queue is empty, including ones scheduled along
    /// the way. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }
}

impl DeferredScheduler for ManualScheduler {
    fn schedule(&self, _delay: Duration, callback: DeferredCallback) -> TimerHandle {
        let handle = TimerHandle::new();
        self.queue.borrow_mut().push_back((handle, callback));
        handle
    }

    fn cancel(&self, handle: TimerHandle) {
        self.queue.borrow_mut().retain(|(queued, _)| *queued != handle);
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}
