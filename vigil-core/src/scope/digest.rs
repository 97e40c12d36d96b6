//! Digest Loop
//!
//! The digest drives the scope to a fixed point.
//!
//! # Algorithm
//!
//! 1. Take the `digest` phase and forget the last dirty watcher.
//! 2. If an apply-async flush is scheduled, cancel its timer and flush the
//!    queue now, folding that work into this digest.
//! 3. Repeat until a pass is clean and the async queue is empty:
//!    a. Drain the async queue, FIFO.
//!    b. Run one pass over the watchers (`digest_once`).
//!    c. Charge one unit of the ttl for every dirty pass; fail once it runs
//!       out.
//! 4. Release the phase and drain the post-digest queue once.
//!
//! # Short-Circuit
//!
//! Within a pass, a clean watcher that is also the last watcher found dirty
//! ends the pass. Everything between it and the end of the registry was
//! clean on the previous lap and nothing has changed since.

use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::error::ScopeError;
use crate::report::{CallableFailure, FailureSource};

use super::context::Scope;
use super::phase::{Phase, PhaseGuard};
use super::watcher::Observed;

impl<S: 'static> Scope<S> {
    /// Run the digest loop until the scope is stable.
    ///
    /// # Errors
    ///
    /// - [`ScopeError::PhaseInProgress`] if another phase owns the scope.
    ///   Nothing is touched in that case.
    /// - [`ScopeError::IterationsExceeded`] if the watchers are still dirty
    ///   after `digest_ttl` passes. The phase is released first; the
    ///   post-digest queue is left for the next successful digest.
    ///   The ttl counts dirty passes, so with the default of 10 the tenth
    ///   dirty pass fails; a post-decrement `!(ttl--)` check would allow
    ///   an eleventh.
    ///
    /// A single pass is not part of the public surface; nothing outside the
    /// loop can scan the watchers without holding the phase:
    ///
    /// ```compile_fail
    /// use std::rc::Rc;
    /// use vigil_core::schedule::ManualScheduler;
    /// use vigil_core::Scope;
    ///
    /// let scope = Scope::new((), Rc::new(ManualScheduler::new()));
    /// scope.digest_once();
    /// ```
    pub fn digest(&self) -> Result<(), ScopeError> {
        let inner = &self.inner;
        let guard = PhaseGuard::begin(&inner.phase, Phase::Digest)?;
        inner.last_dirty.set(None);

        if let Some(timer) = inner.apply_async_timer.take() {
            debug!(timer = timer.raw(), "folding pending apply-async flush into digest");
            inner.scheduler.cancel(timer);
            self.flush_apply_async();
        }

        let ttl = inner.config.digest_ttl;
        let mut remaining = ttl;
        let mut passes = 0usize;

        loop {
            self.drain_async_queue();
            let dirty = self.digest_once();
            passes += 1;
            trace!(pass = passes, dirty, "digest pass");

            if !dirty && inner.async_queue.borrow().is_empty() {
                break;
            }

            remaining = remaining.saturating_sub(1);
            if remaining == 0 {
                drop(guard);
                warn!(ttl, "digest did not converge");
                return Err(ScopeError::IterationsExceeded { ttl });
            }
        }

        drop(guard);
        debug!(passes, "digest converged");

        self.drain_post_digest_queue();
        Ok(())
    }

    /// Run a single pass over the watchers, oldest first.
    ///
    /// Returns whether any listener ran. Only the digest loop calls this,
    /// with the phase already held.
    pub(crate) fn digest_once(&self) -> bool {
        let mut dirty = false;
        let mut index = self.inner.watchers.borrow().len();

        while index > 0 {
            index -= 1;

            // Callables may have shrunk the registry under us.
            let watcher = match self.inner.watchers.borrow().get(index) {
                Some(watcher) => Rc::clone(watcher),
                None => continue,
            };

            match watcher.observe(self) {
                Ok(Observed::Dirty) => dirty = true,
                Ok(Observed::Clean) => {
                    if self.inner.last_dirty.get() == Some(watcher.id()) {
                        break;
                    }
                }
                Err(failure) => self.report(failure),
            }
        }

        dirty
    }

    fn drain_async_queue(&self) {
        loop {
            let task = self.inner.async_queue.borrow_mut().pop_front();
            let Some(task) = task else { break };

            let Some(bound) = task.scope.upgrade() else {
                continue;
            };
            let scope = Scope::from_inner(bound);
            if let Err(err) = scope.eval(task.expr) {
                self.report(CallableFailure::new(FailureSource::AsyncTask, err));
            }
        }
    }

    fn drain_post_digest_queue(&self) {
        loop {
            let callback = self.inner.post_digest_queue.borrow_mut().pop_front();
            let Some(callback) = callback else { break };

            if let Err(err) = callback() {
                self.report(CallableFailure::new(FailureSource::PostDigest, err));
            }
        }
    }
}
