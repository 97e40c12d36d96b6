//! Watcher Registry
//!
//! A watcher pairs a watch function (scope → value) with a listener that
//! runs whenever the watched value changes between two digest passes.
//!
//! # Ordering
//!
//! New watchers are inserted at the front of the registry and the digest
//! scans from the back, so the oldest watcher is evaluated first. This
//! combination keeps the scan's index valid when a callable removes
//! watchers mid-pass:
//!
//! - Removing a watcher that was already visited shifts nothing the scan
//!   still has to reach.
//! - Removing the watcher being visited, or one not yet reached, shifts the
//!   rest down by one; the next index then lands on an entry the pass can
//!   safely evaluate again.
//! - A watcher registered from inside a listener lands at index 0, which the
//!   current pass still reaches.
//!
//! Every structural change resets the scope's last-dirty marker, since the
//! short-circuit it enables only holds against an unchanged registry.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::report::{CallableFailure, FailureSource};

use super::context::Scope;
use super::equality::{values_equal, Watchable};

/// Unique identifier for a watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatcherId(u64);

impl WatcherId {
    /// Generate a new unique watcher ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for WatcherId {
    fn default() -> Self {
        Self::new()
    }
}

/// A boxed watch function, as taken by `watch_group`.
pub type BoxedWatchFn<S, V> = Box<dyn Fn(&Scope<S>) -> anyhow::Result<V>>;

pub(crate) type ListenerFn<S, V> = Box<dyn Fn(&V, &V, &Scope<S>) -> anyhow::Result<()>>;

/// Result of evaluating one watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Observed {
    Clean,
    Dirty,
}

/// A type-erased watcher, so watchers of different value types can share a
/// registry.
pub(crate) trait Observe<S: 'static> {
    fn id(&self) -> WatcherId;

    /// Evaluate the watch function and, if the value changed, record it and
    /// run the listener.
    fn observe(&self, scope: &Scope<S>) -> Result<Observed, CallableFailure>;
}

struct Watcher<S: 'static, V: Watchable> {
    id: WatcherId,
    watch_fn: BoxedWatchFn<S, V>,
    listener_fn: ListenerFn<S, V>,
    /// `None` until the first evaluation.
    last: RefCell<Option<V>>,
    structural: bool,
}

impl<S: 'static, V: Watchable> Observe<S> for Watcher<S, V> {
    fn id(&self) -> WatcherId {
        self.id
    }

    fn observe(&self, scope: &Scope<S>) -> Result<Observed, CallableFailure> {
        let new_value = (self.watch_fn)(scope)
            .map_err(|e| CallableFailure::new(FailureSource::WatchFn, e))?;

        let unchanged = self
            .last
            .borrow()
            .as_ref()
            .is_some_and(|last| values_equal(&new_value, last, self.structural));
        if unchanged {
            return Ok(Observed::Clean);
        }

        scope.inner.last_dirty.set(Some(self.id));

        let stored = if self.structural {
            new_value.snapshot()
        } else {
            new_value.clone()
        };
        let previous = self.last.replace(Some(stored));

        // First evaluation: the listener sees the new value as the old one.
        let old_value = previous.as_ref().unwrap_or(&new_value);
        (self.listener_fn)(&new_value, old_value, scope)
            .map_err(|e| CallableFailure::new(FailureSource::Listener, e))?;

        Ok(Observed::Dirty)
    }
}

/// Removes a watcher (or a whole watch group) from its scope.
///
/// Removal is idempotent, and a no-op once the scope is gone. Dropping the
/// handle does **not** remove anything.
#[derive(Clone)]
pub struct Deregistration {
    remove: Rc<dyn Fn()>,
}

impl Deregistration {
    pub(crate) fn new<F>(remove: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self {
            remove: Rc::new(remove),
        }
    }

    /// Remove the watcher. Safe to call from inside a digest.
    pub fn remove(&self) {
        (self.remove)();
    }
}

impl std::fmt::Debug for Deregistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deregistration").finish_non_exhaustive()
    }
}

impl<S: 'static> Scope<S> {
    /// Watch a value without a listener.
    ///
    /// The watch function still runs on every pass; useful when it has its
    /// own side effects or only needs to keep the digest busy.
    pub fn watch<V, W>(&self, watch_fn: W) -> Deregistration
    where
        V: Watchable,
        W: Fn(&Scope<S>) -> anyhow::Result<V> + 'static,
    {
        self.watch_with(watch_fn, |_: &V, _: &V, _: &Scope<S>| Ok(()))
    }

    /// Watch a value with reference equality and run `listener` on change.
    pub fn watch_with<V, W, L>(&self, watch_fn: W, listener: L) -> Deregistration
    where
        V: Watchable,
        W: Fn(&Scope<S>) -> anyhow::Result<V> + 'static,
        L: Fn(&V, &V, &Scope<S>) -> anyhow::Result<()> + 'static,
    {
        let id = self.register(Box::new(watch_fn), Box::new(listener), false);
        self.deregistration_for(id)
    }

    /// Watch a value with structural equality and run `listener` on change.
    ///
    /// The watcher keeps a deep snapshot of the last value, so in-place
    /// mutation of shared containers is detected.
    pub fn watch_structural<V, W, L>(&self, watch_fn: W, listener: L) -> Deregistration
    where
        V: Watchable,
        W: Fn(&Scope<S>) -> anyhow::Result<V> + 'static,
        L: Fn(&V, &V, &Scope<S>) -> anyhow::Result<()> + 'static,
    {
        let id = self.register(Box::new(watch_fn), Box::new(listener), true);
        self.deregistration_for(id)
    }

    /// Insert a watcher at the front of the registry.
    pub(crate) fn register<V: Watchable>(
        &self,
        watch_fn: BoxedWatchFn<S, V>,
        listener_fn: ListenerFn<S, V>,
        structural: bool,
    ) -> WatcherId {
        let id = WatcherId::new();
        let watcher: Rc<dyn Observe<S>> = Rc::new(Watcher {
            id,
            watch_fn,
            listener_fn,
            last: RefCell::new(None),
            structural,
        });

        self.inner.last_dirty.set(None);
        self.inner.watchers.borrow_mut().insert(0, watcher);
        id
    }

    fn deregistration_for(&self, id: WatcherId) -> Deregistration {
        let scope = self.downgrade();
        Deregistration::new(move || {
            if let Some(inner) = scope.upgrade() {
                inner.remove_watcher(id);
            }
        })
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
