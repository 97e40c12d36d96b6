//! Watch Groups
//!
//! A watch group observes several values and runs one listener per change
//! wave, however many of its members changed.
//!
//! Each member is an ordinary reference-mode watcher whose listener records
//! its new and old value and, if no reaction is queued yet, queues one with
//! `eval_async`. The reaction therefore runs later in the same digest, after
//! every member that changed in this pass has recorded its value.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use smallvec::SmallVec;

use super::context::Scope;
use super::equality::Watchable;
use super::watcher::{BoxedWatchFn, Deregistration, WatcherId};

struct GroupState<V> {
    new_values: RefCell<Vec<Option<V>>>,
    old_values: RefCell<Vec<Option<V>>>,
    reaction_queued: Cell<bool>,
    first_run: Cell<bool>,
}

impl<V: Watchable> GroupState<V> {
    fn new(len: usize) -> Self {
        Self {
            new_values: RefCell::new(vec![None; len]),
            old_values: RefCell::new(vec![None; len]),
            reaction_queued: Cell::new(false),
            first_run: Cell::new(true),
        }
    }

    fn record(&self, index: usize, new_value: &V, old_value: &V) {
        self.new_values.borrow_mut()[index] = Some(new_value.clone());
        self.old_values.borrow_mut()[index] = Some(old_value.clone());
    }

    fn react<S, L>(&self, listener: &L, scope: &Scope<S>) -> anyhow::Result<()>
    where
        S: 'static,
        L: Fn(&[V], &[V], &Scope<S>) -> anyhow::Result<()>,
    {
        self.reaction_queued.set(false);

        // Members whose watch function never succeeded hold the group back.
        let new_values: Option<Vec<V>> = self.new_values.borrow().iter().cloned().collect();
        let Some(new_values) = new_values else {
            return Ok(());
        };

        if self.first_run.replace(false) {
            return listener(&new_values, &new_values, scope);
        }

        let old_values: Vec<V> = self.old_values.borrow().iter().flatten().cloned().collect();
        listener(&new_values, &old_values, scope)
    }
}

impl<S: 'static> Scope<S> {
    /// Watch several values with a single listener.
    ///
    /// The listener receives the current values of all members, in the order
    /// given, and their previous values. On its first run both slices hold
    /// the new values. An empty group runs the listener once with two empty
    /// slices, unless it is removed before that happens.
    ///
    /// The returned handle removes every member watcher.
    pub fn watch_group<V, L>(&self, watch_fns: Vec<BoxedWatchFn<S, V>>, listener: L) -> Deregistration
    where
        V: Watchable,
        L: Fn(&[V], &[V], &Scope<S>) -> anyhow::Result<()> + 'static,
    {
        if watch_fns.is_empty() {
            let armed = Rc::new(Cell::new(true));
            let armed_task = Rc::clone(&armed);
            self.eval_async(move |scope| {
                if armed_task.get() {
                    listener(&[], &[], scope)
                } else {
                    Ok(())
                }
            });
            return Deregistration::new(move || armed.set(false));
        }

        let state = Rc::new(GroupState::new(watch_fns.len()));
        let listener = Rc::new(listener);
        let mut members: SmallVec<[WatcherId; 4]> = SmallVec::new();

        for (index, watch_fn) in watch_fns.into_iter().enumerate() {
            let state = Rc::clone(&state);
            let listener = Rc::clone(&listener);

            let id = self.register(
                watch_fn,
                Box::new(move |new_value: &V, old_value: &V, scope: &Scope<S>| {
                    state.record(index, new_value, old_value);
                    if !state.reaction_queued.replace(true) {
                        let state = Rc::clone(&state);
                        let listener = Rc::clone(&listener);
                        scope.eval_async(move |scope| state.react(&*listener, scope));
                    }
                    Ok(())
                }),
                false,
            );
            members.push(id);
        }

        let scope = self.downgrade();
        Deregistration::new(move || {
            if let Some(inner) = scope.upgrade() {
                for id in &members {
                    inner.remove_watcher(*id);
                }
            }
        })
    }
}
