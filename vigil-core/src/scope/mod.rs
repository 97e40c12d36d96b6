//! Scopes
//!
//! This module implements the change-propagation engine: a [`Scope`] holding
//! a model and a registry of watchers, a digest loop that re-evaluates the
//! watchers until nothing changes, and the task queues that let outside code
//! fold work into that loop.
//!
//! # Concepts
//!
//! ## Watchers
//!
//! A watcher is a watch function (a pure function of the scope) plus a
//! listener. Each digest pass evaluates the watch function and compares the
//! result to the value seen last time; if they differ the listener runs with
//! the new and old values.
//!
//! ## Digest
//!
//! A digest repeats passes until one finds nothing dirty, bounded by a
//! convergence ceiling. Listeners may change the model, which is why one
//! pass is rarely enough.
//!
//! ## Phases
//!
//! `digest` and `apply` each own the scope while they run. Starting either
//! one while the other is active is an error rather than a nested run.
//!
//! ## Deferred Work
//!
//! `eval_async`, `apply_async` and `post_digest` queue work to run inside,
//! or right after, a digest. The only clock is the injected
//! [`DeferredScheduler`](crate::schedule::DeferredScheduler).

mod context;
mod digest;
mod equality;
mod group;
mod phase;
mod tasks;
mod watcher;

pub use context::{Scope, ScopeBuilder};
pub use equality::{values_equal, Watchable};
pub use phase::Phase;
pub use watcher::{BoxedWatchFn, Deregistration, WatcherId};
