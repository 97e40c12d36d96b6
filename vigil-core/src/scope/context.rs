//! Scope Context
//!
//! The [`Scope`] is the shared, caller-owned context every callable receives.
//! It owns the model, the watcher registry, the three task queues, the
//! pending apply-async timer and the current phase.
//!
//! # Ownership
//!
//! `Scope` is a cheap handle: cloning it clones an `Rc`, and every clone
//! refers to the same state. Anything the scope hands out that may outlive a
//! call (removal handles, scheduler callbacks, queued tasks) holds only a
//! weak reference, so dropping the last handle frees the scope even if a
//! wake-up is still pending.
//!
//! # Thread Safety
//!
//! None. A scope lives on one thread; all state sits in `Cell`/`RefCell`.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use crate::config::ScopeConfig;
use crate::error::ScopeError;
use crate::report::{CallableFailure, ErrorReporter, TracingReporter};
use crate::schedule::{DeferredScheduler, TimerHandle};

use super::phase::Phase;
use super::watcher::{Observe, WatcherId};

/// A task queued with `eval_async`: the scope it is bound to and the
/// expression to evaluate against it.
pub(crate) struct AsyncTask<S: 'static> {
    pub(crate) scope: Weak<ScopeInner<S>>,
    pub(crate) expr: Box<dyn FnOnce(&Scope<S>) -> anyhow::Result<()>>,
}

pub(crate) type ApplyAsyncTask<S> = Box<dyn FnOnce(&Scope<S>) -> anyhow::Result<()>>;
pub(crate) type PostDigestTask = Box<dyn FnOnce() -> anyhow::Result<()>>;

pub(crate) struct ScopeInner<S: 'static> {
    pub(crate) model: RefCell<S>,

    /// Newest watcher first. The digest scans back to front.
    pub(crate) watchers: RefCell<Vec<Rc<dyn Observe<S>>>>,

    /// The last watcher found dirty, valid only while the registry is
    /// unchanged since it was set.
    pub(crate) last_dirty: Cell<Option<WatcherId>>,

    pub(crate) async_queue: RefCell<VecDeque<AsyncTask<S>>>,
    pub(crate) apply_async_queue: RefCell<VecDeque<ApplyAsyncTask<S>>>,
    pub(crate) apply_async_timer: Cell<Option<TimerHandle>>,
    pub(crate) post_digest_queue: RefCell<VecDeque<PostDigestTask>>,

    pub(crate) phase: Cell<Phase>,

    pub(crate) config: ScopeConfig,
    pub(crate) scheduler: Rc<dyn DeferredScheduler>,
    pub(crate) reporter: Rc<dyn ErrorReporter>,
}

impl<S: 'static> ScopeInner<S> {
    /// Excise a watcher from the registry. No-op if it is already gone.
    pub(crate) fn remove_watcher(&self, id: WatcherId) {
        let mut watchers = self.watchers.borrow_mut();
        if let Some(position) = watchers.iter().position(|w| w.id() == id) {
            watchers.remove(position);
            self.last_dirty.set(None);
        }
    }
}

/// The change-propagation context.
///
/// # Example
///
/// ```rust,ignore
/// let scheduler = Rc::new(ManualScheduler::new());
/// let scope = Scope::new(Counter::default(), scheduler);
///
/// scope.watch_with(
///     |s| Ok(s.model().value),
///     |_new: &i32, _old, s| {
///         s.model_mut().changes += 1;
///         Ok(())
///     },
/// );
///
/// scope.digest()?;
/// ```
pub struct Scope<S: 'static> {
    pub(crate) inner: Rc<ScopeInner<S>>,
}

impl<S: 'static> Scope<S> {
    /// Create a scope with the default configuration and a
    /// [`TracingReporter`].
    pub fn new(model: S, scheduler: Rc<dyn DeferredScheduler>) -> Self {
        Self::from_parts(
            model,
            scheduler,
            Rc::new(TracingReporter),
            ScopeConfig::default(),
        )
    }

    /// Start building a scope with a custom configuration or reporter.
    pub fn builder(model: S, scheduler: Rc<dyn DeferredScheduler>) -> ScopeBuilder<S> {
        ScopeBuilder {
            model,
            scheduler,
            reporter: Rc::new(TracingReporter),
            config: ScopeConfig::default(),
        }
    }

    fn from_parts(
        model: S,
        scheduler: Rc<dyn DeferredScheduler>,
        reporter: Rc<dyn ErrorReporter>,
        config: ScopeConfig,
    ) -> Self {
        Self {
            inner: Rc::new(ScopeInner {
                model: RefCell::new(model),
                watchers: RefCell::new(Vec::new()),
                last_dirty: Cell::new(None),
                async_queue: RefCell::new(VecDeque::new()),
                apply_async_queue: RefCell::new(VecDeque::new()),
                apply_async_timer: Cell::new(None),
                post_digest_queue: RefCell::new(VecDeque::new()),
                phase: Cell::new(Phase::None),
                config,
                scheduler,
                reporter,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<ScopeInner<S>>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<ScopeInner<S>> {
        Rc::downgrade(&self.inner)
    }

    /// Borrow the model.
    ///
    /// # Panics
    ///
    /// If the model is currently borrowed mutably.
    pub fn model(&self) -> Ref<'_, S> {
        self.inner.model.borrow()
    }

    /// Borrow the model mutably.
    ///
    /// # Panics
    ///
    /// If the model is currently borrowed.
    pub fn model_mut(&self) -> RefMut<'_, S> {
        self.inner.model.borrow_mut()
    }

    /// The operation that currently owns the scope.
    pub fn phase(&self) -> Phase {
        self.inner.phase.get()
    }

    /// Number of registered watchers.
    pub fn watcher_count(&self) -> usize {
        self.inner.watchers.borrow().len()
    }

    /// Number of tasks waiting in the async queue.
    pub fn async_queue_len(&self) -> usize {
        self.inner.async_queue.borrow().len()
    }

    /// Whether an apply-async flush is scheduled and has not run yet.
    pub fn apply_async_pending(&self) -> bool {
        self.inner.apply_async_timer.get().is_some()
    }

    pub fn config(&self) -> &ScopeConfig {
        &self.inner.config
    }

    pub(crate) fn report(&self, failure: CallableFailure) {
        self.inner.reporter.report(&failure);
    }
}

impl<S: 'static> Clone for Scope<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: 'static> std::fmt::Debug for Scope<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("phase", &self.phase())
            .field("watchers", &self.watcher_count())
            .field("async_queue", &self.async_queue_len())
            .field("apply_async_pending", &self.apply_async_pending())
            .finish()
    }
}

/// Builder for a [`Scope`] with non-default collaborators.
pub struct ScopeBuilder<S: 'static> {
    model: S,
    scheduler: Rc<dyn DeferredScheduler>,
    reporter: Rc<dyn ErrorReporter>,
    config: ScopeConfig,
}

impl<S: 'static> ScopeBuilder<S> {
    pub fn config(mut self, config: ScopeConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the default [`TracingReporter`].
    pub fn reporter(mut self, reporter: Rc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Validate the configuration and create the scope.
    pub fn build(self) -> Result<Scope<S>, ScopeError> {
        self.config.validate()?;
        Ok(Scope::from_parts(
            self.model,
            self.scheduler,
            self.reporter,
            self.config,
        ))
    }
}
