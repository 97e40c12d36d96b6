//! Task Scheduler
//!
//! Ways for code outside the digest to defer work around it:
//!
//! - [`eval_async`](Scope::eval_async): run later in the current (or next)
//!   digest. From outside any phase, the first task queued also schedules a
//!   wake-up that digests if nobody else does.
//! - [`apply_async`](Scope::apply_async): run later inside an `apply`. Calls
//!   made before the flush fires share one timer, and so one digest.
//! - [`post_digest`](Scope::post_digest): run once after the next digest
//!   completes.
//!
//! The scheduler is the only source of deferral. Nothing here suspends; a
//! wake-up is just a callback the scheduler runs on a later tick.

use tracing::debug;

use crate::error::ScopeError;
use crate::report::{CallableFailure, FailureSource};

use super::context::{AsyncTask, Scope};
use super::phase::{Phase, PhaseGuard};

impl<S: 'static> Scope<S> {
    /// Evaluate `expr` against this scope right now.
    pub fn eval<T, F>(&self, expr: F) -> T
    where
        F: FnOnce(&Scope<S>) -> T,
    {
        expr(self)
    }

    /// Evaluate `expr` against this scope with extra `locals`.
    pub fn eval_with<T, L, F>(&self, expr: F, locals: L) -> T
    where
        F: FnOnce(&Scope<S>, L) -> T,
    {
        expr(self, locals)
    }

    /// Queue `expr` to run during a digest.
    ///
    /// Queued from inside a digest, it runs before that digest returns.
    /// Queued from outside any phase onto an empty queue, it also schedules a
    /// wake-up that digests if the queue is still non-empty by then.
    pub fn eval_async<F>(&self, expr: F)
    where
        F: FnOnce(&Scope<S>) -> anyhow::Result<()> + 'static,
    {
        let inner = &self.inner;

        if !inner.phase.get().is_active() && inner.async_queue.borrow().is_empty() {
            let scope = self.downgrade();
            let timer = inner.scheduler.schedule(
                inner.config.defer_delay(),
                Box::new(move || {
                    let Some(inner) = scope.upgrade() else { return };
                    let scope = Scope::from_inner(inner);
                    if scope.async_queue_len() > 0 {
                        if let Err(err) = scope.digest() {
                            scope.report(CallableFailure::new(FailureSource::ScheduledDigest, err));
                        }
                    }
                }),
            );
            debug!(timer = timer.raw(), "scheduled async digest");
        }

        inner.async_queue.borrow_mut().push_back(AsyncTask {
            scope: self.downgrade(),
            expr: Box::new(expr),
        });
    }

    /// Evaluate `expr` in the `apply` phase, then digest.
    ///
    /// The phase is released before the digest starts, whether or not `expr`
    /// succeeded.
    ///
    /// # Errors
    ///
    /// - [`ScopeError::PhaseInProgress`] if another phase owns the scope;
    ///   `expr` does not run.
    /// - Any error from the digest, which takes precedence.
    /// - [`ScopeError::Expression`] wrapping the failure of `expr`.
    pub fn apply<T, F>(&self, expr: F) -> Result<T, ScopeError>
    where
        F: FnOnce(&Scope<S>) -> anyhow::Result<T>,
    {
        let guard = PhaseGuard::begin(&self.inner.phase, Phase::Apply)?;
        let outcome = self.eval(expr);
        drop(guard);

        self.digest()?;
        outcome.map_err(ScopeError::Expression)
    }

    /// Queue `expr` to run inside a future `apply`.
    ///
    /// All calls made before the flush fires are coalesced into that single
    /// `apply`. A digest that starts first cancels the timer and runs the
    /// queued work itself.
    pub fn apply_async<F>(&self, expr: F)
    where
        F: FnOnce(&Scope<S>) -> anyhow::Result<()> + 'static,
    {
        let inner = &self.inner;
        inner
            .apply_async_queue
            .borrow_mut()
            .push_back(Box::new(move |scope: &Scope<S>| scope.eval(expr)));

        if inner.apply_async_timer.get().is_none() {
            let scope = self.downgrade();
            let timer = inner.scheduler.schedule(
                inner.config.defer_delay(),
                Box::new(move || {
                    let Some(inner) = scope.upgrade() else { return };
                    let scope = Scope::from_inner(inner);
                    let flushed = scope.apply(|s| {
                        s.flush_apply_async();
                        Ok(())
                    });
                    if let Err(err) = flushed {
                        scope.report(CallableFailure::new(FailureSource::ScheduledDigest, err));
                    }
                }),
            );
            debug!(timer = timer.raw(), "scheduled apply-async flush");
            inner.apply_async_timer.set(Some(timer));
        }
    }

    /// Queue `callback` to run once after the next digest completes.
    pub fn post_digest<F>(&self, callback: F)
    where
        F: FnOnce() -> anyhow::Result<()> + 'static,
    {
        self.inner
            .post_digest_queue
            .borrow_mut()
            .push_back(Box::new(callback));
    }

    /// Drain the apply-async queue, FIFO, and clear the pending timer.
    pub(crate) fn flush_apply_async(&self) {
        loop {
            let task = self.inner.apply_async_queue.borrow_mut().pop_front();
            let Some(task) = task else { break };

            if let Err(err) = task(self) {
                self.report(CallableFailure::new(FailureSource::ApplyAsyncTask, err));
            }
        }
        self.inner.apply_async_timer.set(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::CollectingReporter;
    use crate::schedule::ManualScheduler;
    use std::rc::Rc;

    #[derive(Default)]
    struct Model {
        value: i32,
        counter: u32,
        log: Vec<&'static str>,
    }

    struct Fixture {
        scope: Scope<Model>,
        scheduler: Rc<ManualScheduler>,
        reporter: Rc<CollectingReporter>,
    }

    fn fixture() -> Fixture {
        let scheduler = Rc::new(ManualScheduler::new());
        let reporter = Rc::new(CollectingReporter::new());
        let scope = Scope::builder(Model::default(), scheduler.clone())
            .reporter(reporter.clone())
            .build()
            .unwrap();
        Fixture {
            scope,
            scheduler,
            reporter,
        }
    }

    fn count_value_changes(scope: &Scope<Model>) {
        scope.watch_with(
            |s| Ok(s.model().value),
            |_, _, s| {
                s.model_mut().counter += 1;
                Ok(())
            },
        );
    }

    #[test]
    fn eval_returns_result_and_passes_locals() {
        let Fixture { scope, .. } = fixture();
        scope.model_mut().value = 42;

        assert_eq!(scope.eval(|s| s.model().value), 42);
        assert_eq!(scope.eval_with(|s, extra: i32| s.model().value + extra, 2), 44);
    }

    #[test]
    fn apply_runs_expression_then_digests() {
        let Fixture { scope, .. } = fixture();
        count_value_changes(&scope);

        scope.digest().unwrap();
        assert_eq!(scope.model().counter, 1);

        let returned = scope
            .apply(|s| {
                assert_eq!(s.phase(), Phase::Apply);
                s.model_mut().value = 9;
                Ok("done")
            })
            .unwrap();

        assert_eq!(returned, "done");
        assert_eq!(scope.model().counter, 2);
        assert_eq!(scope.phase(), Phase::None);
    }

    #[test]
    fn apply_digests_even_when_expression_fails() {
        let Fixture { scope, .. } = fixture();
        count_value_changes(&scope);

        let err = scope
            .apply(|s| -> anyhow::Result<()> {
                s.model_mut().value = 3;
                anyhow::bail!("expression failed")
            })
            .unwrap_err();

        assert!(matches!(err, ScopeError::Expression(_)));
        assert_eq!(err.to_string(), "expression failed");
        assert_eq!(scope.model().counter, 1);
        assert_eq!(scope.phase(), Phase::None);
    }

    #[test]
    fn apply_prefers_digest_error_over_expression_error() {
        let Fixture { scope, reporter, .. } = fixture();

        // Never settles: counter is bumped by its own listener.
        scope.watch_with(
            |s| Ok(s.model().counter),
            |_, _, s| {
                s.model_mut().counter += 1;
                Ok(())
            },
        );

        let err = scope
            .apply(|_| -> anyhow::Result<()> { anyhow::bail!("expression failed") })
            .unwrap_err();

        assert!(matches!(err, ScopeError::IterationsExceeded { ttl: 10 }));
        assert_eq!(err.to_string(), "10 digest iterations reached");
        assert_eq!(scope.phase(), Phase::None);
        assert!(reporter.is_empty());
    }

    #[test]
    fn apply_inside_apply_is_rejected() {
        let Fixture { scope, .. } = fixture();

        let err = scope
            .apply(|s| {
                let nested = s.apply(|_| Ok(()));
                assert!(matches!(
                    nested,
                    Err(ScopeError::PhaseInProgress { phase: Phase::Apply })
                ));
                Ok(())
            })
            .err();

        assert!(err.is_none());
    }

    #[test]
    fn eval_async_from_outside_schedules_one_wakeup() {
        let Fixture {
            scope, scheduler, ..
        } = fixture();
        count_value_changes(&scope);

        scope.eval_async(|s| {
            s.model_mut().value = 1;
            Ok(())
        });
        scope.eval_async(|s| {
            s.model_mut().log.push("second");
            Ok(())
        });

        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scope.async_queue_len(), 2);
        assert_eq!(scope.model().counter, 0);

        scheduler.run_until_idle();

        assert_eq!(scope.async_queue_len(), 0);
        assert_eq!(scope.model().counter, 1);
        assert_eq!(scope.model().log, vec!["second"]);
    }

    #[test]
    fn eval_async_wakeup_skips_digest_when_queue_already_drained() {
        let Fixture {
            scope, scheduler, ..
        } = fixture();
        let passes = Rc::new(std::cell::Cell::new(0u32));
        let passes_clone = passes.clone();
        scope.watch(move |_| {
            passes_clone.set(passes_clone.get() + 1);
            Ok(())
        });

        scope.eval_async(|_| Ok(()));
        scope.digest().unwrap();
        let after_manual = passes.get();

        scheduler.run_until_idle();
        assert_eq!(passes.get(), after_manual);
    }

    #[test]
    fn eval_async_inside_digest_does_not_schedule() {
        let Fixture {
            scope, scheduler, ..
        } = fixture();
        scope.watch_with(
            |s| Ok(s.model().value),
            |_, _, s| {
                s.eval_async(|s| {
                    s.model_mut().log.push("async");
                    Ok(())
                });
                Ok(())
            },
        );

        scope.digest().unwrap();

        assert_eq!(scope.model().log, vec!["async"]);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn failing_async_task_is_reported() {
        let Fixture {
            scope, reporter, ..
        } = fixture();

        scope.eval_async(|_| anyhow::bail!("async failed"));
        scope.eval_async(|s| {
            s.model_mut().log.push("still ran");
            Ok(())
        });
        scope.digest().unwrap();

        assert_eq!(reporter.sources(), vec![FailureSource::AsyncTask]);
        assert_eq!(scope.model().log, vec!["still ran"]);
    }

    #[test]
    fn apply_async_coalesces_into_one_digest() {
        let Fixture {
            scope, scheduler, ..
        } = fixture();
        count_value_changes(&scope);
        scope.digest().unwrap();

        scope.apply_async(|s| {
            s.model_mut().value += 1;
            Ok(())
        });
        scope.apply_async(|s| {
            s.model_mut().value += 1;
            Ok(())
        });

        assert!(scope.apply_async_pending());
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scope.model().value, 0);

        scheduler.run_until_idle();

        assert_eq!(scope.model().value, 2);
        // One digest saw both changes at once.
        assert_eq!(scope.model().counter, 2);
        assert!(!scope.apply_async_pending());
    }

    #[test]
    fn digest_folds_in_pending_apply_async() {
        let Fixture {
            scope, scheduler, ..
        } = fixture();

        scope.apply_async(|s| {
            s.model_mut().log.push("applied");
            Ok(())
        });
        assert_eq!(scheduler.pending(), 1);

        scope.digest().unwrap();

        assert_eq!(scope.model().log, vec!["applied"]);
        assert!(!scope.apply_async_pending());
        // The timer was cancelled rather than left to fire.
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn failing_apply_async_task_is_reported() {
        let Fixture {
            scope,
            scheduler,
            reporter,
        } = fixture();

        scope.apply_async(|_| anyhow::bail!("apply-async failed"));
        scope.apply_async(|s| {
            s.model_mut().log.push("second");
            Ok(())
        });
        scheduler.run_until_idle();

        assert_eq!(reporter.sources(), vec![FailureSource::ApplyAsyncTask]);
        assert_eq!(scope.model().log, vec!["second"]);
    }

    #[test]
    fn post_digest_waits_for_digest() {
        let Fixture { scope, .. } = fixture();
        let ran = Rc::new(std::cell::Cell::new(false));
        let ran_clone = ran.clone();

        scope.post_digest(move || {
            ran_clone.set(true);
            Ok(())
        });
        assert!(!ran.get());

        scope.digest().unwrap();
        assert!(ran.get());
    }

    #[test]
    fn wakeup_after_scope_dropped_is_harmless() {
        let Fixture {
            scope, scheduler, ..
        } = fixture();
        scope.eval_async(|_| Ok(()));
        scope.apply_async(|_| Ok(()));
        drop(scope);

        assert_eq!(scheduler.run_until_idle(), 2);
    }
}
