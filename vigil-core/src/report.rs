//! Failure Reporting
//!
//! User-supplied callables (watch functions, listeners, queued tasks,
//! post-digest callbacks) never abort the loop that runs them. Their failures
//! are captured as a [`CallableFailure`] and handed to an [`ErrorReporter`],
//! and the loop moves on to the next callable.

use std::cell::RefCell;
use std::fmt;

/// Which kind of callable produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureSource {
    /// A watch function.
    WatchFn,
    /// A listener function.
    Listener,
    /// A task queued with `eval_async`.
    AsyncTask,
    /// A task queued with `apply_async`.
    ApplyAsyncTask,
    /// A callback queued with `post_digest`.
    PostDigest,
    /// A digest started by a scheduler wake-up, which has no caller to
    /// return its error to.
    ScheduledDigest,
}

impl fmt::Display for FailureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureSource::WatchFn => "watch function",
            FailureSource::Listener => "listener",
            FailureSource::AsyncTask => "async task",
            FailureSource::ApplyAsyncTask => "apply-async task",
            FailureSource::PostDigest => "post-digest callback",
            FailureSource::ScheduledDigest => "scheduled digest",
        };
        f.write_str(name)
    }
}

/// A caught failure from a user callable.
#[derive(Debug)]
pub struct CallableFailure {
    /// What kind of callable failed.
    pub source: FailureSource,
    /// The error it returned.
    pub error: anyhow::Error,
}

impl CallableFailure {
    pub fn new(source: FailureSource, error: impl Into<anyhow::Error>) -> Self {
        Self {
            source,
            error: error.into(),
        }
    }
}

impl fmt::Display for CallableFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {:#}", self.source, self.error)
    }
}

/// Receives failures caught inside the digest loop and the task queues.
pub trait ErrorReporter {
    fn report(&self, failure: &CallableFailure);
}

/// Reports failures as `tracing` error events. This is the default reporter.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, failure: &CallableFailure) {
        tracing::error!(
            source = %failure.source,
            error = %format!("{:#}", failure.error),
            "callable failed"
        );
    }
}

/// Keeps every reported failure in memory.
///
/// Useful in tests and for surfacing failures to a host that wants to
/// inspect them after a digest.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    failures: RefCell<Vec<(FailureSource, String)>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of failures recorded so far.
    pub fn len(&self) -> usize {
        self.failures.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.borrow().is_empty()
    }

    /// Sources of the recorded failures, in report order.
    pub fn sources(&self) -> Vec<FailureSource> {
        self.failures.borrow().iter().map(|(source, _)| *source).collect()
    }

    /// Rendered messages of the recorded failures, in report order.
    pub fn messages(&self) -> Vec<String> {
        self.failures
            .borrow()
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// Take all recorded failures, leaving the reporter empty.
    pub fn drain(&self) -> Vec<(FailureSource, String)> {
        std::mem::take(&mut *self.failures.borrow_mut())
    }
}

impl ErrorReporter for CollectingReporter {
    fn report(&self, failure: &CallableFailure) {
        self.failures
            .borrow_mut()
            .push((failure.source, format!("{:#}", failure.error)));
    }
}
