//! Error Types
//!
//! Only two kinds of failure ever escape a digest: the loop failing to
//! converge within its ceiling, and an attempt to start a phase while another
//! one owns the scope. Everything a user callable raises is caught and handed
//! to the [`ErrorReporter`](crate::report::ErrorReporter) instead.

use thiserror::Error;

use crate::scope::Phase;

/// Errors surfaced to the caller of `digest`, `apply` or `ScopeBuilder::build`.
#[derive(Debug, Error)]
pub enum ScopeError {
    /// The digest was still dirty after `ttl` passes.
    ///
    /// Usually caused by two watchers whose listeners keep changing each
    /// other's inputs.
    #[error("{ttl} digest iterations reached")]
    IterationsExceeded {
        /// The ceiling that was exhausted.
        ttl: usize,
    },

    /// A phase was begun while another one was active.
    #[error("{phase} already in progress")]
    PhaseInProgress {
        /// The phase that currently owns the scope.
        phase: Phase,
    },

    /// The expression passed to `apply` failed.
    ///
    /// Returned only after the phase was cleared and the digest ran.
    #[error(transparent)]
    Expression(anyhow::Error),

    /// A `ScopeConfig` was rejected.
    #[error("invalid scope config: {0}")]
    InvalidConfig(String),
}

impl ScopeError {
    /// Returns `true` for the convergence failure.
    pub fn is_iterations_exceeded(&self) -> bool {
        matches!(self, ScopeError::IterationsExceeded { .. })
    }

    /// Returns `true` for the reentrancy violation.
    pub fn is_phase_in_progress(&self) -> bool {
        matches!(self, ScopeError::PhaseInProgress { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failure() {
        let err = ScopeError::IterationsExceeded { ttl: 10 };
        assert_eq!(err.to_string(), "10 digest iterations reached");
        assert!(err.is_iterations_exceeded());

        let err = ScopeError::PhaseInProgress { phase: Phase::Digest };
        assert_eq!(err.to_string(), "digest already in progress");
        assert!(err.is_phase_in_progress());
    }

    #[test]
    fn expression_error_is_transparent() {
        let err = ScopeError::Expression(anyhow::anyhow!("boom"));
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn converts_into_anyhow() {
        let err: anyhow::Error = ScopeError::PhaseInProgress { phase: Phase::Apply }.into();
        assert!(err.downcast_ref::<ScopeError>().is_some());
    }
}
