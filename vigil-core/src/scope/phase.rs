//! Phase Guard
//!
//! A scope is owned by at most one high-level operation at a time. The
//! current owner is recorded as a [`Phase`]; beginning a phase while another
//! one is active is a programmer error and fails immediately.
//!
//! # Implementation
//!
//! [`PhaseGuard`] clears the phase when dropped, so the phase is released on
//! every exit path, including early returns and unwinding out of a callable.

use std::cell::Cell;
use std::fmt;

use crate::error::ScopeError;

/// Which operation currently owns a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    /// Nothing is running.
    #[default]
    None,
    /// A digest loop is running.
    Digest,
    /// An `apply` expression is being evaluated.
    Apply,
}

impl Phase {
    /// Returns `true` unless the phase is [`Phase::None`].
    pub fn is_active(&self) -> bool {
        !matches!(self, Phase::None)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::None => "none",
            Phase::Digest => "digest",
            Phase::Apply => "apply",
        };
        f.write_str(name)
    }
}

/// Holds a phase for as long as it is alive.
#[must_use = "the phase is cleared as soon as the guard is dropped"]
pub(crate) struct PhaseGuard<'a> {
    slot: &'a Cell<Phase>,
}

impl<'a> PhaseGuard<'a> {
    /// Begin `phase` in `slot`, failing if another phase is active.
    pub(crate) fn begin(slot: &'a Cell<Phase>, phase: Phase) -> Result<Self, ScopeError> {
        let current = slot.get();
        if current.is_active() {
            return Err(ScopeError::PhaseInProgress { phase: current });
        }
        slot.set(phase);
        Ok(Self { slot })
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.slot.set(Phase::None);
    }
}
