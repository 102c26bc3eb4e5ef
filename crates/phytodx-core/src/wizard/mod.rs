//! Generic stepwise wizard machinery shared by the diagnosis and soil flows.
//!
//! - `step` -- static step tables with readiness predicates and renderers
//! - `gate` -- active/enabled step derivation and the single-expanded layout
//! - `operation` -- guarded remote calls: pending state, generations, cancellation, timeout
//! - `cache` -- append-only result cache shared across remounts
//! - `persistence` -- session snapshot bridge over an injected store

pub mod cache;
pub mod gate;
pub mod operation;
pub mod persistence;
pub mod step;

/// What a controller did in response to a user request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch<S> {
    /// A remote call was issued.
    Started,
    /// A call with the same idempotency key is still in flight; nothing issued.
    AlreadyPending,
    /// Served from the result cache without a remote call.
    Cached,
    /// The named step's gate is not satisfied yet.
    Blocked(S),
    /// Nothing to do (already complete, or no failed step to retry).
    Idle,
}

impl<S> Dispatch<S> {
    pub fn is_started(&self) -> bool {
        matches!(self, Dispatch::Started)
    }
}

/// A transition was requested before its precondition held.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{transition} requires {requires}")]
pub struct TransitionError {
    pub transition: &'static str,
    pub requires: &'static str,
}

pub(crate) fn require(
    ok: bool,
    transition: &'static str,
    requires: &'static str,
) -> Result<(), TransitionError> {
    if ok {
        Ok(())
    } else {
        Err(TransitionError {
            transition,
            requires,
        })
    }
}
