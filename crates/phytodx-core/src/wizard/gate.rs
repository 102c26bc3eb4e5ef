//! Step gate evaluation.
//!
//! The active step is the first step in table order whose readiness predicate
//! is unmet; when every predicate holds, the last step stays active. Steps up
//! to and including the active one are enabled, later steps are disabled.
//! Both functions are pure and total over any state.

use std::collections::BTreeSet;

use super::step::{StepTable, StepView};

/// Derive the single active step from the state.
pub fn derive_active_step<T: StepTable>(state: &T::State) -> T::Step {
    let steps = T::steps();
    steps
        .iter()
        .find(|def| !(def.is_satisfied)(state))
        .or_else(|| steps.last())
        .map(|def| def.id)
        .expect("step table must not be empty")
}

/// Derive the set of enabled steps: every step up to the active one.
pub fn derive_enabled<T: StepTable>(state: &T::State) -> BTreeSet<T::Step> {
    let active = derive_active_step::<T>(state);
    let mut enabled = BTreeSet::new();
    for def in T::steps() {
        enabled.insert(def.id);
        if def.id == active {
            break;
        }
    }
    enabled
}

/// Whether `step` may be entered in `state`.
pub fn is_enabled<T: StepTable>(state: &T::State, step: T::Step) -> bool {
    derive_enabled::<T>(state).contains(&step)
}

/// Views of a state with nothing in flight, as a freshly mounted layout
/// would show it. `error` is attached to the active step.
pub fn resting_views<T: StepTable>(
    state: &T::State,
    error: Option<&str>,
) -> Vec<StepView<T::Step, T::Slice>> {
    let active = derive_active_step::<T>(state);
    let enabled = derive_enabled::<T>(state);
    T::steps()
        .iter()
        .map(|def| StepView {
            step: def.id,
            title: def.title,
            enabled: enabled.contains(&def.id),
            expanded: def.id == active,
            pending: false,
            error: error.filter(|_| def.id == active).map(str::to_string),
            slice: (def.render)(state),
        })
        .collect()
}

/// Errors from explicit layout changes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("step '{0}' is not enabled yet")]
    Disabled(String),
}

// ---------------------------------------------------------------------------
// StepLayout
// ---------------------------------------------------------------------------

/// Single-expanded-step layout.
///
/// Holds exactly one expanded step. Whenever the active step changes the
/// expanded step follows it; an explicit `expand` may reopen an earlier
/// enabled step, which collapses all others.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepLayout<S> {
    active: S,
    expanded: S,
}

impl<S: Copy + Eq + Ord + std::fmt::Display> StepLayout<S> {
    pub fn new(active: S) -> Self {
        Self {
            active,
            expanded: active,
        }
    }

    /// Follow a newly derived active step. Returns true if it changed.
    pub fn sync(&mut self, active: S) -> bool {
        if self.active == active {
            return false;
        }
        self.active = active;
        self.expanded = active;
        true
    }

    /// Expand an enabled step, collapsing every other step.
    pub fn expand(&mut self, step: S, enabled: &BTreeSet<S>) -> Result<(), GateError> {
        if !enabled.contains(&step) {
            return Err(GateError::Disabled(step.to_string()));
        }
        self.expanded = step;
        Ok(())
    }

    pub fn active(&self) -> S {
        self.active
    }

    pub fn expanded(&self) -> S {
        self.expanded
    }

    pub fn is_expanded(&self, step: S) -> bool {
        self.expanded == step
    }
}
