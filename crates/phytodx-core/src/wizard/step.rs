//! Static step tables.
//!
//! A wizard is described by an ordered table of `StepDefinition`s. Each entry
//! names the step, carries a readiness predicate ("has this step produced
//! what the next step needs?"), and a renderer that extracts the slice of
//! state the rendering layer shows for that step.

use std::fmt;

/// A wizard's static step table and the types flowing through it.
pub trait StepTable: Sized + 'static {
    /// The accumulated state record.
    type State;
    /// Step identifier; table order is the dependency order.
    type Step: Copy + Eq + Ord + fmt::Debug + fmt::Display + Send + Sync + 'static;
    /// Per-step view of the state handed to the rendering layer.
    type Slice;

    /// The ordered step table. Must be non-empty.
    fn steps() -> &'static [StepDefinition<Self>];
}

/// One row of a step table.
pub struct StepDefinition<T: StepTable> {
    pub id: T::Step,
    pub title: &'static str,
    /// True once this step's output is present, unblocking the next step.
    pub is_satisfied: fn(&T::State) -> bool,
    pub render: fn(&T::State) -> T::Slice,
}

/// Per-step view handed to a `StepRenderer`.
#[derive(Debug, Clone)]
pub struct StepView<S, V> {
    pub step: S,
    pub title: &'static str,
    pub enabled: bool,
    pub expanded: bool,
    /// A remote call owned by this step is in flight.
    pub pending: bool,
    /// Failure recorded by the step, shown inline with a retry affordance.
    pub error: Option<String>,
    pub slice: V,
}

/// Rendering layer fed by a controller, one call per step in table order.
pub trait StepRenderer<S, V> {
    fn render_step(&mut self, view: &StepView<S, V>);
}

impl<S, V, F> StepRenderer<S, V> for F
where
    F: FnMut(&StepView<S, V>),
{
    fn render_step(&mut self, view: &StepView<S, V>) {
        self(view)
    }
}
