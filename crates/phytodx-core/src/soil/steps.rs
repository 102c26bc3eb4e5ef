//! The three-step soil table and its gate.

use std::collections::BTreeSet;

use phytodx_types::soil::{SoilAssessment, SoilSample, SoilStep, SoilTarget, SoilWizardState};

use crate::wizard::gate;
use crate::wizard::step::{StepDefinition, StepTable};

pub struct SoilSteps;

/// State slice rendered for one soil step.
#[derive(Debug, Clone, PartialEq)]
pub enum SoilSlice {
    Target(Option<SoilTarget>),
    Sample(Option<SoilSample>),
    Assessment(Option<SoilAssessment>),
}

fn target_ready(s: &SoilWizardState) -> bool {
    s.target.is_some()
}

fn sample_ready(s: &SoilWizardState) -> bool {
    s.sample.is_some()
}

fn assessment_ready(s: &SoilWizardState) -> bool {
    s.assessment.is_some()
}

fn render_target(s: &SoilWizardState) -> SoilSlice {
    SoilSlice::Target(s.target.clone())
}

fn render_sample(s: &SoilWizardState) -> SoilSlice {
    SoilSlice::Sample(s.sample.clone())
}

fn render_assessment(s: &SoilWizardState) -> SoilSlice {
    SoilSlice::Assessment(s.assessment.clone())
}

static SOIL_STEPS: [StepDefinition<SoilSteps>; 3] = [
    StepDefinition {
        id: SoilStep::Target,
        title: "Crop and field",
        is_satisfied: target_ready,
        render: render_target,
    },
    StepDefinition {
        id: SoilStep::Sample,
        title: "Soil sample",
        is_satisfied: sample_ready,
        render: render_sample,
    },
    StepDefinition {
        id: SoilStep::Assessment,
        title: "Assessment",
        is_satisfied: assessment_ready,
        render: render_assessment,
    },
];

impl StepTable for SoilSteps {
    type State = SoilWizardState;
    type Step = SoilStep;
    type Slice = SoilSlice;

    fn steps() -> &'static [StepDefinition<Self>] {
        &SOIL_STEPS
    }
}

pub fn derive_active_step(state: &SoilWizardState) -> SoilStep {
    gate::derive_active_step::<SoilSteps>(state)
}

pub fn derive_enabled(state: &SoilWizardState) -> BTreeSet<SoilStep> {
    gate::derive_enabled::<SoilSteps>(state)
}
