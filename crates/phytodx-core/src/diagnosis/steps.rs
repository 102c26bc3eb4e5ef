//! The five-step diagnosis table and its gate.
//!
//! Predicates, in order:
//! 1. category selected
//! 2. asset selected and uploaded
//! 3. inference started and validated
//! 4. deep analysis requested
//! 5. deep analysis result present (never blocks; step 5 is last)

use std::collections::BTreeSet;

use phytodx_types::diagnosis::{
    AssetId, Category, DeepAnalysisResult, DetectionOutcome, DiagnosisStep, InferenceId,
    SelectedAsset, WorkflowState,
};

use crate::wizard::gate;
use crate::wizard::step::{StepDefinition, StepTable};

/// Marker type binding the diagnosis step table to the wizard machinery.
pub struct DiagnosisSteps;

/// State slice rendered for one diagnosis step.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosisSlice {
    Category {
        category: Option<Category>,
    },
    Upload {
        asset: Option<SelectedAsset>,
        asset_id: Option<AssetId>,
    },
    Inference {
        inference_id: Option<InferenceId>,
        validated: bool,
    },
    Detection {
        detection: Option<DetectionOutcome>,
        attention_map_url: Option<String>,
        recommends_deep_analysis: bool,
    },
    DeepAnalysis {
        requested: bool,
        result: Option<DeepAnalysisResult>,
    },
}

fn category_ready(s: &WorkflowState) -> bool {
    s.category.is_some()
}

fn upload_ready(s: &WorkflowState) -> bool {
    s.asset_id.is_some() && s.has_selected_asset()
}

fn inference_ready(s: &WorkflowState) -> bool {
    s.inference_id.is_some() && s.is_validated
}

fn detection_ready(s: &WorkflowState) -> bool {
    s.is_deep_analysis_requested
}

fn deep_analysis_ready(s: &WorkflowState) -> bool {
    s.deep_analysis_result.is_some()
}

fn render_category(s: &WorkflowState) -> DiagnosisSlice {
    DiagnosisSlice::Category {
        category: s.category.clone(),
    }
}

fn render_upload(s: &WorkflowState) -> DiagnosisSlice {
    DiagnosisSlice::Upload {
        asset: s.selected_asset.clone(),
        asset_id: s.asset_id.clone(),
    }
}

fn render_inference(s: &WorkflowState) -> DiagnosisSlice {
    DiagnosisSlice::Inference {
        inference_id: s.inference_id.clone(),
        validated: s.is_validated,
    }
}

fn render_detection(s: &WorkflowState) -> DiagnosisSlice {
    DiagnosisSlice::Detection {
        detection: s.detection.clone(),
        attention_map_url: s.attention_map_url.clone(),
        recommends_deep_analysis: s
            .detection
            .as_ref()
            .is_some_and(DetectionOutcome::recommends_deep_analysis),
    }
}

fn render_deep_analysis(s: &WorkflowState) -> DiagnosisSlice {
    DiagnosisSlice::DeepAnalysis {
        requested: s.is_deep_analysis_requested,
        result: s.deep_analysis_result.clone(),
    }
}

static DIAGNOSIS_STEPS: [StepDefinition<DiagnosisSteps>; 5] = [
    StepDefinition {
        id: DiagnosisStep::Category,
        title: "Select category",
        is_satisfied: category_ready,
        render: render_category,
    },
    StepDefinition {
        id: DiagnosisStep::Upload,
        title: "Upload image",
        is_satisfied: upload_ready,
        render: render_upload,
    },
    StepDefinition {
        id: DiagnosisStep::Inference,
        title: "Validate inference",
        is_satisfied: inference_ready,
        render: render_inference,
    },
    StepDefinition {
        id: DiagnosisStep::Detection,
        title: "Detection result",
        is_satisfied: detection_ready,
        render: render_detection,
    },
    StepDefinition {
        id: DiagnosisStep::DeepAnalysis,
        title: "Deep analysis",
        is_satisfied: deep_analysis_ready,
        render: render_deep_analysis,
    },
];

impl StepTable for DiagnosisSteps {
    type State = WorkflowState;
    type Step = DiagnosisStep;
    type Slice = DiagnosisSlice;

    fn steps() -> &'static [StepDefinition<Self>] {
        &DIAGNOSIS_STEPS
    }
}

/// The single active diagnosis step.
pub fn derive_active_step(state: &WorkflowState) -> DiagnosisStep {
    gate::derive_active_step::<DiagnosisSteps>(state)
}

/// Every diagnosis step the user may enter.
pub fn derive_enabled(state: &WorkflowState) -> BTreeSet<DiagnosisStep> {
    gate::derive_enabled::<DiagnosisSteps>(state)
}
