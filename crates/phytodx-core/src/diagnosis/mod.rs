//! Plant disease diagnosis workflow.
//!
//! Five dependent steps: select a category, upload a leaf image, start and
//! validate an inference, read the detection result, and optionally run a
//! questionnaire-driven deep analysis.

pub mod api;
pub mod controller;
pub mod questionnaire;
pub mod state;
pub mod steps;

/// Session snapshot key for the diagnosis workflow.
pub const DIAGNOSIS_SNAPSHOT_KEY: &str = "diagnosis-workflow";

pub use controller::{ControllerSettings, DiagnosisController, DiagnosisOp, InputError};
pub use questionnaire::{Questionnaire, QuestionnaireError};
pub use state::{TransitionError, WorkflowStateExt};
pub use steps::{DiagnosisSlice, DiagnosisSteps, derive_active_step, derive_enabled};
