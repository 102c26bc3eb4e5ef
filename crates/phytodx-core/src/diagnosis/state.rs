//! WorkflowState transitions.
//!
//! The `WorkflowState` struct lives in `phytodx-types`; this module provides
//! an extension trait (`WorkflowStateExt`) with the declared transitions the
//! controller mutates it through. Every transition preserves the dependency
//! chain invariants: a field is only set when every field it depends on is
//! set, and rewinding a field clears everything downstream of it.

use phytodx_types::diagnosis::{
    AssetId, Category, DeepAnalysisResult, DetectionOutcome, InferenceId, SelectedAsset,
    WorkflowState,
};

pub use crate::wizard::TransitionError;
use crate::wizard::require;

/// A state breaks the dependency chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field} is set but {requires} is not")]
pub struct InvariantViolation {
    pub field: &'static str,
    pub requires: &'static str,
}

/// Extension trait for `WorkflowState` transitions.
pub trait WorkflowStateExt {
    /// Select the classification target. A different category clears every
    /// downstream field. Returns true if the category changed.
    fn select_category(&mut self, category: Category) -> bool;

    /// Select a local image. Clears the upload and everything after it.
    fn select_asset(&mut self, asset: SelectedAsset) -> Result<(), TransitionError>;

    /// Record a successful upload.
    fn record_upload(&mut self, asset_id: AssetId) -> Result<(), TransitionError>;

    /// Record a started inference job.
    fn record_inference(&mut self, inference_id: InferenceId) -> Result<(), TransitionError>;

    /// Record a passed validation.
    fn record_validated(&mut self) -> Result<(), TransitionError>;

    /// The inference was explicitly invalid: drop the asset so the user picks
    /// a new image. Not an error, so `last_error` is cleared.
    fn reject_asset(&mut self);

    /// Record the detection outcome.
    fn record_detection(&mut self, outcome: DetectionOutcome) -> Result<(), TransitionError>;

    /// Record the cosmetic attention map.
    fn record_attention_map(&mut self, url: Option<String>) -> Result<(), TransitionError>;

    /// Unlock step 5.
    fn request_deep_analysis(&mut self) -> Result<(), TransitionError>;

    /// Record the deep-analysis result.
    fn record_deep_analysis(&mut self, result: DeepAnalysisResult) -> Result<(), TransitionError>;

    /// Record a user-facing failure message.
    fn record_failure(&mut self, message: String);

    fn clear_error(&mut self);

    /// Start over: every field back to empty.
    fn reset(&mut self);

    /// Check the dependency chain, reporting the first violation.
    fn check_invariants(&self) -> Result<(), InvariantViolation>;

    /// Truncate the state at its first invariant violation. Used on
    /// rehydrated snapshots. Returns true if anything was dropped.
    fn normalize(&mut self) -> bool;
}

impl WorkflowStateExt for WorkflowState {
    fn select_category(&mut self, category: Category) -> bool {
        if self.category.as_ref() == Some(&category) {
            return false;
        }
        *self = WorkflowState {
            category: Some(category),
            ..WorkflowState::default()
        };
        true
    }

    fn select_asset(&mut self, asset: SelectedAsset) -> Result<(), TransitionError> {
        require(self.category.is_some(), "select_asset", "a category")?;
        require(!asset.is_empty(), "select_asset", "a non-empty file")?;
        clear_from_upload(self);
        self.selected_asset = Some(asset);
        self.last_error = None;
        Ok(())
    }

    fn record_upload(&mut self, asset_id: AssetId) -> Result<(), TransitionError> {
        require(self.has_selected_asset(), "record_upload", "a selected asset")?;
        clear_from_inference(self);
        self.asset_id = Some(asset_id);
        self.last_error = None;
        Ok(())
    }

    fn record_inference(&mut self, inference_id: InferenceId) -> Result<(), TransitionError> {
        require(self.asset_id.is_some(), "record_inference", "an uploaded asset")?;
        clear_from_validation(self);
        self.inference_id = Some(inference_id);
        self.last_error = None;
        Ok(())
    }

    fn record_validated(&mut self) -> Result<(), TransitionError> {
        require(self.inference_id.is_some(), "record_validated", "an inference id")?;
        self.is_validated = true;
        self.last_error = None;
        Ok(())
    }

    fn reject_asset(&mut self) {
        clear_from_upload(self);
        self.last_error = None;
    }

    fn record_detection(&mut self, outcome: DetectionOutcome) -> Result<(), TransitionError> {
        require(self.is_validated, "record_detection", "a validated inference")?;
        self.detection = Some(outcome);
        self.last_error = None;
        Ok(())
    }

    fn record_attention_map(&mut self, url: Option<String>) -> Result<(), TransitionError> {
        require(self.is_validated, "record_attention_map", "a validated inference")?;
        self.attention_map_url = url;
        Ok(())
    }

    fn request_deep_analysis(&mut self) -> Result<(), TransitionError> {
        require(self.is_validated, "request_deep_analysis", "a validated inference")?;
        self.is_deep_analysis_requested = true;
        self.last_error = None;
        Ok(())
    }

    fn record_deep_analysis(&mut self, result: DeepAnalysisResult) -> Result<(), TransitionError> {
        require(
            self.is_deep_analysis_requested,
            "record_deep_analysis",
            "a deep-analysis request",
        )?;
        self.deep_analysis_result = Some(result);
        self.last_error = None;
        Ok(())
    }

    fn record_failure(&mut self, message: String) {
        self.last_error = Some(message);
    }

    fn clear_error(&mut self) {
        self.last_error = None;
    }

    fn reset(&mut self) {
        *self = WorkflowState::default();
    }

    fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let violation = |field: &'static str, requires: &'static str| -> Result<(), InvariantViolation> {
            Err(InvariantViolation { field, requires })
        };

        if self.selected_asset.is_some() && self.category.is_none() {
            return violation("selected_asset", "category");
        }
        if self.asset_id.is_some() && !self.has_selected_asset() {
            return violation("asset_id", "selected_asset");
        }
        if self.inference_id.is_some() && self.asset_id.is_none() {
            return violation("inference_id", "asset_id");
        }
        if self.is_validated && self.inference_id.is_none() {
            return violation("is_validated", "inference_id");
        }
        if self.detection.is_some() && !self.is_validated {
            return violation("detection", "is_validated");
        }
        if self.attention_map_url.is_some() && !self.is_validated {
            return violation("attention_map_url", "is_validated");
        }
        if self.is_deep_analysis_requested && !self.is_validated {
            return violation("is_deep_analysis_requested", "is_validated");
        }
        if self.deep_analysis_result.is_some() && !self.is_deep_analysis_requested {
            return violation("deep_analysis_result", "is_deep_analysis_requested");
        }
        Ok(())
    }

    fn normalize(&mut self) -> bool {
        let before = self.clone();
        if self.category.is_none() {
            let last_error = self.last_error.take();
            *self = WorkflowState {
                last_error,
                ..WorkflowState::default()
            };
        } else if !self.has_selected_asset() {
            clear_from_upload(self);
        } else if self.asset_id.is_none() {
            clear_from_inference(self);
        } else if self.inference_id.is_none() {
            clear_from_validation(self);
        } else if !self.is_validated {
            clear_after_validation(self);
        } else if !self.is_deep_analysis_requested {
            self.deep_analysis_result = None;
        }
        *self != before
    }
}

// Downstream truncation helpers, outermost first. Each clears the named
// field and everything after it; `last_error` is left to the caller.

fn clear_from_upload(state: &mut WorkflowState) {
    state.selected_asset = None;
    clear_from_inference(state);
}

fn clear_from_inference(state: &mut WorkflowState) {
    state.asset_id = None;
    clear_from_validation(state);
}

fn clear_from_validation(state: &mut WorkflowState) {
    state.inference_id = None;
    state.is_validated = false;
    clear_after_validation(state);
}

fn clear_after_validation(state: &mut WorkflowState) {
    state.is_validated = false;
    state.detection = None;
    state.attention_map_url = None;
    state.is_deep_analysis_requested = false;
    state.deep_analysis_result = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use phytodx_types::diagnosis::DiseaseId;
    use proptest::prelude::*;

    fn leaf() -> SelectedAsset {
        SelectedAsset::new("/photos/leaf.jpg", 4096)
    }

    fn analysis() -> DeepAnalysisResult {
        DeepAnalysisResult {
            reasoning: "concentric rings on lower leaves".to_string(),
            confidence_level: 0.82,
            visual_indicators: vec!["target spots".to_string()],
            disease_id: Some(DiseaseId(7)),
        }
    }

    fn full_chain() -> WorkflowState {
        let mut state = WorkflowState::default();
        state.select_category(Category::new(5, "Tomato"));
        state.select_asset(leaf()).unwrap();
        state.record_upload(AssetId::from("a1")).unwrap();
        state.record_inference(InferenceId::from("inf-1")).unwrap();
        state.record_validated().unwrap();
        state
            .record_detection(DetectionOutcome::Inconclusive {
                confidence_level: Some(0.3),
            })
            .unwrap();
        state.request_deep_analysis().unwrap();
        state.record_deep_analysis(analysis()).unwrap();
        state
    }

    #[test]
    fn test_full_chain_satisfies_invariants() {
        let state = full_chain();
        assert!(state.check_invariants().is_ok());
        assert!(state.deep_analysis_result.is_some());
    }

    #[test]
    fn test_changing_category_is_structural_reset() {
        let mut state = full_chain();
        state.record_failure("boom".to_string());

        assert!(state.select_category(Category::new(9, "Potato")));

        assert_eq!(state.category, Some(Category::new(9, "Potato")));
        assert!(state.selected_asset.is_none());
        assert!(state.asset_id.is_none());
        assert!(state.inference_id.is_none());
        assert!(!state.is_validated);
        assert!(state.detection.is_none());
        assert!(!state.is_deep_analysis_requested);
        assert!(state.deep_analysis_result.is_none());
        assert!(state.last_error.is_none());
    }

    #[test]
    fn test_reselecting_same_category_keeps_progress() {
        let mut state = full_chain();
        assert!(!state.select_category(Category::new(5, "Tomato")));
        assert_eq!(state.asset_id, Some(AssetId::from("a1")));
    }

    #[test]
    fn test_selecting_new_asset_clears_upload_chain() {
        let mut state = full_chain();
        state
            .select_asset(SelectedAsset::new("/photos/other.png", 10))
            .unwrap();
        assert_eq!(state.selected_asset.as_ref().unwrap().file_name, "other.png");
        assert!(state.asset_id.is_none());
        assert!(state.inference_id.is_none());
        assert!(state.deep_analysis_result.is_none());
        assert!(state.category.is_some());
    }

    #[test]
    fn test_preconditions_are_enforced() {
        let mut state = WorkflowState::default();
        assert_eq!(
            state.select_asset(leaf()).unwrap_err().transition,
            "select_asset"
        );
        assert!(state.record_upload(AssetId::from("a1")).is_err());
        assert!(state.record_inference(InferenceId::from("inf")).is_err());
        assert!(state.record_validated().is_err());
        assert!(state.request_deep_analysis().is_err());
        assert_eq!(state, WorkflowState::default());
    }

    #[test]
    fn test_empty_asset_is_rejected() {
        let mut state = WorkflowState::default();
        state.select_category(Category::new(1, "Maize"));
        let err = state
            .select_asset(SelectedAsset::new("/photos/empty.jpg", 0))
            .unwrap_err();
        assert_eq!(err.requires, "a non-empty file");
        assert!(state.selected_asset.is_none());
    }

    #[test]
    fn test_reject_asset_returns_to_upload() {
        let mut state = WorkflowState::default();
        state.select_category(Category::new(5, "Tomato"));
        state.select_asset(leaf()).unwrap();
        state.record_upload(AssetId::from("a1")).unwrap();
        state.record_inference(InferenceId::from("inf-1")).unwrap();
        state.record_failure("earlier failure".to_string());

        state.reject_asset();

        assert!(state.selected_asset.is_none());
        assert!(state.asset_id.is_none());
        assert!(state.inference_id.is_none());
        assert!(state.last_error.is_none());
        assert!(state.category.is_some());
    }

    #[test]
    fn test_normalize_truncates_at_first_violation() {
        let mut state = full_chain();
        state.asset_id = None;
        assert!(state.check_invariants().is_err());

        assert!(state.normalize());
        assert!(state.check_invariants().is_ok());
        assert!(state.selected_asset.is_some());
        assert!(state.inference_id.is_none());
        assert!(state.deep_analysis_result.is_none());
    }

    #[test]
    fn test_normalize_leaves_valid_state_alone() {
        let mut state = full_chain();
        assert!(!state.normalize());
    }

    // -------------------------------------------------------------------
    // Reachable-state properties
    // -------------------------------------------------------------------

    #[derive(Debug, Clone)]
    enum Action {
        Category(i64),
        Asset(u64),
        Upload,
        Inference,
        Validate,
        Reject,
        Detect(bool),
        Request,
        Analyse,
        Fail,
        Reset,
    }

    fn action_strategy() -> impl Strategy<Value = Action> {
        prop_oneof![
            (1i64..4).prop_map(Action::Category),
            (0u64..3).prop_map(Action::Asset),
            Just(Action::Upload),
            Just(Action::Inference),
            Just(Action::Validate),
            Just(Action::Reject),
            any::<bool>().prop_map(Action::Detect),
            Just(Action::Request),
            Just(Action::Analyse),
            Just(Action::Fail),
            Just(Action::Reset),
        ]
    }

    fn apply(state: &mut WorkflowState, action: &Action) {
        let _ = match action {
            Action::Category(id) => {
                state.select_category(Category::new(*id, "crop"));
                Ok(())
            }
            Action::Asset(size) => state.select_asset(SelectedAsset::new("leaf.jpg", *size)),
            Action::Upload => state.record_upload(AssetId::from("a")),
            Action::Inference => state.record_inference(InferenceId::from("i")),
            Action::Validate => state.record_validated(),
            Action::Reject => {
                state.reject_asset();
                Ok(())
            }
            Action::Detect(found) => state.record_detection(if *found {
                DetectionOutcome::Detected {
                    disease_id: DiseaseId(1),
                    confidence_level: Some(0.9),
                }
            } else {
                DetectionOutcome::Inconclusive {
                    confidence_level: None,
                }
            }),
            Action::Request => state.request_deep_analysis(),
            Action::Analyse => state.record_deep_analysis(analysis()),
            Action::Fail => {
                state.record_failure("transient".to_string());
                Ok(())
            }
            Action::Reset => {
                state.reset();
                Ok(())
            }
        };
    }

    proptest! {
        #[test]
        fn reachable_states_keep_the_dependency_chain(
            actions in proptest::collection::vec(action_strategy(), 0..40)
        ) {
            let mut state = WorkflowState::default();
            for action in &actions {
                apply(&mut state, action);
                prop_assert!(state.check_invariants().is_ok(), "{:?} after {:?}", state, action);
                if state.inference_id.is_some() {
                    prop_assert!(state.asset_id.is_some());
                }
            }
        }
    }
}
