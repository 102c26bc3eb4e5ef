//! Diagnostic workflow types.
//!
//! `WorkflowState` is the single record accumulated across the five diagnosis
//! steps. The remaining types mirror the payloads exchanged with the remote
//! upload, inference, detection, and deep-analysis services.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Identifier returned by the remote image upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub String);

/// Identifier of a started inference job.
///
/// Also the key of the deep-analysis result cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InferenceId(pub String);

/// Identifier of a disease record in the remote catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiseaseId(pub i64);

impl AssetId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl InferenceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for InferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for DiseaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AssetId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for InferenceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// The five steps of the diagnostic workflow, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosisStep {
    Category = 1,
    Upload = 2,
    Inference = 3,
    Detection = 4,
    DeepAnalysis = 5,
}

impl DiagnosisStep {
    /// All steps in order.
    pub const ALL: [DiagnosisStep; 5] = [
        DiagnosisStep::Category,
        DiagnosisStep::Upload,
        DiagnosisStep::Inference,
        DiagnosisStep::Detection,
        DiagnosisStep::DeepAnalysis,
    ];

    /// 1-based position of the step.
    pub fn number(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for DiagnosisStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagnosisStep::Category => "category",
            DiagnosisStep::Upload => "upload",
            DiagnosisStep::Inference => "inference",
            DiagnosisStep::Detection => "detection",
            DiagnosisStep::DeepAnalysis => "deep_analysis",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Step inputs
// ---------------------------------------------------------------------------

/// Classification target picked in step 1 (e.g. a crop family).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub label: String,
}

impl Category {
    pub fn new(id: i64, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
        }
    }
}

/// Reference to a locally selected image, used for preview before upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedAsset {
    pub path: PathBuf,
    pub file_name: String,
    pub size_bytes: u64,
    pub content_type: Option<String>,
}

impl SelectedAsset {
    /// Build a reference from a path and its size, deriving the file name
    /// and content type from the path.
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content_type = image_content_type(&path).map(str::to_string);
        Self {
            path,
            file_name,
            size_bytes,
            content_type,
        }
    }

    /// An asset with no name or no bytes cannot be uploaded.
    pub fn is_empty(&self) -> bool {
        self.file_name.trim().is_empty() || self.size_bytes == 0
    }
}

/// Map an image file extension to its MIME type.
pub fn image_content_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Remote payloads
// ---------------------------------------------------------------------------

/// Response of the image upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedAsset {
    #[serde(alias = "id")]
    pub asset_id: AssetId,
}

/// Response of starting an inference job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartedInference {
    #[serde(alias = "id")]
    pub inference_id: InferenceId,
}

/// Verdict of the inference validation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Valid,
    Invalid,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub status: ValidationStatus,
    #[serde(default)]
    pub message: Option<String>,
}

/// Status reported by the detection service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStatus {
    #[serde(alias = "success")]
    Detected,
    Inconclusive,
    Error,
}

/// Raw detection response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    pub status: DetectionStatus,
    #[serde(default)]
    pub disease_id: Option<DiseaseId>,
    #[serde(default)]
    pub confidence_level: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl DetectionReport {
    /// Interpret the report as a workflow outcome.
    ///
    /// A `detected` status without a disease id carries nothing to display and
    /// is treated as inconclusive. An `error` status yields `Err` with the
    /// service message so the caller can surface it as a retryable failure.
    pub fn into_outcome(self) -> Result<DetectionOutcome, String> {
        match (self.status, self.disease_id) {
            (DetectionStatus::Detected, Some(disease_id)) => Ok(DetectionOutcome::Detected {
                disease_id,
                confidence_level: self.confidence_level,
            }),
            (DetectionStatus::Detected, None) | (DetectionStatus::Inconclusive, _) => {
                Ok(DetectionOutcome::Inconclusive {
                    confidence_level: self.confidence_level,
                })
            }
            (DetectionStatus::Error, _) => Err(self
                .message
                .unwrap_or_else(|| "detection service reported an error".to_string())),
        }
    }
}

/// Step-4 result stored in the workflow state.
///
/// `Inconclusive` is a valid outcome, distinct from a transient detection
/// failure (which leaves `detection` unset and records `last_error`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DetectionOutcome {
    Detected {
        disease_id: DiseaseId,
        confidence_level: Option<f64>,
    },
    Inconclusive {
        confidence_level: Option<f64>,
    },
}

impl DetectionOutcome {
    pub fn disease_id(&self) -> Option<DiseaseId> {
        match self {
            DetectionOutcome::Detected { disease_id, .. } => Some(*disease_id),
            DetectionOutcome::Inconclusive { .. } => None,
        }
    }

    pub fn confidence_level(&self) -> Option<f64> {
        match self {
            DetectionOutcome::Detected {
                confidence_level, ..
            }
            | DetectionOutcome::Inconclusive { confidence_level } => *confidence_level,
        }
    }

    /// Inconclusive detections recommend deep analysis as the next action.
    pub fn recommends_deep_analysis(&self) -> bool {
        matches!(self, DetectionOutcome::Inconclusive { .. })
    }
}

/// Cosmetic attention-map output of the visualization service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visualization {
    #[serde(default)]
    pub attention_map_url: Option<String>,
}

/// Deep-analysis submission: one answer per diagnostic question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeepAnalysisRequest {
    pub inference_id: InferenceId,
    pub questions: Vec<String>,
    pub answers: Vec<String>,
}

/// Structured result of the deep analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepAnalysisResult {
    pub reasoning: String,
    pub confidence_level: f64,
    #[serde(default)]
    pub visual_indicators: Vec<String>,
    #[serde(default)]
    pub disease_id: Option<DiseaseId>,
}

/// Disease catalogue entry used to render the final diagnosis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiseaseRecord {
    pub id: DiseaseId,
    pub name: String,
    #[serde(default)]
    pub scientific_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub treatment: Option<String>,
}

// ---------------------------------------------------------------------------
// WorkflowState
// ---------------------------------------------------------------------------

/// Accumulated outputs of the diagnostic workflow.
///
/// Owned exclusively by the workflow controller. Fields are ordered by the
/// step that produces them; each field is only meaningful when every field
/// before it is set (see `WorkflowStateExt::check_invariants` in
/// `phytodx-core`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub selected_asset: Option<SelectedAsset>,
    #[serde(default)]
    pub asset_id: Option<AssetId>,
    #[serde(default)]
    pub inference_id: Option<InferenceId>,
    #[serde(default)]
    pub is_validated: bool,
    #[serde(default)]
    pub detection: Option<DetectionOutcome>,
    #[serde(default)]
    pub attention_map_url: Option<String>,
    #[serde(default)]
    pub is_deep_analysis_requested: bool,
    #[serde(default)]
    pub deep_analysis_result: Option<DeepAnalysisResult>,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl WorkflowState {
    /// Whether a non-empty asset is selected.
    pub fn has_selected_asset(&self) -> bool {
        self.selected_asset.as_ref().is_some_and(|a| !a.is_empty())
    }

    /// Disease identified so far, preferring the deep-analysis verdict.
    pub fn diagnosed_disease(&self) -> Option<DiseaseId> {
        self.deep_analysis_result
            .as_ref()
            .and_then(|r| r.disease_id)
            .or_else(|| self.detection.as_ref().and_then(DetectionOutcome::disease_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selected_asset_derives_name_and_type() {
        let asset = SelectedAsset::new("/tmp/leaves/Tomato_Leaf.JPG", 2048);
        assert_eq!(asset.file_name, "Tomato_Leaf.JPG");
        assert_eq!(asset.content_type.as_deref(), Some("image/jpeg"));
        assert!(!asset.is_empty());
    }

    #[test]
    fn zero_byte_asset_is_empty() {
        let asset = SelectedAsset::new("leaf.png", 0);
        assert!(asset.is_empty());
        assert!(SelectedAsset::new("", 10).is_empty());
    }

    #[test]
    fn unknown_extension_has_no_content_type() {
        assert_eq!(image_content_type(Path::new("notes.txt")), None);
        assert_eq!(image_content_type(Path::new("noext")), None);
    }

    #[test]
    fn detection_report_with_disease_is_detected() {
        let report: DetectionReport = serde_json::from_str(
            r#"{"status":"success","disease_id":12,"confidence_level":0.91}"#,
        )
        .unwrap();
        let outcome = report.into_outcome().unwrap();
        assert_eq!(outcome.disease_id(), Some(DiseaseId(12)));
        assert!(!outcome.recommends_deep_analysis());
    }

    #[test]
    fn detected_without_disease_id_is_inconclusive() {
        let report = DetectionReport {
            status: DetectionStatus::Detected,
            disease_id: None,
            confidence_level: Some(0.2),
            message: None,
        };
        let outcome = report.into_outcome().unwrap();
        assert!(outcome.recommends_deep_analysis());
        assert_eq!(outcome.confidence_level(), Some(0.2));
    }

    #[test]
    fn detection_error_status_is_err() {
        let report: DetectionReport =
            serde_json::from_str(r#"{"status":"error","message":"model offline"}"#).unwrap();
        assert_eq!(report.into_outcome().unwrap_err(), "model offline");
    }

    #[test]
    fn workflow_state_tolerates_missing_fields() {
        let state: WorkflowState =
            serde_json::from_str(r#"{"category":{"id":5,"label":"Tomato"}}"#).unwrap();
        assert_eq!(state.category, Some(Category::new(5, "Tomato")));
        assert!(state.asset_id.is_none());
        assert!(!state.is_validated);
    }

    #[test]
    fn diagnosed_disease_prefers_deep_analysis() {
        let state = WorkflowState {
            detection: Some(DetectionOutcome::Detected {
                disease_id: DiseaseId(1),
                confidence_level: None,
            }),
            deep_analysis_result: Some(DeepAnalysisResult {
                reasoning: "spots".to_string(),
                confidence_level: 0.8,
                visual_indicators: vec![],
                disease_id: Some(DiseaseId(2)),
            }),
            ..Default::default()
        };
        assert_eq!(state.diagnosed_disease(), Some(DiseaseId(2)));
    }

    #[test]
    fn step_numbers_follow_order() {
        let numbers: Vec<u8> = DiagnosisStep::ALL.iter().map(|s| s.number()).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
        assert_eq!(DiagnosisStep::DeepAnalysis.to_string(), "deep_analysis");
    }
}
