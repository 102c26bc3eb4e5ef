//! Remote diagnosis service port.
//!
//! The controller consumes the upload, inference, detection, and analysis
//! services as opaque async operations. Implementations live in
//! `phytodx-infra`.

use std::future::Future;

use phytodx_types::diagnosis::{
    AssetId, Category, DeepAnalysisRequest, DeepAnalysisResult, DetectionReport, DiseaseId,
    DiseaseRecord, InferenceId, SelectedAsset, StartedInference, UploadedAsset, ValidationReport,
    Visualization,
};
use phytodx_types::error::RemoteError;

/// Remote collaborators of the diagnosis workflow.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition). Futures must
/// be `Send` because the controller spawns each call onto the runtime.
pub trait DiagnosisApi: Send + Sync + 'static {
    /// Upload the selected image for the chosen category.
    fn upload_asset(
        &self,
        asset: &SelectedAsset,
        category: &Category,
    ) -> impl Future<Output = Result<UploadedAsset, RemoteError>> + Send;

    /// Start an inference job over an uploaded image.
    fn start_inference(
        &self,
        asset_id: &AssetId,
    ) -> impl Future<Output = Result<StartedInference, RemoteError>> + Send;

    /// Check whether the inference input is usable (e.g. actually a leaf).
    fn validate_inference(
        &self,
        inference_id: &InferenceId,
    ) -> impl Future<Output = Result<ValidationReport, RemoteError>> + Send;

    fn detect_disease(
        &self,
        inference_id: &InferenceId,
    ) -> impl Future<Output = Result<DetectionReport, RemoteError>> + Send;

    /// Attention map for the inference. Cosmetic and best-effort.
    fn visualize_inference(
        &self,
        inference_id: &InferenceId,
    ) -> impl Future<Output = Result<Visualization, RemoteError>> + Send;

    fn post_deep_analysis(
        &self,
        request: &DeepAnalysisRequest,
    ) -> impl Future<Output = Result<DeepAnalysisResult, RemoteError>> + Send;

    fn fetch_disease_by_id(
        &self,
        disease_id: DiseaseId,
    ) -> impl Future<Output = Result<DiseaseRecord, RemoteError>> + Send;
}
