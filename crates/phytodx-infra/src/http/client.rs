//! HttpDiagnosisApi -- `DiagnosisApi` and `SoilApi` over `reqwest`.
//!
//! Endpoints are joined onto the configured base URL. Non-2xx responses map
//! to `RemoteError::Status` (carrying the service's `detail`/`message` when
//! the body is JSON), transport failures to `RemoteError::Transport`, and
//! undecodable bodies to `RemoteError::Decode`.
//!
//! The bearer token is held as a [`SecretString`] and only exposed when
//! building request headers. Per-call timeouts are enforced by the workflow
//! controller, not the HTTP client.

use reqwest::multipart;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::json;

use phytodx_core::diagnosis::api::DiagnosisApi;
use phytodx_core::soil::api::SoilApi;
use phytodx_types::config::RemoteConfig;
use phytodx_types::diagnosis::{
    AssetId, Category, DeepAnalysisRequest, DeepAnalysisResult, DetectionReport, DiseaseId,
    DiseaseRecord, InferenceId, SelectedAsset, StartedInference, UploadedAsset, ValidationReport,
    Visualization,
};
use phytodx_types::error::RemoteError;
use phytodx_types::soil::{SoilAssessment, SoilAssessmentRequest};

/// Longest error body excerpt kept in a `RemoteError::Status`.
const MAX_ERROR_EXCERPT: usize = 200;

pub struct HttpDiagnosisApi {
    client: reqwest::Client,
    base_url: String,
    token: Option<SecretString>,
}

impl HttpDiagnosisApi {
    pub fn new(base_url: impl Into<String>, token: Option<SecretString>) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("phytodx/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Build from config, reading the bearer token from the environment
    /// variable named by `remote.api_token_env`. A missing or blank variable
    /// means unauthenticated requests.
    pub fn from_config(remote: &RemoteConfig) -> Result<Self, RemoteError> {
        let token = std::env::var(&remote.api_token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .map(SecretString::from);
        if token.is_none() {
            tracing::debug!(env = %remote.api_token_env, "no API token configured");
        }
        Self::new(remote.base_url.clone(), token)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, RemoteError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
            tracing::warn!(operation, status = status.as_u16(), %message, "remote service error");
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            tracing::warn!(operation, error = %e, "undecodable response body");
            RemoteError::Decode(e.to_string())
        })
    }
}

/// Pull a human-readable message out of an error body.
fn error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for field in ["detail", "message", "error"] {
            if let Some(text) = value.get(field).and_then(|v| v.as_str()) {
                return Some(text.to_string());
            }
        }
    }
    Some(body.chars().take(MAX_ERROR_EXCERPT).collect())
}

impl DiagnosisApi for HttpDiagnosisApi {
    async fn upload_asset(
        &self,
        asset: &SelectedAsset,
        category: &Category,
    ) -> Result<UploadedAsset, RemoteError> {
        let bytes = tokio::fs::read(&asset.path)
            .await
            .map_err(|e| RemoteError::Asset(format!("{}: {e}", asset.path.display())))?;

        let mut part = multipart::Part::bytes(bytes).file_name(asset.file_name.clone());
        if let Some(content_type) = &asset.content_type {
            part = part
                .mime_str(content_type)
                .map_err(|e| RemoteError::Asset(e.to_string()))?;
        }
        let form = multipart::Form::new()
            .text("category_id", category.id.to_string())
            .part("file", part);

        tracing::debug!(file = %asset.file_name, size = asset.size_bytes, "uploading image");
        self.send(
            "upload_asset",
            self.client.post(self.url("images")).multipart(form),
        )
        .await
    }

    async fn start_inference(&self, asset_id: &AssetId) -> Result<StartedInference, RemoteError> {
        self.send(
            "start_inference",
            self.client
                .post(self.url("inferences"))
                .json(&json!({ "image_id": asset_id })),
        )
        .await
    }

    async fn validate_inference(
        &self,
        inference_id: &InferenceId,
    ) -> Result<ValidationReport, RemoteError> {
        self.send(
            "validate_inference",
            self.client
                .get(self.url(&format!("inferences/{inference_id}/validate"))),
        )
        .await
    }

    async fn detect_disease(&self, inference_id: &InferenceId) -> Result<DetectionReport, RemoteError> {
        self.send(
            "detect_disease",
            self.client
                .get(self.url(&format!("inferences/{inference_id}/detect"))),
        )
        .await
    }

    async fn visualize_inference(
        &self,
        inference_id: &InferenceId,
    ) -> Result<Visualization, RemoteError> {
        self.send(
            "visualize_inference",
            self.client
                .get(self.url(&format!("inferences/{inference_id}/visualize"))),
        )
        .await
    }

    async fn post_deep_analysis(
        &self,
        request: &DeepAnalysisRequest,
    ) -> Result<DeepAnalysisResult, RemoteError> {
        self.send(
            "post_deep_analysis",
            self.client.post(self.url("deep-analysis")).json(request),
        )
        .await
    }

    async fn fetch_disease_by_id(&self, disease_id: DiseaseId) -> Result<DiseaseRecord, RemoteError> {
        self.send(
            "fetch_disease_by_id",
            self.client.get(self.url(&format!("diseases/{disease_id}"))),
        )
        .await
    }
}

impl SoilApi for HttpDiagnosisApi {
    async fn assess_soil(&self, request: &SoilAssessmentRequest) -> Result<SoilAssessment, RemoteError> {
        self.send(
            "assess_soil",
            self.client.post(self.url("soil/assessments")).json(request),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use phytodx_types::diagnosis::{DetectionStatus, ValidationStatus};
    use phytodx_types::soil::{SoilRating, SoilSample, SoilTarget};

    fn api(server: &mockito::ServerGuard) -> HttpDiagnosisApi {
        HttpDiagnosisApi::new(server.url(), Some(SecretString::from("tok-123"))).unwrap()
    }

    #[tokio::test]
    async fn start_inference_posts_image_id_with_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/inferences")
            .match_header("authorization", "Bearer tok-123")
            .match_body(Matcher::Json(json!({ "image_id": "a1" })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"inf-9"}"#)
            .create_async()
            .await;

        let started = api(&server).start_inference(&AssetId::from("a1")).await.unwrap();
        assert_eq!(started.inference_id, InferenceId::from("inf-9"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn upload_sends_multipart_form() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("leaf.jpg");
        tokio::fs::write(&path, b"fake-jpeg-bytes").await.unwrap();

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/images")
            .match_header(
                "content-type",
                Matcher::Regex("multipart/form-data; boundary=.*".to_string()),
            )
            .match_body(Matcher::Regex(r#"name="category_id""#.to_string()))
            .with_status(200)
            .with_body(r#"{"id":"img-1"}"#)
            .create_async()
            .await;

        let asset = SelectedAsset::new(&path, 15);
        let uploaded = api(&server)
            .upload_asset(&asset, &Category::new(5, "Tomato"))
            .await
            .unwrap();
        assert_eq!(uploaded.asset_id, AssetId::from("img-1"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unreadable_asset_fails_before_any_request() {
        let server = mockito::Server::new_async().await;
        let asset = SelectedAsset::new("/definitely/not/here.jpg", 10);
        let err = api(&server)
            .upload_asset(&asset, &Category::new(5, "Tomato"))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Asset(_)));
    }

    #[tokio::test]
    async fn validation_and_detection_decode_service_payloads() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/inferences/inf-1/validate")
            .with_body(r#"{"status":"invalid","message":"not a leaf"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/inferences/inf-1/detect")
            .with_body(r#"{"status":"success","disease_id":7,"confidence_level":0.91}"#)
            .create_async()
            .await;

        let api = api(&server);
        let id = InferenceId::from("inf-1");
        let report = api.validate_inference(&id).await.unwrap();
        assert_eq!(report.status, ValidationStatus::Invalid);

        let detection = api.detect_disease(&id).await.unwrap();
        assert_eq!(detection.status, DetectionStatus::Detected);
        assert_eq!(detection.disease_id, Some(DiseaseId(7)));
    }

    #[tokio::test]
    async fn server_error_maps_to_status_with_detail() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/diseases/7")
            .with_status(503)
            .with_body(r#"{"detail":"catalogue offline"}"#)
            .create_async()
            .await;

        let err = api(&server).fetch_disease_by_id(DiseaseId(7)).await.unwrap_err();
        assert_eq!(
            err,
            RemoteError::Status {
                status: 503,
                message: "catalogue offline".to_string()
            }
        );
    }

    #[tokio::test]
    async fn malformed_body_maps_to_decode_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/inferences/inf-1/visualize")
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let err = api(&server)
            .visualize_inference(&InferenceId::from("inf-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Decode(_)));
    }

    #[tokio::test]
    async fn deep_analysis_and_soil_post_json() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/deep-analysis")
            .match_body(Matcher::PartialJson(json!({ "inference_id": "inf-1" })))
            .with_body(r#"{"reasoning":"rings","confidence_level":0.8}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/soil/assessments")
            .match_body(Matcher::PartialJson(json!({ "target": { "crop": "Maize" } })))
            .with_body(r#"{"rating":"good","recommendations":["Add compost"]}"#)
            .create_async()
            .await;

        let api = api(&server);
        let result = api
            .post_deep_analysis(&DeepAnalysisRequest {
                inference_id: InferenceId::from("inf-1"),
                questions: vec!["Where?".to_string()],
                answers: vec!["Leaves".to_string()],
            })
            .await
            .unwrap();
        assert_eq!(result.reasoning, "rings");
        assert!(result.visual_indicators.is_empty());

        let assessment = api
            .assess_soil(&SoilAssessmentRequest {
                target: SoilTarget {
                    crop: "Maize".to_string(),
                    area_hectares: 1.5,
                },
                sample: SoilSample {
                    ph: 6.1,
                    nitrogen_mg_kg: 20.0,
                    phosphorus_mg_kg: 12.0,
                    potassium_mg_kg: 140.0,
                    organic_matter_pct: 3.2,
                    moisture_pct: 22.0,
                },
            })
            .await
            .unwrap();
        assert_eq!(assessment.rating, SoilRating::Good);
    }

    #[test]
    fn error_message_prefers_json_detail() {
        assert_eq!(error_message(r#"{"message":"bad"}"#).as_deref(), Some("bad"));
        assert_eq!(error_message("plain failure").as_deref(), Some("plain failure"));
        assert_eq!(error_message("  "), None);
    }

    #[test]
    fn url_joins_without_double_slashes() {
        let api = HttpDiagnosisApi::new("http://svc/api/", None).unwrap();
        assert_eq!(api.url("/images"), "http://svc/api/images");
        assert_eq!(api.base_url(), "http://svc/api");
    }
}
