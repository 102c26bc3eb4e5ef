//! In-crate test doubles: a session store and scripted remote services.
//!
//! Each stub counts calls on first poll, pops scripted results (falling back
//! to a fixed happy-path answer), and can hold named calls on a semaphore so
//! tests control when a "remote" call resolves.

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tokio::sync::Semaphore;

use phytodx_types::diagnosis::{
    AssetId, Category, DeepAnalysisRequest, DeepAnalysisResult, DetectionReport, DetectionStatus,
    DiseaseId, DiseaseRecord, InferenceId, SelectedAsset, StartedInference, UploadedAsset,
    ValidationReport, ValidationStatus, Visualization,
};
use phytodx_types::error::{RemoteError, RepositoryError};
use phytodx_types::soil::{SoilAssessment, SoilAssessmentRequest, SoilRating};

use crate::diagnosis::api::DiagnosisApi;
use crate::soil::api::SoilApi;
use crate::wizard::persistence::{Snapshot, SnapshotStore};

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub(crate) struct MemoryStore {
    entries: Arc<DashMap<String, Snapshot>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

impl SnapshotStore for MemoryStore {
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<Snapshot>, RepositoryError>> + Send {
        let found = self.entries.get(key).map(|r| r.value().clone());
        async move { Ok(found) }
    }

    fn put(&self, snapshot: Snapshot) -> impl Future<Output = Result<(), RepositoryError>> + Send {
        let result = if self.fail_writes.load(Ordering::SeqCst) {
            Err(RepositoryError::Io("disk unavailable".to_string()))
        } else {
            self.entries.insert(snapshot.key.clone(), snapshot);
            Ok(())
        };
        async move { result }
    }

    fn remove(&self, key: &str) -> impl Future<Output = Result<(), RepositoryError>> + Send {
        self.entries.remove(key);
        async { Ok(()) }
    }
}

// ---------------------------------------------------------------------------
// Scripting helpers
// ---------------------------------------------------------------------------

type Script<T> = Mutex<VecDeque<Result<T, RemoteError>>>;

fn next<T>(script: &Script<T>, fallback: impl FnOnce() -> Result<T, RemoteError>) -> Result<T, RemoteError> {
    script.lock().unwrap().pop_front().unwrap_or_else(fallback)
}

/// Holds named calls until permits are added.
pub(crate) struct Gate {
    held: Mutex<HashSet<&'static str>>,
    permits: Arc<Semaphore>,
}

impl Default for Gate {
    fn default() -> Self {
        Self {
            held: Mutex::new(HashSet::new()),
            permits: Arc::new(Semaphore::new(0)),
        }
    }
}

impl Gate {
    pub(crate) fn hold(&self, name: &'static str) {
        self.held.lock().unwrap().insert(name);
    }

    pub(crate) fn open(&self, name: &'static str) {
        self.held.lock().unwrap().remove(name);
    }

    pub(crate) fn release(&self, calls: usize) {
        self.permits.add_permits(calls);
    }

    /// Permits released but not yet taken by a held call.
    pub(crate) fn unclaimed(&self) -> usize {
        self.permits.available_permits()
    }

    async fn pass(&self, name: &'static str) {
        let held = self.held.lock().unwrap().contains(name);
        if held {
            self.permits.acquire().await.unwrap().forget();
        }
    }
}

// ---------------------------------------------------------------------------
// StubDiagnosisApi
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct StubDiagnosisApi {
    pub gate: Gate,

    pub uploads: AtomicUsize,
    pub starts: AtomicUsize,
    pub validations: AtomicUsize,
    pub detections: AtomicUsize,
    pub visualizations: AtomicUsize,
    pub analyses: AtomicUsize,
    pub disease_lookups: AtomicUsize,

    pub upload_results: Script<UploadedAsset>,
    pub start_results: Script<StartedInference>,
    pub validate_results: Script<ValidationReport>,
    pub detect_results: Script<DetectionReport>,
    pub visualize_results: Script<Visualization>,
    pub analysis_results: Script<DeepAnalysisResult>,
    pub disease_results: Script<DiseaseRecord>,
}

pub(crate) fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

pub(crate) fn sample_analysis() -> DeepAnalysisResult {
    DeepAnalysisResult {
        reasoning: "Concentric rings on older leaves point to early blight.".to_string(),
        confidence_level: 0.87,
        visual_indicators: vec!["target-like lesions".to_string(), "yellow halo".to_string()],
        disease_id: Some(DiseaseId(7)),
    }
}

impl StubDiagnosisApi {
    pub(crate) fn script<T>(script: &Script<T>, result: Result<T, RemoteError>) {
        script.lock().unwrap().push_back(result);
    }
}

impl DiagnosisApi for StubDiagnosisApi {
    fn upload_asset(
        &self,
        _asset: &SelectedAsset,
        _category: &Category,
    ) -> impl Future<Output = Result<UploadedAsset, RemoteError>> + Send {
        async move {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            self.gate.pass("upload").await;
            next(&self.upload_results, || {
                Ok(UploadedAsset {
                    asset_id: AssetId::from("a1"),
                })
            })
        }
    }

    fn start_inference(
        &self,
        _asset_id: &AssetId,
    ) -> impl Future<Output = Result<StartedInference, RemoteError>> + Send {
        async move {
            self.starts.fetch_add(1, Ordering::SeqCst);
            self.gate.pass("start").await;
            next(&self.start_results, || {
                Ok(StartedInference {
                    inference_id: InferenceId::from("inf-1"),
                })
            })
        }
    }

    fn validate_inference(
        &self,
        _inference_id: &InferenceId,
    ) -> impl Future<Output = Result<ValidationReport, RemoteError>> + Send {
        async move {
            self.validations.fetch_add(1, Ordering::SeqCst);
            self.gate.pass("validate").await;
            next(&self.validate_results, || {
                Ok(ValidationReport {
                    status: ValidationStatus::Valid,
                    message: None,
                })
            })
        }
    }

    fn detect_disease(
        &self,
        _inference_id: &InferenceId,
    ) -> impl Future<Output = Result<DetectionReport, RemoteError>> + Send {
        async move {
            self.detections.fetch_add(1, Ordering::SeqCst);
            self.gate.pass("detect").await;
            next(&self.detect_results, || {
                Ok(DetectionReport {
                    status: DetectionStatus::Detected,
                    disease_id: Some(DiseaseId(7)),
                    confidence_level: Some(0.93),
                    message: None,
                })
            })
        }
    }

    fn visualize_inference(
        &self,
        _inference_id: &InferenceId,
    ) -> impl Future<Output = Result<Visualization, RemoteError>> + Send {
        async move {
            self.visualizations.fetch_add(1, Ordering::SeqCst);
            self.gate.pass("visualize").await;
            next(&self.visualize_results, || {
                Ok(Visualization {
                    attention_map_url: Some("https://cdn.example.org/att/inf-1.png".to_string()),
                })
            })
        }
    }

    fn post_deep_analysis(
        &self,
        _request: &DeepAnalysisRequest,
    ) -> impl Future<Output = Result<DeepAnalysisResult, RemoteError>> + Send {
        async move {
            self.analyses.fetch_add(1, Ordering::SeqCst);
            self.gate.pass("analysis").await;
            next(&self.analysis_results, || Ok(sample_analysis()))
        }
    }

    fn fetch_disease_by_id(
        &self,
        disease_id: DiseaseId,
    ) -> impl Future<Output = Result<DiseaseRecord, RemoteError>> + Send {
        async move {
            self.disease_lookups.fetch_add(1, Ordering::SeqCst);
            self.gate.pass("disease").await;
            next(&self.disease_results, || {
                Ok(DiseaseRecord {
                    id: disease_id,
                    name: "Early blight".to_string(),
                    scientific_name: Some("Alternaria solani".to_string()),
                    description: None,
                    treatment: Some("Remove infected leaves; apply copper fungicide.".to_string()),
                })
            })
        }
    }
}

// ---------------------------------------------------------------------------
// StubSoilApi
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct StubSoilApi {
    pub gate: Gate,
    pub assessments: AtomicUsize,
    pub assessment_results: Script<SoilAssessment>,
}

impl SoilApi for StubSoilApi {
    fn assess_soil(
        &self,
        _request: &SoilAssessmentRequest,
    ) -> impl Future<Output = Result<SoilAssessment, RemoteError>> + Send {
        async move {
            self.assessments.fetch_add(1, Ordering::SeqCst);
            self.gate.pass("assess").await;
            next(&self.assessment_results, || {
                Ok(SoilAssessment {
                    rating: SoilRating::Fair,
                    score: Some(61.0),
                    recommendations: vec!["Apply 2 t/ha agricultural lime".to_string()],
                })
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn gate_starts_closed_and_passes_open_names() {
        let gate = Gate::default();
        assert_eq!(gate.unclaimed(), 0);

        // Names that are not held pass without a permit.
        gate.pass("upload").await;

        gate.hold("upload");
        gate.release(1);
        assert_eq!(gate.unclaimed(), 1);
        gate.pass("upload").await;
        assert_eq!(gate.unclaimed(), 0);
    }
}
