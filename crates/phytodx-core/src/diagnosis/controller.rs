//! DiagnosisController -- owns the workflow state and sequences its remote calls.
//!
//! The controller is driven from a single task. User requests (`select_*`,
//! `upload`, `submit_deep_analysis`, `retry`, ...) mutate state through
//! `&mut self` and may spawn remote calls; completions come back over an
//! unbounded channel and are applied by `next_completion` / `settle`. Every
//! applied change re-derives the active step and snapshots the state.
//!
//! Steps 3 and 4 run automatically: once an upload lands, the controller
//! starts the inference, validates it, then fetches detection, attention map,
//! and the diagnosed disease record without further user input.

use std::collections::BTreeSet;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use phytodx_types::diagnosis::{
    Category, DeepAnalysisResult, DetectionReport, DiagnosisStep, DiseaseRecord, InferenceId,
    SelectedAsset, StartedInference, UploadedAsset, ValidationReport, ValidationStatus,
    Visualization, WorkflowState,
};
use phytodx_types::error::RemoteError;

use super::api::DiagnosisApi;
use super::questionnaire::{Questionnaire, QuestionnaireError};
use super::state::{TransitionError, WorkflowStateExt};
use super::steps::{DiagnosisSlice, DiagnosisSteps, derive_active_step, derive_enabled};
use crate::wizard::Dispatch;
use crate::wizard::cache::ResultCache;
use crate::wizard::gate::{GateError, StepLayout};
use crate::wizard::operation::{
    Completion, DEFAULT_REQUEST_TIMEOUT, Operation, OperationStatus, Ticket, spawn_guarded,
};
use crate::wizard::persistence::{PersistenceBridge, SnapshotStore};
use crate::wizard::step::{StepRenderer, StepTable, StepView};

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// The remote calls the diagnosis workflow makes, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosisOp {
    Upload,
    StartInference,
    Validate,
    Detect,
    Visualize,
    DeepAnalysis,
    Disease,
}

impl DiagnosisOp {
    pub const ALL: [DiagnosisOp; 7] = [
        DiagnosisOp::Upload,
        DiagnosisOp::StartInference,
        DiagnosisOp::Validate,
        DiagnosisOp::Detect,
        DiagnosisOp::Visualize,
        DiagnosisOp::DeepAnalysis,
        DiagnosisOp::Disease,
    ];

    /// Operation name used in logs and tickets.
    pub fn name(self) -> &'static str {
        match self {
            DiagnosisOp::Upload => "upload_asset",
            DiagnosisOp::StartInference => "start_inference",
            DiagnosisOp::Validate => "validate_inference",
            DiagnosisOp::Detect => "detect_disease",
            DiagnosisOp::Visualize => "visualize_inference",
            DiagnosisOp::DeepAnalysis => "post_deep_analysis",
            DiagnosisOp::Disease => "fetch_disease_by_id",
        }
    }

    /// Human label used in failure messages.
    pub fn label(self) -> &'static str {
        match self {
            DiagnosisOp::Upload => "Image upload",
            DiagnosisOp::StartInference => "Starting the inference",
            DiagnosisOp::Validate => "Inference validation",
            DiagnosisOp::Detect => "Disease detection",
            DiagnosisOp::Visualize => "Attention map",
            DiagnosisOp::DeepAnalysis => "Deep analysis",
            DiagnosisOp::Disease => "Disease lookup",
        }
    }

    /// The step whose panel shows this operation's progress and errors.
    pub fn step(self) -> DiagnosisStep {
        match self {
            DiagnosisOp::Upload => DiagnosisStep::Upload,
            DiagnosisOp::StartInference | DiagnosisOp::Validate => DiagnosisStep::Inference,
            DiagnosisOp::Detect | DiagnosisOp::Visualize => DiagnosisStep::Detection,
            DiagnosisOp::DeepAnalysis => DiagnosisStep::DeepAnalysis,
            DiagnosisOp::Disease => DiagnosisStep::Detection,
        }
    }

    /// Failures of best-effort calls are logged, never shown.
    fn is_best_effort(self) -> bool {
        self == DiagnosisOp::Visualize
    }
}

/// Successful payload of a diagnosis call.
#[derive(Debug)]
pub enum Outcome {
    Uploaded(UploadedAsset),
    Started(StartedInference),
    Validated(ValidationReport),
    Detected(DetectionReport),
    Visualized(Visualization),
    Analysed(DeepAnalysisResult),
    Disease(DiseaseRecord),
}

type DiagnosisCompletion = Completion<DiagnosisOp, Outcome>;

struct Operations {
    ops: [Operation; 7],
}

impl Operations {
    fn new() -> Self {
        Self {
            ops: DiagnosisOp::ALL.map(|op| Operation::new(op.name())),
        }
    }

    fn get(&self, op: DiagnosisOp) -> &Operation {
        &self.ops[op as usize]
    }

    fn get_mut(&mut self, op: DiagnosisOp) -> &mut Operation {
        &mut self.ops[op as usize]
    }

    /// Cancel `from` and every operation after it. Completed operations
    /// return to `Idle` as well, since their results were discarded.
    fn reset_from(&mut self, from: DiagnosisOp) {
        for op in &mut self.ops[from as usize..] {
            op.cancel();
        }
    }

    fn any_pending(&self) -> bool {
        self.ops.iter().any(Operation::is_pending)
    }
}

// ---------------------------------------------------------------------------
// Settings / errors
// ---------------------------------------------------------------------------

/// Controller tuning, usually derived from `AppConfig`.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub request_timeout: Duration,
    pub questionnaire: Questionnaire,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            questionnaire: Questionnaire::default(),
        }
    }
}

/// Rejected user input. Returned to the caller; never stored as `last_error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("select a category first")]
    CategoryRequired,

    #[error("the selected file is empty")]
    EmptyAsset,

    #[error(transparent)]
    Questionnaire(#[from] QuestionnaireError),
}

fn issued(dispatch: Dispatch<DiagnosisStep>) -> usize {
    usize::from(dispatch.is_started())
}

fn upload_key(asset: &SelectedAsset, category: &Category) -> String {
    format!("{}:{}", category.id, asset.path.display())
}

// ---------------------------------------------------------------------------
// DiagnosisController
// ---------------------------------------------------------------------------

/// Mounted diagnosis workflow.
///
/// Dropping the controller cancels every in-flight call; the snapshot stays
/// behind so a later `mount` resumes at the same step.
pub struct DiagnosisController<A: DiagnosisApi, S: SnapshotStore> {
    api: Arc<A>,
    bridge: PersistenceBridge<S>,
    cache: ResultCache<InferenceId, DeepAnalysisResult>,
    settings: ControllerSettings,
    state: WorkflowState,
    layout: StepLayout<DiagnosisStep>,
    ops: Operations,
    disease: Option<DiseaseRecord>,
    tx: mpsc::UnboundedSender<DiagnosisCompletion>,
    rx: mpsc::UnboundedReceiver<DiagnosisCompletion>,
}

impl<A: DiagnosisApi, S: SnapshotStore> DiagnosisController<A, S> {
    /// Mount the workflow, rehydrating from the session snapshot if one
    /// exists.
    ///
    /// An unreadable snapshot is discarded and the workflow starts empty. A
    /// snapshot that breaks the dependency chain is truncated at the first
    /// violation. Any automatic step the restored state is waiting on is
    /// started immediately.
    pub async fn mount(
        api: Arc<A>,
        bridge: PersistenceBridge<S>,
        cache: ResultCache<InferenceId, DeepAnalysisResult>,
        settings: ControllerSettings,
    ) -> Self {
        let mut state = match bridge.load::<WorkflowState>().await {
            Ok(Some(state)) => {
                tracing::info!(key = bridge.key(), "rehydrated diagnosis workflow");
                state
            }
            Ok(None) => WorkflowState::default(),
            Err(e) => {
                tracing::warn!(key = bridge.key(), error = %e, "discarding unreadable snapshot");
                if let Err(e) = bridge.clear().await {
                    tracing::warn!(error = %e, "failed to remove unreadable snapshot");
                }
                WorkflowState::default()
            }
        };

        if state.normalize() {
            tracing::warn!(key = bridge.key(), "snapshot broke the step chain; truncated");
        }

        if let Some(inference_id) = state.inference_id.clone() {
            if let Some(result) = &state.deep_analysis_result {
                if !cache.contains(&inference_id) {
                    cache.set(inference_id, result.clone());
                }
            } else if state.is_deep_analysis_requested {
                if let Some(cached) = cache.get(&inference_id) {
                    tracing::debug!(inference_id = %inference_id, "restored deep analysis from cache");
                    state.deep_analysis_result = Some(cached);
                }
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let layout = StepLayout::new(derive_active_step(&state));
        let mut controller = Self {
            api,
            bridge,
            cache,
            settings,
            state,
            layout,
            ops: Operations::new(),
            disease: None,
            tx,
            rx,
        };

        let started = controller.drive();
        if started > 0 {
            // Resuming an interrupted automatic step counts as a retry.
            controller.state.clear_error();
        }
        controller.commit().await;
        controller
    }

    /// Drop the controller, cancelling in-flight calls. The snapshot is kept.
    pub fn unmount(self) {
        tracing::debug!(key = self.bridge.key(), "unmounting diagnosis workflow");
    }

    // -- user requests ------------------------------------------------------

    /// Choose the classification target. A different category discards the
    /// image and everything derived from it. Returns true if it changed.
    pub async fn select_category(&mut self, category: Category) -> bool {
        if !self.state.select_category(category) {
            return false;
        }
        self.ops.reset_from(DiagnosisOp::Upload);
        self.disease = None;
        tracing::info!(category = ?self.state.category, "category selected");
        self.commit().await;
        true
    }

    /// Pick a local image. Discards any previous upload and its results.
    pub async fn select_asset(&mut self, asset: SelectedAsset) -> Result<(), InputError> {
        if self.state.category.is_none() {
            return Err(InputError::CategoryRequired);
        }
        if asset.is_empty() {
            return Err(InputError::EmptyAsset);
        }
        if let Err(e) = self.state.select_asset(asset) {
            tracing::debug!(error = %e, "asset selection rejected");
            return Err(InputError::EmptyAsset);
        }
        self.ops.reset_from(DiagnosisOp::Upload);
        self.disease = None;
        self.commit().await;
        Ok(())
    }

    /// Upload the selected image.
    ///
    /// Idempotent per (file, category): a second request while the first is
    /// in flight issues nothing, and an already-uploaded image is not sent
    /// again.
    pub async fn upload(&mut self) -> Dispatch<DiagnosisStep> {
        let Some(category) = self.state.category.clone() else {
            return Dispatch::Blocked(DiagnosisStep::Category);
        };
        let Some(asset) = self.state.selected_asset.clone().filter(|a| !a.is_empty()) else {
            return Dispatch::Blocked(DiagnosisStep::Upload);
        };
        if self.state.asset_id.is_some() {
            return Dispatch::Idle;
        }

        let key = upload_key(&asset, &category);
        let api = Arc::clone(&self.api);
        let dispatch = self.launch(DiagnosisOp::Upload, key, async move {
            api.upload_asset(&asset, &category).await.map(Outcome::Uploaded)
        });
        if dispatch.is_started() {
            self.state.clear_error();
            self.commit().await;
        }
        dispatch
    }

    /// Unlock step 5 after detection.
    pub async fn request_deep_analysis(&mut self) -> Result<(), TransitionError> {
        self.state.request_deep_analysis()?;
        self.commit().await;
        Ok(())
    }

    /// Submit questionnaire answers for deep analysis.
    ///
    /// A result already cached for the current inference is applied without
    /// a remote call.
    pub async fn submit_deep_analysis(
        &mut self,
        answers: &[String],
    ) -> Result<Dispatch<DiagnosisStep>, InputError> {
        if !self.state.is_deep_analysis_requested {
            return Ok(Dispatch::Blocked(DiagnosisStep::Detection));
        }
        let Some(inference_id) = self.state.inference_id.clone() else {
            return Ok(Dispatch::Blocked(DiagnosisStep::Inference));
        };
        let request = self.settings.questionnaire.build_request(&inference_id, answers)?;

        if let Some(cached) = self.cache.get(&inference_id) {
            tracing::info!(inference_id = %inference_id, "deep analysis served from cache");
            self.ops.get_mut(DiagnosisOp::DeepAnalysis).cancel();
            if let Err(e) = self.state.record_deep_analysis(cached) {
                tracing::warn!(error = %e, "discarding cached deep analysis");
            }
            self.drive();
            self.commit().await;
            return Ok(Dispatch::Cached);
        }

        let api = Arc::clone(&self.api);
        let dispatch = self.launch(DiagnosisOp::DeepAnalysis, inference_id.0, async move {
            api.post_deep_analysis(&request).await.map(Outcome::Analysed)
        });
        if dispatch.is_started() {
            self.state.clear_error();
            self.commit().await;
        }
        Ok(dispatch)
    }

    /// Retry whatever failed.
    ///
    /// Failed operations go back to idle and the automatic chain is driven
    /// again. A failed upload is re-issued with the same file. A failed deep
    /// analysis needs its answers resubmitted.
    pub async fn retry(&mut self) -> Dispatch<DiagnosisStep> {
        let mut retried = false;
        for op in DiagnosisOp::ALL {
            let operation = self.ops.get_mut(op);
            if operation.is_failed() {
                operation.cancel();
                retried = true;
            }
        }
        if !retried && self.state.last_error.is_none() {
            return Dispatch::Idle;
        }
        self.state.clear_error();

        let mut dispatch = Dispatch::Idle;
        if self.state.has_selected_asset() && self.state.asset_id.is_none() {
            dispatch = self.upload().await;
        }
        if self.drive() > 0 {
            dispatch = Dispatch::Started;
        }
        self.commit().await;
        dispatch
    }

    /// Clear everything, including the stored snapshot. Cached deep-analysis
    /// results survive.
    pub async fn start_over(&mut self) {
        self.ops.reset_from(DiagnosisOp::Upload);
        self.state.reset();
        self.disease = None;
        if let Err(e) = self.bridge.clear().await {
            tracing::warn!(error = %e, "failed to clear diagnosis snapshot");
        }
        self.layout = StepLayout::new(derive_active_step(&self.state));
        tracing::info!("diagnosis workflow reset");
    }

    /// Expand an enabled step, collapsing the others.
    pub fn expand(&mut self, step: DiagnosisStep) -> Result<(), GateError> {
        let enabled = self.enabled_steps();
        self.layout.expand(step, &enabled)
    }

    // -- completions --------------------------------------------------------

    /// Wait for the next remote call to finish and apply it.
    ///
    /// Returns false if the completion was stale and discarded.
    pub async fn next_completion(&mut self) -> bool {
        // `self.tx` keeps the channel open, so `recv` never yields `None`.
        let Some(completion) = self.rx.recv().await else {
            return false;
        };
        self.apply(completion).await
    }

    /// Apply completions until no call is in flight.
    pub async fn settle(&mut self) {
        while self.ops.any_pending() {
            self.next_completion().await;
        }
    }

    async fn apply(&mut self, completion: DiagnosisCompletion) -> bool {
        let Completion { kind, ticket, result } = completion;
        if !self.ops.get(kind).is_current(&ticket) {
            tracing::debug!(
                operation = kind.name(),
                request_id = %ticket.request_id,
                "discarding stale completion"
            );
            return false;
        }

        match result {
            Ok(outcome) => self.apply_outcome(kind, &ticket, outcome),
            Err(error) => {
                let message = error.user_message(kind.label());
                self.ops.get_mut(kind).fail(&ticket, message.clone());
                if kind.is_best_effort() {
                    tracing::info!(operation = kind.name(), error = %error, "best-effort call failed");
                } else {
                    tracing::warn!(operation = kind.name(), error = %error, "remote call failed");
                    self.state.record_failure(message);
                }
            }
        }

        self.drive();
        self.commit().await;
        true
    }

    fn apply_outcome(
        &mut self,
        kind: DiagnosisOp,
        ticket: &Ticket,
        outcome: Outcome,
    ) {
        let recorded = match outcome {
            Outcome::Uploaded(uploaded) => {
                self.ops.get_mut(kind).complete(ticket);
                tracing::info!(asset_id = %uploaded.asset_id, "image uploaded");
                self.state.record_upload(uploaded.asset_id)
            }
            Outcome::Started(started) => {
                self.ops.get_mut(kind).complete(ticket);
                tracing::info!(inference_id = %started.inference_id, "inference started");
                self.state.record_inference(started.inference_id)
            }
            Outcome::Validated(report) => match report.status {
                ValidationStatus::Valid => {
                    self.ops.get_mut(kind).complete(ticket);
                    self.state.record_validated()
                }
                ValidationStatus::Invalid => {
                    tracing::info!(
                        reason = report.message.as_deref().unwrap_or(""),
                        "inference rejected; a new image is required"
                    );
                    self.state.reject_asset();
                    self.ops.reset_from(DiagnosisOp::Upload);
                    self.disease = None;
                    Ok(())
                }
                ValidationStatus::Error => {
                    let detail = report
                        .message
                        .unwrap_or_else(|| "the service reported an error".to_string());
                    let message = format!("{} failed: {detail}; please retry", kind.label());
                    self.ops.get_mut(kind).fail(ticket, message.clone());
                    self.state.record_failure(message);
                    Ok(())
                }
            },
            Outcome::Detected(report) => match report.into_outcome() {
                Ok(detection) => {
                    self.ops.get_mut(kind).complete(ticket);
                    tracing::info!(
                        disease_id = ?detection.disease_id(),
                        confidence = ?detection.confidence_level(),
                        "detection recorded"
                    );
                    self.state.record_detection(detection)
                }
                Err(detail) => {
                    let message = format!("{} failed: {detail}; please retry", kind.label());
                    self.ops.get_mut(kind).fail(ticket, message.clone());
                    self.state.record_failure(message);
                    Ok(())
                }
            },
            Outcome::Visualized(visualization) => {
                self.ops.get_mut(kind).complete(ticket);
                self.state.record_attention_map(visualization.attention_map_url)
            }
            Outcome::Analysed(result) => {
                self.ops.get_mut(kind).complete(ticket);
                self.cache.set(InferenceId(ticket.key.clone()), result.clone());
                tracing::info!(inference_id = %ticket.key, "deep analysis recorded");
                self.state.record_deep_analysis(result)
            }
            Outcome::Disease(record) => {
                self.ops.get_mut(kind).complete(ticket);
                self.disease = Some(record);
                Ok(())
            }
        };

        if let Err(e) = recorded {
            tracing::warn!(operation = kind.name(), error = %e, "result no longer applies");
        }
    }

    // -- internals ----------------------------------------------------------

    /// Issue a guarded call unless one with the same key is in flight.
    fn launch<F>(&mut self, op: DiagnosisOp, key: String, call: F) -> Dispatch<DiagnosisStep>
    where
        F: Future<Output = Result<Outcome, RemoteError>> + Send + 'static,
    {
        match self.ops.get_mut(op).begin(key) {
            Ok(ticket) => {
                tracing::debug!(
                    operation = op.name(),
                    key = %ticket.key,
                    request_id = %ticket.request_id,
                    "issuing remote call"
                );
                spawn_guarded(&self.tx, op, ticket, self.settings.request_timeout, call);
                Dispatch::Started
            }
            Err(e) => {
                tracing::debug!(error = %e, "duplicate request suppressed");
                Dispatch::AlreadyPending
            }
        }
    }

    /// Start every automatic call the current state is waiting on.
    /// Returns the number of calls issued.
    fn drive(&mut self) -> usize {
        let mut started = 0;

        if self.state.inference_id.is_none() && self.ops.get(DiagnosisOp::StartInference).is_idle() {
            if let Some(asset_id) = self.state.asset_id.clone() {
                let api = Arc::clone(&self.api);
                let key = asset_id.0.clone();
                started += issued(self.launch(DiagnosisOp::StartInference, key, async move {
                    api.start_inference(&asset_id).await.map(Outcome::Started)
                }));
            }
        }

        let Some(inference_id) = self.state.inference_id.clone() else {
            return started;
        };

        if !self.state.is_validated {
            if self.ops.get(DiagnosisOp::Validate).is_idle() {
                let api = Arc::clone(&self.api);
                let id = inference_id.clone();
                started += issued(self.launch(DiagnosisOp::Validate, inference_id.0.clone(), async move {
                    api.validate_inference(&id).await.map(Outcome::Validated)
                }));
            }
            return started;
        }

        if self.state.detection.is_none() && self.ops.get(DiagnosisOp::Detect).is_idle() {
            let api = Arc::clone(&self.api);
            let id = inference_id.clone();
            started += issued(self.launch(DiagnosisOp::Detect, inference_id.0.clone(), async move {
                api.detect_disease(&id).await.map(Outcome::Detected)
            }));
        }

        if self.state.attention_map_url.is_none() && self.ops.get(DiagnosisOp::Visualize).is_idle() {
            let api = Arc::clone(&self.api);
            let id = inference_id.clone();
            started += issued(self.launch(DiagnosisOp::Visualize, inference_id.0.clone(), async move {
                api.visualize_inference(&id).await.map(Outcome::Visualized)
            }));
        }

        if let Some(disease_id) = self.state.diagnosed_disease() {
            let key = disease_id.to_string();
            let known = self.disease.as_ref().is_some_and(|d| d.id == disease_id);
            let op = self.ops.get(DiagnosisOp::Disease);
            // Any outcome for this id settles it, including a record filed
            // under a different id.
            let settled_on_key = op.key() == Some(key.as_str()) && !op.is_idle();
            if !known && !settled_on_key {
                let api = Arc::clone(&self.api);
                started += issued(self.launch(DiagnosisOp::Disease, key, async move {
                    api.fetch_disease_by_id(disease_id).await.map(Outcome::Disease)
                }));
            }
        }

        started
    }

    /// Re-derive the layout and snapshot the state. Snapshot failures are
    /// logged; the in-memory workflow carries on.
    async fn commit(&mut self) {
        debug_assert!(
            self.state.check_invariants().is_ok(),
            "workflow state broke the step chain: {:?}",
            self.state.check_invariants()
        );
        let active = derive_active_step(&self.state);
        if self.layout.sync(active) {
            tracing::debug!(step = %active, "active step changed");
        }
        if let Err(e) = self.bridge.save(&self.state).await {
            tracing::warn!(key = self.bridge.key(), error = %e, "failed to snapshot diagnosis workflow");
        }
    }

    /// Step whose panel carries `last_error`: the step of the first failed
    /// operation, else the active step.
    fn error_step(&self) -> DiagnosisStep {
        DiagnosisOp::ALL
            .into_iter()
            .find(|op| !op.is_best_effort() && self.ops.get(*op).is_failed())
            .map(DiagnosisOp::step)
            .unwrap_or_else(|| self.layout.active())
    }

    // -- accessors ----------------------------------------------------------

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn active_step(&self) -> DiagnosisStep {
        self.layout.active()
    }

    pub fn expanded_step(&self) -> DiagnosisStep {
        self.layout.expanded()
    }

    pub fn enabled_steps(&self) -> BTreeSet<DiagnosisStep> {
        derive_enabled(&self.state)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.state.last_error.as_deref()
    }

    pub fn operation_status(&self, op: DiagnosisOp) -> OperationStatus {
        self.ops.get(op).status()
    }

    /// Whether any remote call is in flight.
    pub fn is_pending(&self) -> bool {
        self.ops.any_pending()
    }

    /// Record of the diagnosed disease, once fetched.
    pub fn disease(&self) -> Option<&DiseaseRecord> {
        self.disease.as_ref()
    }

    pub fn questionnaire(&self) -> &Questionnaire {
        &self.settings.questionnaire
    }

    pub fn cache(&self) -> &ResultCache<InferenceId, DeepAnalysisResult> {
        &self.cache
    }

    /// The asset path currently selected, if any.
    pub fn selected_path(&self) -> Option<&Path> {
        self.state.selected_asset.as_ref().map(|a| a.path.as_path())
    }

    /// One view per step, in table order.
    pub fn views(&self) -> Vec<StepView<DiagnosisStep, DiagnosisSlice>> {
        let enabled = self.enabled_steps();
        let error_step = self.error_step();
        DiagnosisSteps::steps()
            .iter()
            .map(|def| StepView {
                step: def.id,
                title: def.title,
                enabled: enabled.contains(&def.id),
                expanded: self.layout.is_expanded(def.id),
                pending: DiagnosisOp::ALL
                    .into_iter()
                    .any(|op| op.step() == def.id && self.ops.get(op).is_pending()),
                error: (def.id == error_step)
                    .then(|| self.state.last_error.clone())
                    .flatten(),
                slice: (def.render)(&self.state),
            })
            .collect()
    }

    /// Feed every step view to `renderer`.
    pub fn render<R>(&self, renderer: &mut R)
    where
        R: StepRenderer<DiagnosisStep, DiagnosisSlice>,
    {
        for view in self.views() {
            renderer.render_step(&view);
        }
    }
}

impl<A: DiagnosisApi, S: SnapshotStore> Drop for DiagnosisController<A, S> {
    fn drop(&mut self) {
        for op in DiagnosisOp::ALL {
            self.ops.get_mut(op).cancel();
        }
    }
}
