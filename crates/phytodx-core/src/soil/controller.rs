//! SoilController -- the soil wizard's owner.
//!
//! Same shape as the diagnosis controller with a single user-fired remote
//! call: the assessment.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use phytodx_types::soil::{
    SoilAssessment, SoilAssessmentRequest, SoilSample, SoilStep, SoilTarget, SoilWizardState,
};

use super::api::SoilApi;
use super::state::{SoilInputError, SoilStateExt, validate_sample, validate_target};
use super::steps::{SoilSlice, SoilSteps, derive_active_step, derive_enabled};
use crate::wizard::Dispatch;
use crate::wizard::gate::{GateError, StepLayout};
use crate::wizard::operation::{
    Completion, DEFAULT_REQUEST_TIMEOUT, Operation, OperationStatus, spawn_guarded,
};
use crate::wizard::persistence::{PersistenceBridge, SnapshotStore};
use crate::wizard::step::{StepRenderer, StepTable, StepView};

const ASSESS: &str = "assess_soil";
const ASSESS_LABEL: &str = "Soil assessment";

type SoilCompletion = Completion<(), SoilAssessment>;

#[derive(Debug, Clone)]
pub struct SoilSettings {
    pub request_timeout: Duration,
}

impl Default for SoilSettings {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Idempotency key: every field of the request. `f64` display round-trips,
/// so distinct measurements give distinct keys.
fn assessment_key(request: &SoilAssessmentRequest) -> String {
    let SoilAssessmentRequest { target, sample } = request;
    format!(
        "{}|{}|{}|{}|{}|{}|{}|{}",
        target.crop,
        target.area_hectares,
        sample.ph,
        sample.nitrogen_mg_kg,
        sample.phosphorus_mg_kg,
        sample.potassium_mg_kg,
        sample.organic_matter_pct,
        sample.moisture_pct
    )
}

/// Mounted soil wizard. Dropping it cancels an in-flight assessment.
pub struct SoilController<A: SoilApi, S: SnapshotStore> {
    api: Arc<A>,
    bridge: PersistenceBridge<S>,
    settings: SoilSettings,
    state: SoilWizardState,
    layout: StepLayout<SoilStep>,
    assess: Operation,
    tx: mpsc::UnboundedSender<SoilCompletion>,
    rx: mpsc::UnboundedReceiver<SoilCompletion>,
}

impl<A: SoilApi, S: SnapshotStore> SoilController<A, S> {
    pub async fn mount(api: Arc<A>, bridge: PersistenceBridge<S>, settings: SoilSettings) -> Self {
        let mut state = match bridge.load::<SoilWizardState>().await {
            Ok(state) => state.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(key = bridge.key(), error = %e, "discarding unreadable snapshot");
                if let Err(e) = bridge.clear().await {
                    tracing::warn!(error = %e, "failed to remove unreadable snapshot");
                }
                SoilWizardState::default()
            }
        };
        if state.normalize() {
            tracing::warn!(key = bridge.key(), "snapshot broke the step chain; truncated");
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let layout = StepLayout::new(derive_active_step(&state));
        Self {
            api,
            bridge,
            settings,
            state,
            layout,
            assess: Operation::new(ASSESS),
            tx,
            rx,
        }
    }

    pub fn unmount(self) {
        tracing::debug!(key = self.bridge.key(), "unmounting soil wizard");
    }

    /// Record the crop and field. A different target drops the sample and
    /// any assessment, in flight or done.
    pub async fn set_target(&mut self, target: SoilTarget) -> Result<bool, SoilInputError> {
        validate_target(&target)?;
        let target = SoilTarget {
            crop: target.crop.trim().to_string(),
            ..target
        };
        if !self.state.set_target(target) {
            return Ok(false);
        }
        self.assess.cancel();
        self.commit().await;
        Ok(true)
    }

    /// Record the soil sample. A different sample drops the assessment.
    pub async fn set_sample(&mut self, sample: SoilSample) -> Result<bool, SoilInputError> {
        validate_sample(&sample)?;
        let changed = self
            .state
            .set_sample(sample)
            .map_err(|_| SoilInputError::TargetRequired)?;
        if changed {
            self.assess.cancel();
            self.commit().await;
        }
        Ok(changed)
    }

    /// Request the remote assessment for the recorded sample.
    pub async fn assess(&mut self) -> Dispatch<SoilStep> {
        let Some(target) = self.state.target.clone() else {
            return Dispatch::Blocked(SoilStep::Target);
        };
        let Some(sample) = self.state.sample.clone() else {
            return Dispatch::Blocked(SoilStep::Sample);
        };
        if self.state.assessment.is_some() {
            return Dispatch::Idle;
        }

        let request = SoilAssessmentRequest { target, sample };
        let key = assessment_key(&request);

        let ticket = match self.assess.begin(key) {
            Ok(ticket) => ticket,
            Err(e) => {
                tracing::debug!(error = %e, "duplicate request suppressed");
                return Dispatch::AlreadyPending;
            }
        };
        tracing::debug!(request_id = %ticket.request_id, "issuing soil assessment");
        let api = Arc::clone(&self.api);
        spawn_guarded(&self.tx, (), ticket, self.settings.request_timeout, async move {
            api.assess_soil(&request).await
        });

        self.state.clear_error();
        self.commit().await;
        Dispatch::Started
    }

    /// Re-issue a failed assessment.
    pub async fn retry(&mut self) -> Dispatch<SoilStep> {
        if !self.assess.is_failed() && self.state.last_error.is_none() {
            return Dispatch::Idle;
        }
        self.assess.cancel();
        self.state.clear_error();
        self.assess().await
    }

    pub async fn start_over(&mut self) {
        self.assess.cancel();
        self.state.reset();
        if let Err(e) = self.bridge.clear().await {
            tracing::warn!(error = %e, "failed to clear soil snapshot");
        }
        self.layout = StepLayout::new(derive_active_step(&self.state));
    }

    pub fn expand(&mut self, step: SoilStep) -> Result<(), GateError> {
        let enabled = self.enabled_steps();
        self.layout.expand(step, &enabled)
    }

    /// Wait for the in-flight assessment and apply it. Returns false for a
    /// stale completion.
    pub async fn next_completion(&mut self) -> bool {
        let Some(Completion { ticket, result, .. }) = self.rx.recv().await else {
            return false;
        };
        if !self.assess.is_current(&ticket) {
            tracing::debug!(request_id = %ticket.request_id, "discarding stale assessment");
            return false;
        }

        match result {
            Ok(assessment) => {
                self.assess.complete(&ticket);
                tracing::info!(rating = %assessment.rating, "soil assessed");
                if let Err(e) = self.state.record_assessment(assessment) {
                    tracing::warn!(error = %e, "assessment no longer applies");
                }
            }
            Err(error) => {
                let message = error.user_message(ASSESS_LABEL);
                tracing::warn!(error = %error, "soil assessment failed");
                self.assess.fail(&ticket, message.clone());
                self.state.record_failure(message);
            }
        }
        self.commit().await;
        true
    }

    pub async fn settle(&mut self) {
        while self.assess.is_pending() {
            self.next_completion().await;
        }
    }

    async fn commit(&mut self) {
        let active = derive_active_step(&self.state);
        if self.layout.sync(active) {
            tracing::debug!(step = %active, "active soil step changed");
        }
        if let Err(e) = self.bridge.save(&self.state).await {
            tracing::warn!(key = self.bridge.key(), error = %e, "failed to snapshot soil wizard");
        }
    }

    pub fn state(&self) -> &SoilWizardState {
        &self.state
    }

    pub fn active_step(&self) -> SoilStep {
        self.layout.active()
    }

    pub fn enabled_steps(&self) -> BTreeSet<SoilStep> {
        derive_enabled(&self.state)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.state.last_error.as_deref()
    }

    pub fn assessment_status(&self) -> OperationStatus {
        self.assess.status()
    }

    pub fn views(&self) -> Vec<StepView<SoilStep, SoilSlice>> {
        let enabled = self.enabled_steps();
        SoilSteps::steps()
            .iter()
            .map(|def| StepView {
                step: def.id,
                title: def.title,
                enabled: enabled.contains(&def.id),
                expanded: self.layout.is_expanded(def.id),
                pending: def.id == SoilStep::Assessment && self.assess.is_pending(),
                error: (def.id == self.layout.active())
                    .then(|| self.state.last_error.clone())
                    .flatten(),
                slice: (def.render)(&self.state),
            })
            .collect()
    }

    pub fn render<R>(&self, renderer: &mut R)
    where
        R: StepRenderer<SoilStep, SoilSlice>,
    {
        for view in self.views() {
            renderer.render_step(&view);
        }
    }
}

impl<A: SoilApi, S: SnapshotStore> Drop for SoilController<A, S> {
    fn drop(&mut self) {
        self.assess.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soil::SOIL_SNAPSHOT_KEY;
    use crate::testing::{MemoryStore, StubSoilApi, count};
    use phytodx_types::error::RemoteError;
    use phytodx_types::soil::SoilRating;

    type Controller = SoilController<StubSoilApi, MemoryStore>;

    async fn mount(api: &Arc<StubSoilApi>, store: &MemoryStore) -> Controller {
        SoilController::mount(
            Arc::clone(api),
            PersistenceBridge::new(store.clone(), SOIL_SNAPSHOT_KEY),
            SoilSettings::default(),
        )
        .await
    }

    fn field() -> SoilTarget {
        SoilTarget {
            crop: " Maize ".to_string(),
            area_hectares: 2.5,
        }
    }

    fn sample() -> SoilSample {
        SoilSample {
            ph: 5.4,
            nitrogen_mg_kg: 18.0,
            phosphorus_mg_kg: 9.5,
            potassium_mg_kg: 120.0,
            organic_matter_pct: 2.1,
            moisture_pct: 23.0,
        }
    }

    async fn sampled(api: &Arc<StubSoilApi>, store: &MemoryStore) -> Controller {
        let mut c = mount(api, store).await;
        c.set_target(field()).await.unwrap();
        c.set_sample(sample()).await.unwrap();
        c
    }

    #[tokio::test]
    async fn assessment_completes_the_wizard() {
        let api = Arc::new(StubSoilApi::default());
        let store = MemoryStore::default();
        let mut c = sampled(&api, &store).await;
        assert_eq!(c.state().target.as_ref().unwrap().crop, "Maize");
        assert_eq!(c.active_step(), SoilStep::Assessment);

        assert_eq!(c.assess().await, Dispatch::Started);
        c.settle().await;
        assert_eq!(c.state().assessment.as_ref().unwrap().rating, SoilRating::Fair);
        assert_eq!(c.assess().await, Dispatch::Idle);
        assert_eq!(count(&api.assessments), 1);
        assert!(store.contains(SOIL_SNAPSHOT_KEY));
    }

    #[tokio::test]
    async fn invalid_input_is_returned_not_recorded() {
        let api = Arc::new(StubSoilApi::default());
        let store = MemoryStore::default();
        let mut c = mount(&api, &store).await;

        assert_eq!(
            c.set_sample(sample()).await,
            Err(SoilInputError::TargetRequired)
        );
        let bad_area = SoilTarget {
            area_hectares: -1.0,
            ..field()
        };
        assert!(c.set_target(bad_area).await.is_err());
        assert_eq!(c.last_error(), None);
        assert_eq!(c.assess().await, Dispatch::Blocked(SoilStep::Target));
    }

    #[tokio::test]
    async fn duplicate_assessment_is_suppressed() {
        let api = Arc::new(StubSoilApi::default());
        api.gate.hold("assess");
        let store = MemoryStore::default();
        let mut c = sampled(&api, &store).await;

        assert_eq!(c.assess().await, Dispatch::Started);
        assert_eq!(c.assess().await, Dispatch::AlreadyPending);
        api.gate.release(1);
        c.settle().await;
        assert_eq!(count(&api.assessments), 1);
    }

    #[tokio::test]
    async fn new_sample_discards_in_flight_assessment() {
        let api = Arc::new(StubSoilApi::default());
        api.gate.hold("assess");
        let store = MemoryStore::default();
        let mut c = sampled(&api, &store).await;
        c.assess().await;

        let limed = SoilSample { ph: 6.4, ..sample() };
        assert_eq!(c.set_sample(limed).await, Ok(true));
        assert_eq!(c.assessment_status(), OperationStatus::Idle);
        api.gate.release(1);
        assert!(!c.next_completion().await);
        assert!(c.state().assessment.is_none());
    }

    #[test]
    fn assessment_key_covers_every_measurement() {
        let request = SoilAssessmentRequest {
            target: field(),
            sample: sample(),
        };
        let wetter = SoilAssessmentRequest {
            sample: SoilSample {
                moisture_pct: 23.5,
                ..sample()
            },
            ..request.clone()
        };
        assert_eq!(assessment_key(&request), assessment_key(&request.clone()));
        assert_ne!(assessment_key(&request), assessment_key(&wetter));
        assert!(assessment_key(&request).starts_with(" Maize |2.5|5.4|"));
    }

    #[tokio::test]
    async fn unmount_cancels_in_flight_assessment() {
        let api = Arc::new(StubSoilApi::default());
        api.gate.hold("assess");
        api.assessment_results
            .lock()
            .unwrap()
            .push_back(Err(RemoteError::Transport("late".to_string())));
        let store = MemoryStore::default();
        let mut c = sampled(&api, &store).await;

        assert_eq!(c.assess().await, Dispatch::Started);
        while count(&api.assessments) == 0 {
            tokio::task::yield_now().await;
        }
        drop(c);
        api.gate.release(1);
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        assert_eq!(api.gate.unclaimed(), 1);
        assert_eq!(api.assessment_results.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failure_is_recorded_and_retryable() {
        let api = Arc::new(StubSoilApi::default());
        api.assessment_results
            .lock()
            .unwrap()
            .push_back(Err(RemoteError::Transport("reset".to_string())));
        let store = MemoryStore::default();
        let mut c = sampled(&api, &store).await;

        c.assess().await;
        c.settle().await;
        assert!(c.last_error().unwrap().contains("Soil assessment"));
        assert_eq!(c.views()[2].error.as_deref(), c.last_error());

        assert_eq!(c.retry().await, Dispatch::Started);
        c.settle().await;
        assert!(c.state().assessment.is_some());
        assert_eq!(c.last_error(), None);
    }

    #[tokio::test]
    async fn remount_and_start_over() {
        let api = Arc::new(StubSoilApi::default());
        let store = MemoryStore::default();
        let c = sampled(&api, &store).await;
        c.unmount();

        let mut c = mount(&api, &store).await;
        assert_eq!(c.active_step(), SoilStep::Assessment);
        assert_eq!(c.state().sample, Some(sample()));

        c.start_over().await;
        assert_eq!(c.active_step(), SoilStep::Target);
        assert!(!store.contains(SOIL_SNAPSHOT_KEY));
    }
}
