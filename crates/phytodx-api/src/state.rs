//! Application state wiring the remote client, session store and settings
//! together.
//!
//! Controllers are generic over the remote-service and snapshot-store ports;
//! AppState pins them to the concrete infra implementations.

use std::path::PathBuf;
use std::sync::Arc;

use phytodx_core::diagnosis::{DIAGNOSIS_SNAPSHOT_KEY, DiagnosisController};
use phytodx_core::soil::{SOIL_SNAPSHOT_KEY, SoilController};
use phytodx_core::wizard::cache::ResultCache;
use phytodx_core::wizard::persistence::PersistenceBridge;
use phytodx_infra::config::{controller_settings, load_app_config, soil_settings};
use phytodx_infra::filesystem::resolve_data_dir;
use phytodx_infra::http::HttpDiagnosisApi;
use phytodx_infra::session::SessionStore;
use phytodx_types::config::AppConfig;
use phytodx_types::diagnosis::{DeepAnalysisResult, InferenceId};

/// Concrete controller types pinned to infra implementations.
pub type ConcreteDiagnosisController = DiagnosisController<HttpDiagnosisApi, SessionStore>;

pub type ConcreteSoilController = SoilController<HttpDiagnosisApi, SessionStore>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub data_dir: PathBuf,
    pub config: AppConfig,
    pub api: Arc<HttpDiagnosisApi>,
    pub store: SessionStore,
    /// Deep-analysis results for this process, shared by every mount.
    pub cache: ResultCache<InferenceId, DeepAnalysisResult>,
}

impl AppState {
    /// Resolve the data directory, load the config and build the client.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();

        // Ensure data directory exists
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_app_config(&data_dir).await;
        let api = Arc::new(HttpDiagnosisApi::from_config(&config.remote)?);
        let store = SessionStore::from_config(&config.session, &data_dir);

        tracing::debug!(
            data_dir = %data_dir.display(),
            base_url = api.base_url(),
            persistent = store.is_persistent(),
            "application state initialized"
        );

        Ok(Self {
            data_dir,
            config,
            api,
            store,
            cache: ResultCache::new(),
        })
    }

    pub fn diagnosis_bridge(&self) -> PersistenceBridge<SessionStore> {
        PersistenceBridge::new(self.store.clone(), DIAGNOSIS_SNAPSHOT_KEY)
    }

    pub fn soil_bridge(&self) -> PersistenceBridge<SessionStore> {
        PersistenceBridge::new(self.store.clone(), SOIL_SNAPSHOT_KEY)
    }

    /// Mount the diagnosis workflow, resuming the stored session.
    pub async fn mount_diagnosis(&self) -> ConcreteDiagnosisController {
        DiagnosisController::mount(
            Arc::clone(&self.api),
            self.diagnosis_bridge(),
            self.cache.clone(),
            controller_settings(&self.config),
        )
        .await
    }

    pub async fn mount_soil(&self) -> ConcreteSoilController {
        SoilController::mount(
            Arc::clone(&self.api),
            self.soil_bridge(),
            soil_settings(&self.config),
        )
        .await
    }
}
