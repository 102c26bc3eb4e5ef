//! `phytodx status`: show the stored session without resuming it.
//!
//! Reads the snapshot directly instead of mounting a controller, so no
//! remote call is started.

use anyhow::Result;
use console::style;
use serde::Serialize;

use phytodx_core::diagnosis::{DiagnosisSteps, WorkflowStateExt};
use phytodx_core::soil::{SoilStateExt, SoilSteps};
use phytodx_core::wizard::gate::{derive_active_step, resting_views};
use phytodx_core::wizard::persistence::PersistenceBridge;
use phytodx_core::wizard::step::{StepRenderer, StepTable};
use phytodx_infra::filesystem::sessions_dir;
use phytodx_infra::session::SessionStore;
use phytodx_types::diagnosis::WorkflowState;
use phytodx_types::soil::SoilWizardState;

use super::render::StepTableRenderer;
use crate::state::AppState;

pub async fn status(state: &AppState, soil: bool, json: bool) -> Result<()> {
    if soil {
        let mut wizard: SoilWizardState = load_or_default(&state.soil_bridge()).await;
        wizard.normalize();
        show::<SoilSteps>(state, &wizard, wizard.last_error.as_deref(), json)
    } else {
        let mut workflow: WorkflowState = load_or_default(&state.diagnosis_bridge()).await;
        workflow.normalize();
        show::<DiagnosisSteps>(state, &workflow, workflow.last_error.as_deref(), json)
    }
}

/// An unreadable snapshot shows as an empty session, matching what a mount
/// would do with it.
async fn load_or_default<T>(bridge: &PersistenceBridge<SessionStore>) -> T
where
    T: Default + serde::de::DeserializeOwned,
{
    match bridge.load::<T>().await {
        Ok(found) => found.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(key = bridge.key(), error = %e, "stored session is unreadable");
            T::default()
        }
    }
}

fn show<T>(app: &AppState, state: &T::State, error: Option<&str>, json: bool) -> Result<()>
where
    T: StepTable,
    T::State: Serialize,
    StepTableRenderer: StepRenderer<T::Step, T::Slice>,
{
    let active = derive_active_step::<T>(state);

    if json {
        let out = serde_json::json!({
            "active_step": active.to_string(),
            "persistent": app.store.is_persistent(),
            "state": state,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let mut renderer = StepTableRenderer::new();
    for view in resting_views::<T>(state, error) {
        renderer.render_step(&view);
    }

    println!();
    println!("{}", renderer.into_table());
    println!();
    if app.store.is_persistent() {
        println!(
            "  Sessions: {}",
            style(sessions_dir(&app.data_dir).display()).dim()
        );
    } else {
        println!(
            "  {}",
            style("Sessions are not persisted (session.persist_to_disk = false).").dim()
        );
    }
    println!();
    Ok(())
}
