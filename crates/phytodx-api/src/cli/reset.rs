//! `phytodx reset`: start over by discarding the stored session.

use anyhow::Result;
use console::style;
use dialoguer::Confirm;

use crate::state::AppState;

/// Clear the diagnosis (or soil) snapshot. Asks first unless `force` is set
/// or nobody is at the terminal.
pub async fn reset(state: &AppState, soil: bool, force: bool, json: bool) -> Result<()> {
    let (bridge, what) = if soil {
        (state.soil_bridge(), "soil assessment")
    } else {
        (state.diagnosis_bridge(), "diagnosis")
    };

    if !force && !json && console::user_attended() {
        let confirmed = Confirm::new()
            .with_prompt(format!("Discard the stored {what} session?"))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    bridge.clear().await?;
    tracing::info!(key = bridge.key(), "session reset");

    if json {
        let out = serde_json::json!({ "reset": bridge.key() });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Started over: {what} session cleared.",
        style("✓").green().bold()
    );
    println!();
    Ok(())
}
