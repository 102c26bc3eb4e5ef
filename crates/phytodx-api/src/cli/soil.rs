//! `phytodx soil`: run the three-step soil wizard.

use std::time::Duration;

use anyhow::{Result, bail};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use phytodx_core::wizard::Dispatch;
use phytodx_types::soil::{SoilSample, SoilTarget};

use super::SoilArgs;
use super::render::StepTableRenderer;
use crate::state::{AppState, ConcreteSoilController};

pub async fn assess(state: &AppState, args: SoilArgs, json: bool, quiet: bool) -> Result<()> {
    let mut controller = state.mount_soil().await;

    let (target, sample) = split_args(args);
    controller.set_target(target).await?;
    controller.set_sample(sample).await?;

    match controller.assess().await {
        Dispatch::Started | Dispatch::AlreadyPending => settle(&mut controller, quiet).await,
        Dispatch::Blocked(step) => bail!("cannot assess yet: step '{step}' is incomplete"),
        Dispatch::Cached | Dispatch::Idle => {
            tracing::debug!("soil assessment already recorded for this sample");
        }
    }

    if json {
        let out = serde_json::json!({
            "active_step": controller.active_step(),
            "state": controller.state(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if !quiet {
        print_summary(&controller);
    }

    if let Some(error) = controller.last_error() {
        bail!("soil assessment failed: {error} (run the command again to retry)");
    }
    controller.unmount();
    Ok(())
}

fn split_args(args: SoilArgs) -> (SoilTarget, SoilSample) {
    let target = SoilTarget {
        crop: args.crop,
        area_hectares: args.area,
    };
    let sample = SoilSample {
        ph: args.ph,
        nitrogen_mg_kg: args.nitrogen,
        phosphorus_mg_kg: args.phosphorus,
        potassium_mg_kg: args.potassium,
        organic_matter_pct: args.organic_matter,
        moisture_pct: args.moisture,
    };
    (target, sample)
}

async fn settle(controller: &mut ConcreteSoilController, quiet: bool) {
    let spinner = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(spinner_style);
    }
    spinner.set_message("Assessing soil...");
    spinner.enable_steady_tick(Duration::from_millis(80));

    controller.settle().await;

    spinner.finish_and_clear();
}

fn print_summary(controller: &ConcreteSoilController) {
    let mut renderer = StepTableRenderer::new();
    controller.render(&mut renderer);

    println!();
    println!("{}", renderer.into_table());
    println!();

    if let Some(assessment) = &controller.state().assessment {
        println!("  {}", style("── Recommendations ──").dim());
        if assessment.recommendations.is_empty() {
            println!("  {}", style("None; the soil suits the crop.").dim());
        }
        for recommendation in &assessment.recommendations {
            println!("  • {recommendation}");
        }
        println!();
    }
}
