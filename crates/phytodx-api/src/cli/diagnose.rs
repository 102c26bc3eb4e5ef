//! `phytodx diagnose`: drive the diagnosis workflow for one leaf image.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;

use phytodx_core::diagnosis::DiagnosisOp;
use phytodx_core::wizard::Dispatch;
use phytodx_core::wizard::operation::OperationStatus;
use phytodx_types::diagnosis::{Category, DetectionOutcome, SelectedAsset};

use super::DiagnoseArgs;
use super::render::{StepTableRenderer, describe_detection, percent};
use crate::state::{AppState, ConcreteDiagnosisController};

/// Questionnaire answers read from `--answers`.
#[derive(Debug, Deserialize)]
struct AnswersFile {
    answers: Vec<String>,
}

/// Run steps 1-4, and step 5 when asked for or when detection is
/// inconclusive.
///
/// A stored session for the same category and image is resumed rather than
/// restarted.
pub async fn diagnose(state: &AppState, args: DiagnoseArgs, json: bool, quiet: bool) -> Result<()> {
    let mut controller = state.mount_diagnosis().await;

    let label = args
        .label
        .clone()
        .or_else(|| {
            controller
                .state()
                .category
                .as_ref()
                .filter(|c| c.id == args.category)
                .map(|c| c.label.clone())
        })
        .unwrap_or_else(|| format!("category {}", args.category));
    if controller
        .select_category(Category::new(args.category, label))
        .await
    {
        tracing::debug!(category = args.category, "starting a new diagnosis");
    }

    let asset = selected_asset(&args.image).await?;
    if controller.state().selected_asset.as_ref() != Some(&asset) {
        controller.select_asset(asset).await?;
    }

    if let Dispatch::Blocked(step) = controller.upload().await {
        bail!("cannot upload yet: step '{step}' is incomplete");
    }
    settle(&mut controller, quiet).await;

    if controller.last_error().is_none() && wants_deep_analysis(&controller, args.deep) {
        run_deep_analysis(&mut controller, args.answers.as_deref(), json, quiet).await?;
    }

    if json {
        let out = serde_json::json!({
            "active_step": controller.active_step(),
            "state": controller.state(),
            "disease": controller.disease(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if !quiet {
        print_summary(&controller);
    }

    if let Some(error) = controller.last_error() {
        bail!("diagnosis stopped: {error} (run the command again to retry)");
    }
    controller.unmount();
    Ok(())
}

async fn selected_asset(path: &Path) -> Result<SelectedAsset> {
    let path = tokio::fs::canonicalize(path)
        .await
        .with_context(|| format!("cannot open image {}", path.display()))?;
    let metadata = tokio::fs::metadata(&path)
        .await
        .with_context(|| format!("cannot read image {}", path.display()))?;
    if !metadata.is_file() {
        bail!("{} is not a file", path.display());
    }
    Ok(SelectedAsset::new(path, metadata.len()))
}

fn wants_deep_analysis(controller: &ConcreteDiagnosisController, forced: bool) -> bool {
    let state = controller.state();
    if state.deep_analysis_result.is_some() {
        return false;
    }
    match &state.detection {
        Some(detection) => forced || detection.recommends_deep_analysis(),
        None => false,
    }
}

async fn run_deep_analysis(
    controller: &mut ConcreteDiagnosisController,
    answers_path: Option<&Path>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    if !controller.state().is_deep_analysis_requested {
        controller.request_deep_analysis().await?;
    }

    let answers = match answers_path {
        Some(path) => read_answers(path).await?,
        None if !json && console::user_attended() => prompt_answers(controller)?,
        None => {
            tracing::info!("deep analysis unlocked but no answers supplied");
            if !json && !quiet {
                println!(
                    "  {} Deep analysis needs answers: pass {}",
                    style("!").yellow().bold(),
                    style("--answers <file.toml>").bold()
                );
            }
            return Ok(());
        }
    };

    match controller.submit_deep_analysis(&answers).await? {
        Dispatch::Cached => tracing::debug!("deep analysis reused"),
        Dispatch::Blocked(step) => bail!("deep analysis blocked at step '{step}'"),
        _ => settle(controller, quiet).await,
    }
    Ok(())
}

async fn read_answers(path: &Path) -> Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("cannot read answers from {}", path.display()))?;
    parse_answers(&content).with_context(|| format!("invalid answers file {}", path.display()))
}

fn parse_answers(content: &str) -> Result<Vec<String>> {
    let file: AnswersFile = toml::from_str(content)?;
    Ok(file.answers)
}

fn prompt_answers(controller: &ConcreteDiagnosisController) -> Result<Vec<String>> {
    println!();
    println!(
        "  {} Answer a few questions for a deeper look:",
        style("?").cyan().bold()
    );
    controller
        .questionnaire()
        .questions()
        .iter()
        .map(|question| {
            Input::<String>::new()
                .with_prompt(question)
                .interact_text()
                .map_err(Into::into)
        })
        .collect()
}

/// Apply completions until nothing is in flight, with a spinner naming the
/// running call.
async fn settle(controller: &mut ConcreteDiagnosisController, quiet: bool) {
    let spinner = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(spinner_style);
    }
    spinner.enable_steady_tick(Duration::from_millis(80));

    while controller.is_pending() {
        if let Some(op) = DiagnosisOp::ALL
            .into_iter()
            .find(|op| controller.operation_status(*op) == OperationStatus::Pending)
        {
            spinner.set_message(format!("{}...", op.label()));
        }
        controller.next_completion().await;
    }

    spinner.finish_and_clear();
}

fn print_summary(controller: &ConcreteDiagnosisController) {
    let mut renderer = StepTableRenderer::new();
    controller.render(&mut renderer);

    println!();
    println!("{}", renderer.into_table());
    println!();

    let state = controller.state();
    if let Some(result) = &state.deep_analysis_result {
        println!("  {}", style("── Deep analysis ──").dim());
        println!("  {}", result.reasoning);
        if !result.visual_indicators.is_empty() {
            println!(
                "  Indicators: {}",
                style(result.visual_indicators.join(", ")).dim()
            );
        }
        println!("  Confidence: {}", percent(result.confidence_level));
        println!();
    }

    match controller.disease() {
        Some(disease) => {
            println!("  {}", style("── Diagnosis ──").dim());
            match &disease.scientific_name {
                Some(scientific) => println!(
                    "  {} {}",
                    style(&disease.name).green().bold(),
                    style(format!("({scientific})")).dim()
                ),
                None => println!("  {}", style(&disease.name).green().bold()),
            }
            if let Some(description) = &disease.description {
                println!("  {description}");
            }
            if let Some(treatment) = &disease.treatment {
                println!("  {} {treatment}", style("Treatment:").bold());
            }
            println!();
        }
        None => {
            if let Some(detection @ DetectionOutcome::Inconclusive { .. }) = &state.detection {
                println!(
                    "  {} Detection {}",
                    style("!").yellow().bold(),
                    describe_detection(detection)
                );
                println!();
            }
        }
    }

    if state.selected_asset.is_none() && state.category.is_some() {
        println!(
            "  {} The image was rejected by validation; choose a clearer leaf photo.",
            style("✗").red().bold()
        );
        println!();
    }
}
