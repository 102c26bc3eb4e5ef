//! CLI command definitions for the `phytodx` binary.
//!
//! Uses clap derive macros for argument parsing. Each workflow command mounts
//! its controller, which resumes the stored session before applying the
//! arguments.

pub mod diagnose;
pub mod render;
pub mod reset;
pub mod soil;
pub mod status;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// Diagnose plant diseases from leaf images and assess field soil.
#[derive(Parser)]
#[command(name = "phytodx", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the diagnosis workflow on a leaf image.
    Diagnose(DiagnoseArgs),

    /// Show the stored session's steps.
    Status {
        /// Show the soil wizard instead of the diagnosis workflow.
        #[arg(long)]
        soil: bool,
    },

    /// Start over: discard the stored session.
    Reset {
        /// Reset the soil wizard instead of the diagnosis workflow.
        #[arg(long)]
        soil: bool,

        /// Skip the confirmation prompt.
        #[arg(long, short)]
        force: bool,
    },

    /// Assess a field's soil sample.
    Soil(SoilArgs),

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Args, Debug)]
pub struct DiagnoseArgs {
    /// Crop category id known to the diagnosis service.
    #[arg(long)]
    pub category: i64,

    /// Display label for the category.
    #[arg(long)]
    pub label: Option<String>,

    /// Leaf image to upload.
    #[arg(long)]
    pub image: PathBuf,

    /// TOML file with questionnaire answers (`answers = ["...", ...]`).
    #[arg(long)]
    pub answers: Option<PathBuf>,

    /// Run the deep analysis even when detection is conclusive.
    #[arg(long)]
    pub deep: bool,
}

#[derive(Args, Debug)]
pub struct SoilArgs {
    /// Crop grown on the field.
    #[arg(long)]
    pub crop: String,

    /// Field area in hectares.
    #[arg(long)]
    pub area: f64,

    /// Soil pH (0-14).
    #[arg(long, allow_negative_numbers = true)]
    pub ph: f64,

    /// Nitrogen, mg/kg.
    #[arg(long, allow_negative_numbers = true)]
    pub nitrogen: f64,

    /// Phosphorus, mg/kg.
    #[arg(long, allow_negative_numbers = true)]
    pub phosphorus: f64,

    /// Potassium, mg/kg.
    #[arg(long, allow_negative_numbers = true)]
    pub potassium: f64,

    /// Organic matter, percent.
    #[arg(long, allow_negative_numbers = true)]
    pub organic_matter: f64,

    /// Moisture, percent.
    #[arg(long, allow_negative_numbers = true)]
    pub moisture: f64,
}
