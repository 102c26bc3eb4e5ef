//! Soil-assessment wizard.
//!
//! A three-step sibling of the diagnosis workflow built on the same wizard
//! machinery: pick a crop and field, record a soil sample, then request a
//! remote assessment.

pub mod api;
pub mod controller;
pub mod state;
pub mod steps;

/// Session snapshot key for the soil wizard.
pub const SOIL_SNAPSHOT_KEY: &str = "soil-assessment";

pub use controller::{SoilController, SoilSettings};
pub use state::{SoilInputError, SoilStateExt, validate_sample, validate_target};
pub use steps::{SoilSlice, SoilSteps, derive_active_step, derive_enabled};
