//! Soil-assessment wizard types.
//!
//! The soil wizard is a three-step sibling of the diagnosis workflow: pick a
//! crop and field, record a soil sample, then request a remote assessment.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The three steps of the soil-assessment wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoilStep {
    Target = 1,
    Sample = 2,
    Assessment = 3,
}

impl SoilStep {
    pub fn number(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for SoilStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SoilStep::Target => "target",
            SoilStep::Sample => "sample",
            SoilStep::Assessment => "assessment",
        };
        f.write_str(s)
    }
}

/// Crop and field the sample was taken from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilTarget {
    pub crop: String,
    pub area_hectares: f64,
}

/// Laboratory or field-kit soil measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilSample {
    pub ph: f64,
    pub nitrogen_mg_kg: f64,
    pub phosphorus_mg_kg: f64,
    pub potassium_mg_kg: f64,
    pub organic_matter_pct: f64,
    pub moisture_pct: f64,
}

/// Overall soil rating returned by the assessment service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoilRating {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl fmt::Display for SoilRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SoilRating::Poor => "poor",
            SoilRating::Fair => "fair",
            SoilRating::Good => "good",
            SoilRating::Excellent => "excellent",
        };
        f.write_str(s)
    }
}

/// Payload sent to the assessment service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilAssessmentRequest {
    pub target: SoilTarget,
    pub sample: SoilSample,
}

/// Assessment verdict with amendment recommendations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilAssessment {
    pub rating: SoilRating,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Accumulated outputs of the soil-assessment wizard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SoilWizardState {
    #[serde(default)]
    pub target: Option<SoilTarget>,
    #[serde(default)]
    pub sample: Option<SoilSample>,
    #[serde(default)]
    pub assessment: Option<SoilAssessment>,
    #[serde(default)]
    pub last_error: Option<String>,
}
