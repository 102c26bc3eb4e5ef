//! SoilWizardState validation and transitions.

use phytodx_types::soil::{SoilAssessment, SoilSample, SoilTarget, SoilWizardState};

use crate::wizard::{TransitionError, require};

/// Rejected soil-wizard input. Returned to the caller, never recorded as
/// `last_error`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SoilInputError {
    #[error("crop name is required")]
    BlankCrop,

    #[error("field area must be greater than zero (got {0})")]
    NonPositiveArea(f64),

    #[error("{field} must be a number")]
    NotFinite { field: &'static str },

    #[error("{field} must be between {min} and {max} (got {value})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("record the crop and field before the sample")]
    TargetRequired,
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), SoilInputError> {
    if !value.is_finite() {
        return Err(SoilInputError::NotFinite { field });
    }
    if value < min || value > max {
        return Err(SoilInputError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

pub fn validate_target(target: &SoilTarget) -> Result<(), SoilInputError> {
    if target.crop.trim().is_empty() {
        return Err(SoilInputError::BlankCrop);
    }
    if !target.area_hectares.is_finite() {
        return Err(SoilInputError::NotFinite {
            field: "area_hectares",
        });
    }
    if target.area_hectares <= 0.0 {
        return Err(SoilInputError::NonPositiveArea(target.area_hectares));
    }
    Ok(())
}

/// Check every measurement against its physical range.
pub fn validate_sample(sample: &SoilSample) -> Result<(), SoilInputError> {
    check_range("ph", sample.ph, 0.0, 14.0)?;
    check_range("nitrogen_mg_kg", sample.nitrogen_mg_kg, 0.0, f64::MAX)?;
    check_range("phosphorus_mg_kg", sample.phosphorus_mg_kg, 0.0, f64::MAX)?;
    check_range("potassium_mg_kg", sample.potassium_mg_kg, 0.0, f64::MAX)?;
    check_range("organic_matter_pct", sample.organic_matter_pct, 0.0, 100.0)?;
    check_range("moisture_pct", sample.moisture_pct, 0.0, 100.0)
}

/// Extension trait for `SoilWizardState` transitions.
pub trait SoilStateExt {
    /// Record the crop and field. A different target clears the sample and
    /// assessment. Returns true if it changed.
    fn set_target(&mut self, target: SoilTarget) -> bool;

    /// Record the sample. A different sample clears the assessment.
    /// Returns true if it changed.
    fn set_sample(&mut self, sample: SoilSample) -> Result<bool, TransitionError>;

    fn record_assessment(&mut self, assessment: SoilAssessment) -> Result<(), TransitionError>;

    fn record_failure(&mut self, message: String);

    fn clear_error(&mut self);

    fn reset(&mut self);

    /// Drop fields whose prerequisites are missing. Returns true if anything
    /// was dropped.
    fn normalize(&mut self) -> bool;
}

impl SoilStateExt for SoilWizardState {
    fn set_target(&mut self, target: SoilTarget) -> bool {
        if self.target.as_ref() == Some(&target) {
            return false;
        }
        *self = SoilWizardState {
            target: Some(target),
            ..SoilWizardState::default()
        };
        true
    }

    fn set_sample(&mut self, sample: SoilSample) -> Result<bool, TransitionError> {
        require(self.target.is_some(), "set_sample", "a crop and field")?;
        if self.sample.as_ref() == Some(&sample) {
            return Ok(false);
        }
        self.sample = Some(sample);
        self.assessment = None;
        self.last_error = None;
        Ok(true)
    }

    fn record_assessment(&mut self, assessment: SoilAssessment) -> Result<(), TransitionError> {
        require(self.sample.is_some(), "record_assessment", "a soil sample")?;
        self.assessment = Some(assessment);
        self.last_error = None;
        Ok(())
    }

    fn record_failure(&mut self, message: String) {
        self.last_error = Some(message);
    }

    fn clear_error(&mut self) {
        self.last_error = None;
    }

    fn reset(&mut self) {
        *self = SoilWizardState::default();
    }

    fn normalize(&mut self) -> bool {
        let before = self.clone();
        if self.target.is_none() {
            self.sample = None;
        }
        if self.sample.is_none() {
            self.assessment = None;
        }
        *self != before
    }
}
