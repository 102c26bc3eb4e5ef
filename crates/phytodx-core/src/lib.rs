//! Workflow controllers and port definitions for phytodx.
//!
//! This crate holds the stepwise wizard machinery (step tables, gate
//! evaluation, guarded async operations, result cache, persistence bridge)
//! and the two controllers built on it: the five-step disease diagnosis
//! workflow and the soil-assessment wizard. It defines the ports
//! (`DiagnosisApi`, `SoilApi`, `SnapshotStore`) that `phytodx-infra`
//! implements and depends only on `phytodx-types`.

pub mod diagnosis;
pub mod soil;
pub mod wizard;

#[cfg(test)]
pub(crate) mod testing;
