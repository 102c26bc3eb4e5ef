//! Shared domain types for phytodx.
//!
//! This crate contains the records exchanged between the diagnostic workflow
//! controller, the remote diagnosis services, and the session store:
//! workflow state, remote payloads, soil-assessment types, configuration, and
//! their associated error types.
//!
//! Zero infrastructure dependencies -- only serde and thiserror.

pub mod config;
pub mod diagnosis;
pub mod error;
pub mod soil;
