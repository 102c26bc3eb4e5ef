//! HTTP adapters for the remote services.

pub mod client;

pub use client::HttpDiagnosisApi;
