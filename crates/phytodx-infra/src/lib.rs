//! Infrastructure layer for phytodx.
//!
//! Contains implementations of the ports defined in `phytodx-core`: the HTTP
//! client for the remote diagnosis and soil services, in-memory and on-disk
//! session snapshot stores, and the `config.toml` loader.

pub mod config;
pub mod filesystem;
pub mod http;
pub mod session;
