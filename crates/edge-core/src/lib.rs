//! Core abstractions for the incremental cache bridge.
//!
//! This crate provides the fundamental types shared by the store, cache and
//! CLI crates:
//! - `BridgeConfig` - Deploy identity, credentials and store settings
//! - `ConfigurationError` - Missing or invalid configuration
//! - `RequestId` - Unique request identifier for log correlation
//! - `RequestScope` - Per-request flags and background work tracking

mod config;
mod context;

pub use config::*;
pub use context::*;
