//! Logging setup for the incremental cache bridge.
//!
//! Library crates only emit `tracing` events. Binaries call
//! [`init_logging`] once at startup to install a subscriber.

mod logging;

pub use logging::*;
