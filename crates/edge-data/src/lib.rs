//! Blob store access and HTTP transport for the incremental cache bridge.
//!
//! This crate provides:
//! - `HttpTransport` - Injected network seam used for all store and purge traffic
//! - `FetchClient` - reqwest-backed transport with timeout/retry
//! - `RetryPolicy` / `TimeoutConfig` - Transport policies
//! - `BlobStore` - Key/value store trait, with HTTP and in-memory backends
//! - `StoreSelector` - Resolves the global or region-scoped deploy store

mod client;
mod memory;
mod retry;
mod store;
mod timeout;

#[cfg(any(test, feature = "test-util"))]
mod testing;

pub use client::*;
pub use memory::*;
pub use retry::*;
pub use store::*;
pub use timeout::*;

#[cfg(any(test, feature = "test-util"))]
pub use testing::*;
