//! Incremental cache handler for the edge platform.
//!
//! This crate provides:
//! - `StorageKey` - Bounded, URL-safe storage keys for arbitrary cache keys
//! - `CacheEntry` / `CacheValue` - Cached pages, route responses, fetches, redirects and images
//! - `encode_entry` / `decode_entry` - Binary-safe JSON codec for stored entries
//! - `CacheHandler` - `get` / `set` / `revalidate_tag` against the deploy blob store
//! - `RevalidationPropagator` - CDN purge-by-tag on revalidation
//! - `RevalidateHooks` - Explicit seam for the runtime's revalidate call
//! - `CacheHeadersBuilder` - `Cache-Control`, `CDN-Cache-Control` and `Cache-Tag` headers
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use edge_cache::{CacheHandler, CacheValue, RevalidationPropagator, SetOptions};
//! use edge_data::{FetchClient, StoreSelector};
//!
//! let transport = Arc::new(FetchClient::from_store_config(&config.store)?);
//! let handler = CacheHandler::new(
//!     Arc::new(StoreSelector::new(config.clone(), transport.clone())),
//!     Arc::new(RevalidationPropagator::new(config, transport)),
//! );
//!
//! handler
//!     .set("/blog/post-1", page, SetOptions::revalidate_after(60).with_tags(["posts"]))
//!     .await?;
//! let hit = handler.get("/blog/post-1").await;
//! handler.revalidate_tag("posts").await?;
//! ```

mod codec;
mod entry;
mod error;
mod handler;
mod headers;
mod key;
mod policy;
mod revalidate;

pub use codec::*;
pub use entry::*;
pub use error::*;
pub use handler::*;
pub use headers::*;
pub use key::*;
pub use policy::*;
pub use revalidate::*;
