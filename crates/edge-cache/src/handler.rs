//! The cache handler the rendering runtime talks to.
//!
//! Reads never fail: any problem reaching or decoding the store is logged
//! and reported as a miss, so the runtime renders fresh. Writes and
//! revalidations propagate their errors to the caller.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use edge_core::RequestScope;
use edge_data::{BlobStore, StoreResolver};
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::codec::{decode_entry, encode_entry};
use crate::entry::{CacheEntry, CacheValue, EntryKind, EntryState, Revalidate};
use crate::error::{CacheError, CacheResult};
use crate::key::StorageKey;
use crate::revalidate::{MarkOnDemandRevalidate, RevalidateHooks, RevalidationPropagator};

/// Options supplied with a write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Revalidate policy persisted with the entry.
    pub revalidate: Revalidate,
    /// Invalidation tags.
    pub tags: Vec<String>,
}

impl SetOptions {
    /// Entry stale after `secs` seconds.
    pub fn revalidate_after(secs: u64) -> Self {
        Self {
            revalidate: Revalidate::After(secs),
            tags: Vec::new(),
        }
    }

    /// Set the tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// A successful read.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    /// The stored entry.
    pub entry: CacheEntry,
    /// Freshness at read time.
    pub state: EntryState,
    /// Key the entry was read from.
    pub storage_key: StorageKey,
    /// Age at read time.
    pub age: Duration,
}

impl CacheHit {
    /// Whether the entry should be revalidated.
    pub fn is_stale(&self) -> bool {
        self.state == EntryState::Stale
    }
}

/// Last on-demand revalidation of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagManifest {
    /// Revalidation time, milliseconds since the Unix epoch.
    pub revalidated_at: i64,
}

/// Incremental cache handler backed by the deploy blob store.
pub struct CacheHandler {
    stores: Arc<dyn StoreResolver>,
    propagator: Arc<RevalidationPropagator>,
    hooks: RevalidateHooks,
}

impl std::fmt::Debug for CacheHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheHandler")
            .field("propagator", &self.propagator)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

impl CacheHandler {
    /// Create a handler. The runtime's revalidate call marks the request
    /// scope by default; see [`MarkOnDemandRevalidate`].
    pub fn new(stores: Arc<dyn StoreResolver>, propagator: Arc<RevalidationPropagator>) -> Self {
        Self {
            stores,
            propagator,
            hooks: RevalidateHooks::new().with(Arc::new(MarkOnDemandRevalidate)),
        }
    }

    /// Replace the revalidate hooks.
    pub fn with_hooks(mut self, hooks: RevalidateHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Registered revalidate hooks.
    pub fn hooks(&self) -> &RevalidateHooks {
        &self.hooks
    }

    /// The purge propagator.
    pub fn propagator(&self) -> &Arc<RevalidationPropagator> {
        &self.propagator
    }

    /// Read an entry.
    pub async fn get(&self, key: &str) -> Option<CacheHit> {
        self.get_at(key, now_ms()).await
    }

    /// Read an entry, judging freshness at `now_ms`.
    pub async fn get_at(&self, key: &str, now_ms: i64) -> Option<CacheHit> {
        let storage_key = StorageKey::encode(key);
        match self.lookup(&storage_key, now_ms).await {
            Ok(Some(hit)) => {
                tracing::debug!(storage_key = %hit.storage_key, state = ?hit.state, "cache hit");
                Some(hit)
            }
            Ok(None) => {
                tracing::debug!(storage_key = %storage_key, "cache miss");
                None
            }
            Err(e) => {
                tracing::warn!(storage_key = %storage_key, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    async fn lookup(&self, storage_key: &StorageKey, now_ms: i64) -> CacheResult<Option<CacheHit>> {
        let store = self.stores.resolve_store()?;
        let Some(bytes) = store.get(storage_key.as_str()).await? else {
            return Ok(None);
        };
        let entry = decode_entry(&bytes)?;

        let mut state = entry.state_at(now_ms);
        if state == EntryState::Fresh && revalidated_since(store.as_ref(), &entry).await {
            state = EntryState::Stale;
        }

        Ok(Some(CacheHit {
            age: entry.age_at(now_ms),
            entry,
            state,
            storage_key: storage_key.clone(),
        }))
    }

    /// Write an entry stamped with the current time.
    pub async fn set(&self, key: &str, value: CacheValue, options: SetOptions) -> CacheResult<()> {
        let storage_key = StorageKey::encode(key);
        let store = self.stores.resolve_store()?;
        let entry = CacheEntry::new(value, now_ms())
            .with_revalidate(options.revalidate)
            .with_tags(options.tags);

        store.set(storage_key.as_str(), encode_entry(&entry)?).await?;
        tracing::debug!(storage_key = %storage_key, kind = %entry.kind(), "cache write");
        Ok(())
    }

    /// Write an entry during a request.
    ///
    /// When the request performed an on-demand revalidation, a page write
    /// also purges the page's path from the CDN. The purge runs as tracked
    /// background work on `scope` and does not delay the write.
    pub async fn set_with_scope(
        &self,
        key: &str,
        value: CacheValue,
        options: SetOptions,
        scope: &RequestScope,
    ) -> CacheResult<()> {
        let is_page = value.kind() == EntryKind::Page;
        self.set(key, value, options).await?;

        if is_page && scope.is_on_demand_revalidate() {
            let propagator = self.propagator.clone();
            let path = key.to_string();
            scope.track_background_work(async move {
                if let Err(e) = propagator.purge_path(&path).await {
                    tracing::warn!(path = %path, error = %e, "background path purge failed");
                }
            });
        }
        Ok(())
    }

    /// Revalidate everything tagged with `tag`.
    pub async fn revalidate_tag(&self, tag: &str) -> CacheResult<()> {
        self.revalidate_tags(&[tag.to_string()]).await
    }

    /// Revalidate several tags.
    ///
    /// Records the revalidation time of each tag, then purges the tags from
    /// the CDN. The purge is attempted even if recording failed, and its
    /// outcome is the result: a failed record is logged, since the edge has
    /// still been invalidated.
    pub async fn revalidate_tags(&self, tags: &[String]) -> CacheResult<()> {
        if let Err(e) = self.record_revalidation(tags, now_ms()).await {
            tracing::warn!(tags = ?tags, error = %e, "failed to record tag revalidation");
        }
        self.propagator.purge_tags(tags).await?;
        Ok(())
    }

    /// Run the revalidate hooks for a page path.
    pub async fn revalidate_path(&self, path: &str, scope: &RequestScope) -> CacheResult<()> {
        self.hooks.notify(path, scope).await?;
        Ok(())
    }

    async fn record_revalidation(&self, tags: &[String], now_ms: i64) -> CacheResult<()> {
        if tags.is_empty() {
            return Ok(());
        }
        let store = self.stores.resolve_store()?;
        let manifest = Bytes::from(serde_json::to_vec(&TagManifest {
            revalidated_at: now_ms,
        })
        .map_err(crate::codec::EncodingError::from)?);

        let writes = tags.iter().map(|tag| {
            let store = store.clone();
            let manifest = manifest.clone();
            async move {
                let key = StorageKey::for_tag_manifest(tag);
                store.set(key.as_str(), manifest).await
            }
        });

        for result in join_all(writes).await {
            result.map_err(CacheError::from)?;
        }
        tracing::debug!(tags = ?tags, "recorded tag revalidation");
        Ok(())
    }
}

/// Whether any tag of `entry` was revalidated at or after it was written.
/// A write in the same millisecond as the revalidation counts as stale, as
/// their order is unknown. Unreadable manifests count as not revalidated.
async fn revalidated_since(store: &dyn BlobStore, entry: &CacheEntry) -> bool {
    let reads = entry.tags.iter().map(|tag| async move {
        let key = StorageKey::for_tag_manifest(tag);
        match store.get(key.as_str()).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<TagManifest>(&bytes) {
                Ok(manifest) => Some(manifest),
                Err(e) => {
                    tracing::warn!(tag = %tag, error = %e, "ignoring malformed tag manifest");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(tag = %tag, error = %e, "tag manifest read failed");
                None
            }
        }
    });

    join_all(reads)
        .await
        .into_iter()
        .flatten()
        .any(|manifest| manifest.revalidated_at >= entry.last_modified)
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
