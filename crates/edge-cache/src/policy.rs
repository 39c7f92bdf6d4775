//! Browser and CDN cache policies derived from a stored entry.

use std::time::Duration;

use crate::entry::Revalidate;

/// How long the CDN may keep serving a stale response while it revalidates.
pub const STALE_WHILE_REVALIDATE_SECS: u64 = 31_536_000;

/// Browser `Cache-Control` for every cached response; browsers always
/// revalidate with the CDN.
pub const BROWSER_CACHE_CONTROL: &str = "public, max-age=0, must-revalidate";

/// Cache policy of a response served from the incremental cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CdnCachePolicy {
    /// Revalidate policy of the entry.
    pub revalidate: Revalidate,
}

impl CdnCachePolicy {
    /// Policy for an entry with the given revalidate policy.
    pub fn new(revalidate: Revalidate) -> Self {
        Self { revalidate }
    }

    /// `Cache-Control` header value.
    pub fn cache_control_header(&self) -> &'static str {
        BROWSER_CACHE_CONTROL
    }

    /// `CDN-Cache-Control` header value.
    pub fn cdn_cache_control_header(&self) -> String {
        match self.revalidate {
            Revalidate::After(secs) => format!(
                "s-maxage={}, stale-while-revalidate={}",
                secs, STALE_WHILE_REVALIDATE_SECS
            ),
            Revalidate::Never => format!("max-age={}", STALE_WHILE_REVALIDATE_SECS),
        }
    }

    /// How long the CDN treats the response as fresh.
    pub fn shared_ttl(&self) -> Duration {
        Duration::from_secs(self.revalidate.seconds().unwrap_or(STALE_WHILE_REVALIDATE_SECS))
    }
}
