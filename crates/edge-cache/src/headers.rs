//! Response headers for content served from the incremental cache.

use crate::entry::EntryState;
use crate::handler::CacheHit;
use crate::policy::CdnCachePolicy;
use crate::revalidate::{cdn_tag, path_tag};

/// Header names.
pub mod header_names {
    /// Browser cache policy.
    pub const CACHE_CONTROL: &str = "Cache-Control";
    /// CDN cache policy.
    pub const CDN_CACHE_CONTROL: &str = "CDN-Cache-Control";
    /// Purge tags the CDN indexes the response under.
    pub const CACHE_TAG: &str = "Cache-Tag";
    /// Age of the cached entry in seconds.
    pub const AGE: &str = "Age";
    /// Cache status (HIT, STALE, MISS).
    pub const X_CACHE_STATUS: &str = "X-Cache-Status";
    /// Storage key the entry was read from.
    pub const X_STORAGE_KEY: &str = "X-Storage-Key";
    /// Request header enabling debug headers.
    pub const X_DEBUG_CACHE: &str = "X-Debug-Cache";
}

/// Outcome of a cache read, as reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Fresh hit.
    Hit,
    /// Stale hit, served while the runtime regenerates.
    Stale,
    /// Miss.
    Miss,
}

impl From<EntryState> for CacheStatus {
    fn from(state: EntryState) -> Self {
        match state {
            EntryState::Fresh => Self::Hit,
            EntryState::Stale => Self::Stale,
        }
    }
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hit => write!(f, "HIT"),
            Self::Stale => write!(f, "STALE"),
            Self::Miss => write!(f, "MISS"),
        }
    }
}

/// Builder for cache response headers.
#[derive(Debug, Default)]
pub struct CacheHeadersBuilder {
    policy: Option<CdnCachePolicy>,
    cache_tags: Vec<String>,
    age: Option<u64>,
    status: Option<CacheStatus>,
    storage_key: Option<String>,
    include_debug: bool,
}

impl CacheHeadersBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Headers for a response served from `hit` at `path`.
    pub fn from_hit(hit: &CacheHit, path: &str) -> Self {
        Self::new()
            .policy(CdnCachePolicy::new(hit.entry.revalidate))
            .tags(&hit.entry.tags)
            .path(path)
            .age(hit.age.as_secs())
            .status(hit.state.into())
            .storage_key(hit.storage_key.as_str())
    }

    /// Set the cache policy.
    pub fn policy(mut self, policy: CdnCachePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Add a cache tag; it is namespaced for the CDN.
    pub fn tag(mut self, tag: &str) -> Self {
        self.push_cache_tag(cdn_tag(tag));
        self
    }

    /// Add cache tags.
    pub fn tags(mut self, tags: &[String]) -> Self {
        for tag in tags {
            self.push_cache_tag(cdn_tag(tag));
        }
        self
    }

    /// Add the implicit tag of a page path.
    pub fn path(mut self, path: &str) -> Self {
        self.push_cache_tag(path_tag(path));
        self
    }

    /// Set the Age header.
    pub fn age(mut self, seconds: u64) -> Self {
        self.age = Some(seconds);
        self
    }

    /// Set the cache status (debug only).
    pub fn status(mut self, status: CacheStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the storage key (debug only).
    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = Some(key.into());
        self
    }

    /// Enable debug headers in output.
    pub fn include_debug(mut self, enabled: bool) -> Self {
        self.include_debug = enabled;
        self
    }

    fn push_cache_tag(&mut self, tag: String) {
        if !self.cache_tags.contains(&tag) {
            self.cache_tags.push(tag);
        }
    }

    /// Build the headers.
    pub fn build(self) -> Vec<(String, String)> {
        let mut headers = Vec::new();

        if let Some(policy) = self.policy {
            headers.push((
                header_names::CACHE_CONTROL.to_string(),
                policy.cache_control_header().to_string(),
            ));
            headers.push((
                header_names::CDN_CACHE_CONTROL.to_string(),
                policy.cdn_cache_control_header(),
            ));
        }

        if !self.cache_tags.is_empty() {
            headers.push((header_names::CACHE_TAG.to_string(), self.cache_tags.join(",")));
        }

        if let Some(age) = self.age {
            headers.push((header_names::AGE.to_string(), age.to_string()));
        }

        if self.include_debug {
            if let Some(status) = self.status {
                headers.push((header_names::X_CACHE_STATUS.to_string(), status.to_string()));
            }
            if let Some(key) = self.storage_key {
                headers.push((header_names::X_STORAGE_KEY.to_string(), key));
            }
        }

        headers
    }
}

/// Whether the request asked for debug headers.
pub fn should_include_debug_headers(request_headers: &[(String, String)]) -> bool {
    request_headers.iter().any(|(name, value)| {
        name.eq_ignore_ascii_case(header_names::X_DEBUG_CACHE) && value == "1"
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{CacheEntry, CacheValue, Headers, Revalidate, RouteValue};
    use crate::key::StorageKey;
    use std::time::Duration;

    fn hit(state: EntryState) -> CacheHit {
        CacheHit {
            entry: CacheEntry::new(
                CacheValue::Route(RouteValue {
                    body: Vec::new(),
                    headers: Headers::new(),
                    status: 200,
                }),
                0,
            )
            .with_revalidate(Revalidate::After(60))
            .with_tags(vec!["posts".into(), "feed".into()]),
            state,
            storage_key: StorageKey::encode("/blog/post-1"),
            age: Duration::from_millis(12_500),
        }
    }

    fn value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
        headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_headers_from_hit() {
        let headers = CacheHeadersBuilder::from_hit(&hit(EntryState::Fresh), "/blog/post-1").build();

        assert_eq!(
            value(&headers, "Cache-Control"),
            Some("public, max-age=0, must-revalidate")
        );
        assert_eq!(
            value(&headers, "CDN-Cache-Control"),
            Some("s-maxage=60, stale-while-revalidate=31536000")
        );
        assert_eq!(
            value(&headers, "Cache-Tag"),
            Some("_N_T_posts,_N_T_feed,_N_T_/blog/post-1")
        );
        assert_eq!(value(&headers, "Age"), Some("12"));
        assert_eq!(value(&headers, "X-Cache-Status"), None);
    }

    #[test]
    fn test_debug_headers() {
        let headers = CacheHeadersBuilder::from_hit(&hit(EntryState::Stale), "/blog/post-1")
            .include_debug(true)
            .build();

        assert_eq!(value(&headers, "X-Cache-Status"), Some("STALE"));
        assert_eq!(
            value(&headers, "X-Storage-Key"),
            Some(StorageKey::encode("blog/post-1").as_str())
        );
    }

    #[test]
    fn test_duplicate_tags_are_collapsed() {
        let headers = CacheHeadersBuilder::new()
            .tag("posts")
            .tags(&["posts".to_string()])
            .path("index")
            .path("/")
            .build();

        assert_eq!(value(&headers, "Cache-Tag"), Some("_N_T_posts,_N_T_/"));
        assert_eq!(value(&headers, "Cache-Control"), None);
    }

    #[test]
    fn test_debug_request_header() {
        assert!(should_include_debug_headers(&[(
            "x-debug-cache".into(),
            "1".into()
        )]));
        assert!(!should_include_debug_headers(&[(
            "X-Debug-Cache".into(),
            "0".into()
        )]));
    }
}
