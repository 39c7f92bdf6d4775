//! Cache values as the rendering runtime sees them.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Response headers attached to a cached value.
pub type Headers = BTreeMap<String, String>;

/// Kind of a cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// A rendered page.
    Page,
    /// A route handler response.
    Route,
    /// An outbound fetch made during rendering.
    Fetch,
    /// A redirect produced at build or render time.
    Redirect,
    /// An optimized image.
    Image,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Page => write!(f, "page"),
            Self::Route => write!(f, "route"),
            Self::Fetch => write!(f, "fetch"),
            Self::Redirect => write!(f, "redirect"),
            Self::Image => write!(f, "image"),
        }
    }
}

/// When an entry becomes stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Revalidate {
    /// Stale this many seconds after it was written.
    After(u64),
    /// Never stale.
    #[default]
    Never,
}

impl Revalidate {
    /// Seconds until stale, or `None` for immutable entries.
    pub fn seconds(&self) -> Option<u64> {
        match self {
            Self::After(secs) => Some(*secs),
            Self::Never => None,
        }
    }
}

// Stored as a number of seconds, or `false` for immutable entries.
impl Serialize for Revalidate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::After(secs) => serializer.serialize_u64(*secs),
            Self::Never => serializer.serialize_bool(false),
        }
    }
}

impl<'de> Deserialize<'de> for Revalidate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Seconds(u64),
            Flag(bool),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Seconds(secs) => Ok(Self::After(secs)),
            Raw::Flag(false) => Ok(Self::Never),
            Raw::Flag(true) => Err(serde::de::Error::custom(
                "revalidate must be a number of seconds or false",
            )),
        }
    }
}

/// A rendered page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageValue {
    /// Rendered HTML.
    pub html: Vec<u8>,
    /// Data the page was rendered from (page props).
    pub page_data: Option<serde_json::Value>,
    /// Server component payload.
    pub rsc_data: Option<Vec<u8>>,
    /// Response headers.
    pub headers: Headers,
    /// Response status.
    pub status: Option<u16>,
}

/// A route handler response.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteValue {
    /// Response body.
    pub body: Vec<u8>,
    /// Response headers.
    pub headers: Headers,
    /// Response status.
    pub status: u16,
}

/// Result of an outbound fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchValue {
    /// Response headers.
    #[serde(default)]
    pub headers: Headers,
    /// Response body, as the runtime already holds it (text).
    pub body: String,
    /// Response status.
    pub status: u16,
    /// Requested URL.
    pub url: String,
}

/// A redirect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedirectValue {
    /// Redirect properties as produced by the runtime.
    pub props: serde_json::Value,
}

/// An optimized image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageValue {
    /// Image bytes.
    pub buffer: Vec<u8>,
    /// File extension (`webp`, `avif`, ...).
    pub extension: String,
    /// Entity tag of the optimized image.
    pub etag: String,
}

/// A value the rendering runtime caches.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    /// See [`PageValue`].
    Page(PageValue),
    /// See [`RouteValue`].
    Route(RouteValue),
    /// See [`FetchValue`].
    Fetch(FetchValue),
    /// See [`RedirectValue`].
    Redirect(RedirectValue),
    /// See [`ImageValue`].
    Image(ImageValue),
}

impl CacheValue {
    /// Kind of this value.
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Page(_) => EntryKind::Page,
            Self::Route(_) => EntryKind::Route,
            Self::Fetch(_) => EntryKind::Fetch,
            Self::Redirect(_) => EntryKind::Redirect,
            Self::Image(_) => EntryKind::Image,
        }
    }

    /// Status a response served from this value would carry.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Page(page) => page.status,
            Self::Route(route) => Some(route.status),
            Self::Fetch(fetch) => Some(fetch.status),
            Self::Redirect(_) | Self::Image(_) => None,
        }
    }
}

/// Freshness of an entry at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Younger than its revalidate window, and no tag revalidated since.
    Fresh,
    /// Past its revalidate window, or one of its tags was revalidated after
    /// it was written. Still servable as a fallback.
    Stale,
}

/// The stored unit.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// The cached value.
    pub value: CacheValue,
    /// Write time, milliseconds since the Unix epoch.
    pub last_modified: i64,
    /// Revalidate policy supplied at write time.
    pub revalidate: Revalidate,
    /// Invalidation tags.
    pub tags: Vec<String>,
}

impl CacheEntry {
    /// Create an entry written at `last_modified`.
    pub fn new(value: CacheValue, last_modified: i64) -> Self {
        Self {
            value,
            last_modified,
            revalidate: Revalidate::Never,
            tags: Vec::new(),
        }
    }

    /// Set the revalidate policy.
    pub fn with_revalidate(mut self, revalidate: Revalidate) -> Self {
        self.revalidate = revalidate;
        self
    }

    /// Set the tags.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Kind of the cached value.
    pub fn kind(&self) -> EntryKind {
        self.value.kind()
    }

    /// Age at `now_ms`. Clock skew never yields a negative age.
    pub fn age_at(&self, now_ms: i64) -> Duration {
        let millis = now_ms.saturating_sub(self.last_modified).max(0);
        Duration::from_millis(millis as u64)
    }

    /// Freshness by age alone.
    pub fn state_at(&self, now_ms: i64) -> EntryState {
        match self.revalidate {
            Revalidate::Never => EntryState::Fresh,
            Revalidate::After(secs) if self.age_at(now_ms) >= Duration::from_secs(secs) => {
                EntryState::Stale
            }
            Revalidate::After(_) => EntryState::Fresh,
        }
    }

    /// Remaining time until stale, if any.
    pub fn remaining_at(&self, now_ms: i64) -> Option<Duration> {
        let secs = self.revalidate.seconds()?;
        Some(Duration::from_secs(secs).saturating_sub(self.age_at(now_ms)))
    }
}
