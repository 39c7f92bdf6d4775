//! Conversion between cache entries and their stored JSON shape.
//!
//! Stored shape:
//!
//! ```json
//! { "kind": "page", "value": { ... }, "lastModified": 1700000000000,
//!   "revalidate": 60, "tags": ["posts"] }
//! ```
//!
//! Binary bodies are standard base64 inside `value`; fetch results and
//! redirects are stored as-is.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::entry::{
    CacheEntry, CacheValue, EntryKind, FetchValue, Headers, ImageValue, PageValue, RedirectValue,
    Revalidate, RouteValue,
};

/// Errors converting to or from the stored shape.
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("invalid base64 in {field}: {source}")]
    Base64 {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error("malformed {kind} value: {source}")]
    Shape {
        kind: EntryKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid cache entry JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// An entry in its stored shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedEntry {
    /// Value kind; selects how `value` is read.
    pub kind: EntryKind,
    /// Kind-specific payload.
    pub value: serde_json::Value,
    /// Write time, milliseconds since the Unix epoch.
    pub last_modified: i64,
    /// Revalidate policy.
    pub revalidate: Revalidate,
    /// Invalidation tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredPage {
    html: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    page_data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rsc_data: Option<String>,
    #[serde(default)]
    headers: Headers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
}

#[derive(Serialize, Deserialize)]
struct StoredRoute {
    body: String,
    #[serde(default)]
    headers: Headers,
    status: u16,
}

#[derive(Serialize, Deserialize)]
struct StoredImage {
    buffer: String,
    extension: String,
    etag: String,
}

/// Convert an entry to its stored shape.
pub fn to_storage(entry: &CacheEntry) -> Result<SerializedEntry, EncodingError> {
    let value = match &entry.value {
        CacheValue::Page(page) => serde_json::to_value(StoredPage {
            html: STANDARD.encode(&page.html),
            page_data: page.page_data.clone(),
            rsc_data: page.rsc_data.as_ref().map(|rsc| STANDARD.encode(rsc)),
            headers: page.headers.clone(),
            status: page.status,
        })?,
        CacheValue::Route(route) => serde_json::to_value(StoredRoute {
            body: STANDARD.encode(&route.body),
            headers: route.headers.clone(),
            status: route.status,
        })?,
        CacheValue::Fetch(fetch) => serde_json::to_value(fetch)?,
        CacheValue::Redirect(redirect) => serde_json::to_value(redirect)?,
        CacheValue::Image(image) => serde_json::to_value(StoredImage {
            buffer: STANDARD.encode(&image.buffer),
            extension: image.extension.clone(),
            etag: image.etag.clone(),
        })?,
    };

    Ok(SerializedEntry {
        kind: entry.kind(),
        value,
        last_modified: entry.last_modified,
        revalidate: entry.revalidate,
        tags: entry.tags.clone(),
    })
}

/// Convert a stored shape back to an entry.
pub fn from_storage(serialized: SerializedEntry) -> Result<CacheEntry, EncodingError> {
    let kind = serialized.kind;
    let value = match kind {
        EntryKind::Page => {
            let stored: StoredPage = shape(kind, serialized.value)?;
            CacheValue::Page(PageValue {
                html: decode("html", &stored.html)?,
                page_data: stored.page_data,
                rsc_data: stored
                    .rsc_data
                    .as_deref()
                    .map(|rsc| decode("rscData", rsc))
                    .transpose()?,
                headers: stored.headers,
                status: stored.status,
            })
        }
        EntryKind::Route => {
            let stored: StoredRoute = shape(kind, serialized.value)?;
            CacheValue::Route(RouteValue {
                body: decode("body", &stored.body)?,
                headers: stored.headers,
                status: stored.status,
            })
        }
        EntryKind::Fetch => CacheValue::Fetch(shape::<FetchValue>(kind, serialized.value)?),
        EntryKind::Redirect => {
            CacheValue::Redirect(shape::<RedirectValue>(kind, serialized.value)?)
        }
        EntryKind::Image => {
            let stored: StoredImage = shape(kind, serialized.value)?;
            CacheValue::Image(ImageValue {
                buffer: decode("buffer", &stored.buffer)?,
                extension: stored.extension,
                etag: stored.etag,
            })
        }
    };

    Ok(CacheEntry {
        value,
        last_modified: serialized.last_modified,
        revalidate: serialized.revalidate,
        tags: serialized.tags,
    })
}

/// Serialize an entry to the bytes written to the store.
pub fn encode_entry(entry: &CacheEntry) -> Result<Bytes, EncodingError> {
    Ok(Bytes::from(serde_json::to_vec(&to_storage(entry)?)?))
}

/// Parse bytes read from the store.
pub fn decode_entry(bytes: &[u8]) -> Result<CacheEntry, EncodingError> {
    from_storage(serde_json::from_slice(bytes)?)
}

fn shape<T: serde::de::DeserializeOwned>(
    kind: EntryKind,
    value: serde_json::Value,
) -> Result<T, EncodingError> {
    serde_json::from_value(value).map_err(|source| EncodingError::Shape { kind, source })
}

fn decode(field: &'static str, text: &str) -> Result<Vec<u8>, EncodingError> {
    STANDARD
        .decode(text)
        .map_err(|source| EncodingError::Base64 { field, source })
}
