//! Storage key encoding.
//!
//! Cache keys come from the rendering runtime and can be anything: paths,
//! fetch URLs with query strings, non-ASCII text, arbitrarily long. The store
//! only accepts bounded, URL-safe keys, so every cache key goes through
//! [`StorageKey::encode`] first.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use sha2::{Digest, Sha256};

/// Maximum length of a storage key.
pub const MAX_KEY_LENGTH: usize = 180;

/// Length of the URL-safe base64 SHA-256 digest appended to truncated keys.
pub const DIGEST_LENGTH: usize = 43;

/// Prefix of per-tag revalidation record keys. `.` is outside the URL-safe
/// base64 alphabet, so no encoded cache key can start with it.
const TAG_MANIFEST_PREFIX: &str = "tag.";

/// A bounded-length, URL-safe key for the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    key: String,
    namespace_len: usize,
    truncated: bool,
}

impl StorageKey {
    /// Encode a cache key.
    ///
    /// A single leading `/` is dropped, the rest is URL-safe base64. When
    /// that exceeds [`MAX_KEY_LENGTH`], the head of the encoding is kept and
    /// a SHA-256 digest of the whole key is appended, so keys sharing a long
    /// prefix still map to distinct storage keys.
    pub fn encode(key: &str) -> Self {
        let key = key.strip_prefix('/').unwrap_or(key);
        let (key, truncated) = encode_within(key, MAX_KEY_LENGTH);
        Self {
            key,
            namespace_len: 0,
            truncated,
        }
    }

    /// Key under which the revalidation time of `tag` is recorded.
    ///
    /// Lives outside the key space of [`StorageKey::encode`], so no cache
    /// entry can share a slot with a tag record.
    pub fn for_tag_manifest(tag: &str) -> Self {
        let (encoded, truncated) = encode_within(tag, MAX_KEY_LENGTH - TAG_MANIFEST_PREFIX.len());
        Self {
            key: format!("{}{}", TAG_MANIFEST_PREFIX, encoded),
            namespace_len: TAG_MANIFEST_PREFIX.len(),
            truncated,
        }
    }

    /// Get the key string.
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.key.len()
    }

    /// Whether the key is empty (only for an empty cache key).
    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }

    /// Whether the encoding was truncated and a digest appended.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// The base64 part of the key, without namespace or digest suffix.
    pub fn encoded_prefix(&self) -> &str {
        let body = &self.key[self.namespace_len..];
        if self.truncated {
            &body[..body.len() - DIGEST_LENGTH - 1]
        } else {
            body
        }
    }

    /// Readable start of the original cache key, for operators.
    ///
    /// Lossy when truncation split a multi-byte character.
    pub fn readable_prefix(&self) -> String {
        match URL_SAFE_NO_PAD.decode(self.encoded_prefix()) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(_) => String::new(),
        }
    }
}

fn encode_within(key: &str, max_len: usize) -> (String, bool) {
    let encoded = URL_SAFE_NO_PAD.encode(key.as_bytes());

    if encoded.len() <= max_len {
        return (encoded, false);
    }

    let digest = URL_SAFE_NO_PAD.encode(Sha256::digest(key.as_bytes()));
    let prefix_len = max_len - digest.len() - 1;
    (format!("{}-{}", &encoded[..prefix_len], digest), true)
}

/// Recover the readable prefix of the cache key behind a raw storage key
/// string, such as one listed from the store.
pub fn decode_prefix(storage_key: &str) -> String {
    let encoded = match storage_key.len() {
        MAX_KEY_LENGTH if storage_key.as_bytes()[MAX_KEY_LENGTH - DIGEST_LENGTH - 1] == b'-' => {
            &storage_key[..MAX_KEY_LENGTH - DIGEST_LENGTH - 1]
        }
        _ => storage_key,
    };
    match URL_SAFE_NO_PAD.decode(encoded) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => String::new(),
    }
}

impl std::fmt::Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn natural(key: &str) -> String {
        URL_SAFE_NO_PAD.encode(key.strip_prefix('/').unwrap_or(key).as_bytes())
    }

    #[test]
    fn test_short_key_is_plain_base64url() {
        let key = StorageKey::encode("blog/post-1");
        assert_eq!(key.as_str(), "YmxvZy9wb3N0LTE");
        assert!(!key.is_truncated());
        assert_eq!(key.readable_prefix(), "blog/post-1");
    }

    #[test]
    fn test_leading_slash_is_stripped_once() {
        assert_eq!(StorageKey::encode("/foo"), StorageKey::encode("foo"));
        assert_ne!(StorageKey::encode("//foo"), StorageKey::encode("foo"));
        assert_eq!(StorageKey::encode("//foo").readable_prefix(), "/foo");
    }

    #[test]
    fn test_empty_key() {
        let key = StorageKey::encode("");
        assert!(key.is_empty());
        assert_eq!(StorageKey::encode("/"), key);
    }

    #[test]
    fn test_long_key_is_truncated_with_digest() {
        let long = "a".repeat(500);
        let key = StorageKey::encode(&long);

        assert!(key.is_truncated());
        assert_eq!(key.len(), MAX_KEY_LENGTH);
        assert_eq!(key.as_str().as_bytes()[MAX_KEY_LENGTH - DIGEST_LENGTH - 1], b'-');
        assert!(natural(&long).starts_with(key.encoded_prefix()));
        assert!(long.starts_with(&key.readable_prefix()));
    }

    #[test]
    fn test_shared_prefix_keys_do_not_collide() {
        let base = "x".repeat(400);
        let a = StorageKey::encode(&format!("{}a", base));
        let b = StorageKey::encode(&format!("{}b", base));

        assert_eq!(a.encoded_prefix(), b.encoded_prefix());
        assert_ne!(a, b);
    }

    #[test]
    fn test_non_ascii_key() {
        let key = StorageKey::encode("/produits/été-🌞");
        assert!(key.as_str().chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(key.readable_prefix(), "produits/été-🌞");
    }

    #[test]
    fn test_exact_boundary_is_not_truncated() {
        // 135 bytes encode to exactly 180 base64 characters.
        let key = StorageKey::encode(&"b".repeat(135));
        assert_eq!(key.len(), MAX_KEY_LENGTH);
        assert!(!key.is_truncated());

        let key = StorageKey::encode(&"b".repeat(136));
        assert_eq!(key.len(), MAX_KEY_LENGTH);
        assert!(key.is_truncated());
    }

    #[test]
    fn test_decode_prefix_of_raw_keys() {
        assert_eq!(decode_prefix("YmxvZy9wb3N0LTE"), "blog/post-1");

        let long = format!("/{}", "c".repeat(300));
        let key = StorageKey::encode(&long);
        assert_eq!(decode_prefix(key.as_str()), key.readable_prefix());

        assert_eq!(decode_prefix("not base64!"), "");
    }

    #[test]
    fn test_tag_manifest_keys_are_distinct_from_tag_text() {
        assert_ne!(StorageKey::for_tag_manifest("posts"), StorageKey::encode("posts"));
        assert_eq!(
            StorageKey::for_tag_manifest("posts"),
            StorageKey::for_tag_manifest("posts")
        );
        assert_eq!(StorageKey::for_tag_manifest("posts").readable_prefix(), "posts");
        assert_ne!(StorageKey::for_tag_manifest("/posts"), StorageKey::for_tag_manifest("posts"));
    }

    #[test]
    fn test_long_tag_manifest_key_is_bounded() {
        let key = StorageKey::for_tag_manifest(&"t".repeat(300));
        assert!(key.is_truncated());
        assert_eq!(key.len(), MAX_KEY_LENGTH);
        assert!("t".repeat(300).starts_with(&key.readable_prefix()));
    }

    proptest! {
        #[test]
        fn prop_bounded_and_deterministic(key in ".*") {
            let a = StorageKey::encode(&key);
            prop_assert!(a.len() <= MAX_KEY_LENGTH);
            prop_assert_eq!(a, StorageKey::encode(&key));
        }

        #[test]
        fn prop_leading_slash_equivalence(key in "([^/].{0,99})?") {
            prop_assert_eq!(StorageKey::encode(&format!("/{}", key)), StorageKey::encode(&key));
        }

        #[test]
        fn prop_overlong_keys_hit_the_maximum(key in ".{136,400}") {
            let encoded = StorageKey::encode(&key);
            if natural(&key).len() > MAX_KEY_LENGTH {
                prop_assert_eq!(encoded.len(), MAX_KEY_LENGTH);
                prop_assert!(encoded.is_truncated());
            }
        }

        #[test]
        fn prop_prefix_is_literal_prefix_of_natural_encoding(key in ".{0,400}") {
            let encoded = StorageKey::encode(&key);
            prop_assert!(natural(&key).starts_with(encoded.encoded_prefix()));
        }

        #[test]
        fn prop_tag_manifest_keys_never_collide_with_cache_keys(key in ".{0,300}", tag in ".{0,300}") {
            let manifest = StorageKey::for_tag_manifest(&tag);
            prop_assert!(manifest.len() <= MAX_KEY_LENGTH);
            let encoded = StorageKey::encode(&key);
            prop_assert_ne!(manifest.as_str(), encoded.as_str());
        }

        #[test]
        fn prop_divergent_tails_differ(base in "[a-z/]{200,300}") {
            let a = StorageKey::encode(&format!("{}a", base));
            let b = StorageKey::encode(&format!("{}b", base));
            prop_assert_ne!(a, b);
        }
    }
}
