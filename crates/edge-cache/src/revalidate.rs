//! On-demand revalidation: CDN purge propagation and revalidate hooks.
//!
//! Revalidating a tag in the incremental cache does not invalidate what the
//! edge CDN already holds. Every cached response is emitted with a
//! `Cache-Tag` header carrying its tags (and its path) in the CDN namespace,
//! and revalidation sends a purge-by-tag request for the same names.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use edge_core::{BridgeConfig, ConfigurationError, RequestScope};
use edge_data::{FetchError, HttpRequest, HttpTransport};
use http::{header, StatusCode};
use serde::Serialize;

/// Prefix the CDN tag namespace shares with the framework's implicit tags.
pub const CDN_TAG_PREFIX: &str = "_N_T_";

/// CDN tag for a cache tag.
///
/// Tags already in the namespace, such as the framework's implicit path
/// tags, are used as they are.
pub fn cdn_tag(tag: &str) -> String {
    if tag.starts_with(CDN_TAG_PREFIX) {
        tag.to_string()
    } else {
        format!("{}{}", CDN_TAG_PREFIX, tag)
    }
}

/// Cache tag behind a CDN tag, if it is in the namespace.
pub fn from_cdn_tag(cdn_tag: &str) -> Option<&str> {
    cdn_tag.strip_prefix(CDN_TAG_PREFIX)
}

/// Normalize a page path: always a leading `/`, `/index` is `/`.
pub fn normalize_path(path: &str) -> String {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    match path.as_str() {
        "/index" => "/".to_string(),
        _ => path,
    }
}

/// The implicit CDN tag of a page path.
pub fn path_tag(path: &str) -> String {
    cdn_tag(&normalize_path(path))
}

/// Errors from CDN purges.
#[derive(Debug, thiserror::Error)]
pub enum PurgeError {
    #[error("purge rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("purge request failed: {0}")]
    Transport(#[from] FetchError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("failed to encode purge request: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct PurgeRequest<'a> {
    site_id: &'a str,
    cache_tags: &'a [String],
}

/// Sends purge-by-tag requests to the CDN.
///
/// Never touches the blob store.
pub struct RevalidationPropagator {
    config: Arc<BridgeConfig>,
    transport: Arc<dyn HttpTransport>,
}

impl fmt::Debug for RevalidationPropagator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevalidationPropagator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RevalidationPropagator {
    /// Create a propagator sending through `transport`.
    pub fn new(config: Arc<BridgeConfig>, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    /// Purge URL.
    pub fn purge_url(&self) -> String {
        format!("{}/api/v1/purge", self.config.api_host.trim_end_matches('/'))
    }

    /// Purge every response tagged with `tag`.
    pub async fn purge_tag(&self, tag: &str) -> Result<(), PurgeError> {
        self.purge_tags(&[tag.to_string()]).await
    }

    /// Purge the page at `path`.
    pub async fn purge_path(&self, path: &str) -> Result<(), PurgeError> {
        self.send(&[path_tag(path)]).await
    }

    /// Purge several tags in one request.
    pub async fn purge_tags(&self, tags: &[String]) -> Result<(), PurgeError> {
        let cache_tags: Vec<String> = tags.iter().map(|tag| cdn_tag(tag)).collect();
        self.send(&cache_tags).await
    }

    async fn send(&self, cache_tags: &[String]) -> Result<(), PurgeError> {
        if cache_tags.is_empty() {
            return Ok(());
        }

        let site_id = self.config.require_site_id()?;
        let token = self.config.require_api_token()?;
        let body = serde_json::to_vec(&PurgeRequest {
            site_id,
            cache_tags,
        })?;

        let request = HttpRequest::post(self.purge_url())
            .bearer_auth(token)?
            .header(header::CONTENT_TYPE, "application/json")?
            .body(body);

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(tags = ?cache_tags, error = %e, "CDN purge failed");
                return Err(e.into());
            }
        };

        if !response.status.is_success() {
            tracing::error!(
                tags = ?cache_tags,
                status = response.status.as_u16(),
                "CDN purge rejected"
            );
            return Err(PurgeError::Rejected {
                status: response.status.as_u16(),
                body: response.text(),
            });
        }

        tracing::debug!(tags = ?cache_tags, "purged CDN tags");
        Ok(())
    }
}

/// Observer of the runtime's built-in revalidate call.
#[async_trait]
pub trait RevalidateHook: Send + Sync {
    /// Called when the page at `path` is revalidated on demand.
    async fn on_revalidate(&self, path: &str, scope: &RequestScope) -> Result<(), PurgeError>;
}

/// Marks the request scope, so the page write that follows the
/// revalidation purges the path once the new version is stored.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkOnDemandRevalidate;

#[async_trait]
impl RevalidateHook for MarkOnDemandRevalidate {
    async fn on_revalidate(&self, path: &str, scope: &RequestScope) -> Result<(), PurgeError> {
        tracing::debug!(path, request_id = %scope.request_id(), "on-demand revalidation");
        scope.mark_on_demand_revalidate();
        Ok(())
    }
}

/// Purges the path right away.
#[derive(Debug)]
pub struct PurgeOnRevalidate {
    propagator: Arc<RevalidationPropagator>,
}

impl PurgeOnRevalidate {
    /// Create a hook purging through `propagator`.
    pub fn new(propagator: Arc<RevalidationPropagator>) -> Self {
        Self { propagator }
    }
}

#[async_trait]
impl RevalidateHook for PurgeOnRevalidate {
    async fn on_revalidate(&self, path: &str, _scope: &RequestScope) -> Result<(), PurgeError> {
        self.propagator.purge_path(path).await
    }
}

/// Ordered set of revalidate hooks.
#[derive(Clone, Default)]
pub struct RevalidateHooks {
    hooks: Vec<Arc<dyn RevalidateHook>>,
}

impl fmt::Debug for RevalidateHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevalidateHooks")
            .field("len", &self.hooks.len())
            .finish()
    }
}

impl RevalidateHooks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a hook.
    pub fn register(&mut self, hook: Arc<dyn RevalidateHook>) {
        self.hooks.push(hook);
    }

    /// Add a hook, builder style.
    pub fn with(mut self, hook: Arc<dyn RevalidateHook>) -> Self {
        self.register(hook);
        self
    }

    /// Number of registered hooks.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether no hook is registered.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run every hook in registration order. All hooks run even if one
    /// fails; the first failure is returned.
    pub async fn notify(&self, path: &str, scope: &RequestScope) -> Result<(), PurgeError> {
        let mut first_error = None;
        for hook in &self.hooks {
            if let Err(e) = hook.on_revalidate(path, scope).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Status and JSON body answering an explicit revalidation API call.
pub fn revalidation_response<E: fmt::Display>(
    result: &Result<(), E>,
) -> (StatusCode, serde_json::Value) {
    match result {
        Ok(()) => (
            StatusCode::OK,
            serde_json::json!({
                "revalidated": true,
                "now": chrono::Utc::now().timestamp_millis(),
            }),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({
                "revalidated": false,
                "error": e.to_string(),
            }),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_data::{HttpResponse, RecordingTransport};
    use http::Method;

    fn config() -> Arc<BridgeConfig> {
        Arc::new(BridgeConfig {
            deploy_id: Some("dep1".into()),
            site_id: Some("site1".into()),
            api_host: "https://api.example.com/".into(),
            api_token: Some("tok".into()),
            ..Default::default()
        })
    }

    fn propagator(transport: Arc<RecordingTransport>) -> RevalidationPropagator {
        RevalidationPropagator::new(config(), transport)
    }

    fn body(request: &HttpRequest) -> serde_json::Value {
        serde_json::from_slice(&request.body).unwrap()
    }

    #[test]
    fn test_tag_namespace() {
        assert_eq!(cdn_tag("posts"), "_N_T_posts");
        assert_eq!(cdn_tag("_N_T_/about"), "_N_T_/about");
        assert_eq!(cdn_tag(&cdn_tag("posts")), cdn_tag("posts"));
        assert_eq!(from_cdn_tag("_N_T_posts"), Some("posts"));
        assert_eq!(from_cdn_tag("posts"), None);
    }

    #[test]
    fn test_path_normalization() {
        assert_eq!(normalize_path("blog/post-1"), "/blog/post-1");
        assert_eq!(normalize_path("/blog/post-1"), "/blog/post-1");
        assert_eq!(normalize_path("/index"), "/");
        assert_eq!(normalize_path("index"), "/");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(path_tag("/index"), "_N_T_/");
        assert_eq!(from_cdn_tag(&path_tag("about")), Some("/about"));
    }

    #[tokio::test]
    async fn test_purge_tag_request() {
        let transport = Arc::new(RecordingTransport::new());
        propagator(transport.clone()).purge_tag("posts").await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(requests[0].url, "https://api.example.com/api/v1/purge");
        assert_eq!(requests[0].headers[header::AUTHORIZATION], "Bearer tok");
        assert_eq!(
            body(&requests[0]),
            serde_json::json!({ "site_id": "site1", "cache_tags": ["_N_T_posts"] })
        );
    }

    #[tokio::test]
    async fn test_purge_path_uses_path_tag() {
        let transport = Arc::new(RecordingTransport::new());
        propagator(transport.clone()).purge_path("/index").await.unwrap();

        assert_eq!(
            body(&transport.requests()[0])["cache_tags"],
            serde_json::json!(["_N_T_/"])
        );
    }

    #[tokio::test]
    async fn test_purge_no_tags_sends_nothing() {
        let transport = Arc::new(RecordingTransport::new());
        propagator(transport.clone()).purge_tags(&[]).await.unwrap();
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_purge() {
        let transport = Arc::new(RecordingTransport::with_responder(|_| {
            Ok(HttpResponse::new(StatusCode::FORBIDDEN, "no access"))
        }));
        let err = propagator(transport).purge_tag("posts").await.unwrap_err();

        match err {
            PurgeError::Rejected { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, "no access");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let transport = Arc::new(RecordingTransport::with_responder(|_| {
            Err(FetchError::Connection("refused".into()))
        }));
        let err = propagator(transport).purge_tag("posts").await.unwrap_err();
        assert!(matches!(err, PurgeError::Transport(FetchError::Connection(_))));
    }

    #[tokio::test]
    async fn test_missing_site_id() {
        let mut cfg = (*config()).clone();
        cfg.site_id = None;
        let transport = Arc::new(RecordingTransport::new());
        let err = RevalidationPropagator::new(Arc::new(cfg), transport.clone())
            .purge_tag("posts")
            .await
            .unwrap_err();

        assert!(matches!(err, PurgeError::Configuration(_)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_hooks_run_in_order_and_report_first_error() {
        let transport = Arc::new(RecordingTransport::with_responder(|_| {
            Ok(HttpResponse::new(StatusCode::INTERNAL_SERVER_ERROR, ""))
        }));
        let hooks = RevalidateHooks::new()
            .with(Arc::new(PurgeOnRevalidate::new(Arc::new(propagator(
                transport.clone(),
            )))))
            .with(Arc::new(MarkOnDemandRevalidate));
        let scope = RequestScope::new();

        let err = hooks.notify("/blog/post-1", &scope).await.unwrap_err();

        assert!(matches!(err, PurgeError::Rejected { status: 500, .. }));
        assert!(scope.is_on_demand_revalidate());
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(hooks.len(), 2);
    }

    #[test]
    fn test_revalidation_response() {
        let (status, body) = revalidation_response::<PurgeError>(&Ok(()));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["revalidated"], true);
        assert!(body["now"].is_i64());

        let failed: Result<(), PurgeError> = Err(PurgeError::Rejected {
            status: 502,
            body: "bad gateway".into(),
        });
        let (status, body) = revalidation_response(&failed);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["revalidated"], false);
        assert!(body["error"].as_str().unwrap().contains("502"));
    }
}
