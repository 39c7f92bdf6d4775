//! Durable blob store access and store selection.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use edge_core::{BridgeConfig, ConfigurationError};
use http::{header, StatusCode};

use crate::client::{FetchError, HttpRequest, HttpTransport};

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached or answered with an error.
    #[error("store unavailable: {0}")]
    Unavailable(#[from] FetchError),

    /// The store could not be resolved from configuration.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A key/value blob store.
///
/// Keys are storage keys (already bounded and URL-safe); values are opaque
/// bytes. Last write wins.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read a blob. `Ok(None)` when the key is absent.
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>>;

    /// Write a blob, replacing any previous value.
    async fn set(&self, key: &str, value: Bytes) -> StoreResult<()>;
}

/// Which instance of the store to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreRegion {
    /// The default, globally consistent store.
    Global,
    /// A region-scoped store.
    Regional(String),
}

/// Namespace of a deploy store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreScope {
    /// Site identifier.
    pub site_id: String,
    /// Deploy identifier.
    pub deploy_id: String,
    /// Store instance.
    pub region: StoreRegion,
}

impl StoreScope {
    /// The store name; every deploy gets its own, so a new deploy starts
    /// with an empty key space.
    pub fn store_name(&self) -> String {
        format!("deploy:{}", self.deploy_id)
    }
}

/// HTTP-backed deploy store.
pub struct DeployBlobStore {
    transport: Arc<dyn HttpTransport>,
    scope: StoreScope,
    api_host: String,
    token: String,
}

impl fmt::Debug for DeployBlobStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeployBlobStore")
            .field("scope", &self.scope)
            .field("api_host", &self.api_host)
            .finish_non_exhaustive()
    }
}

impl DeployBlobStore {
    /// Create a store handle.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        scope: StoreScope,
        api_host: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            scope,
            api_host: api_host.into(),
            token: token.into(),
        }
    }

    /// The scope this handle writes into.
    pub fn scope(&self) -> &StoreScope {
        &self.scope
    }

    /// URL of a blob.
    pub fn blob_url(&self, key: &str) -> String {
        let mut url = format!(
            "{}/api/v1/blobs/{}/{}/{}",
            self.api_host.trim_end_matches('/'),
            self.scope.site_id,
            self.scope.store_name(),
            key
        );
        if let StoreRegion::Regional(region) = &self.scope.region {
            url.push_str("?region=");
            url.push_str(region);
        }
        url
    }
}

#[async_trait]
impl BlobStore for DeployBlobStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        let url = self.blob_url(key);
        let request = HttpRequest::get(&url).bearer_auth(&self.token)?;
        let response = self.transport.send(request).await?;

        match response.status {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.body)),
            status => Err(FetchError::Http {
                status: status.as_u16(),
                url,
            }
            .into()),
        }
    }

    async fn set(&self, key: &str, value: Bytes) -> StoreResult<()> {
        let url = self.blob_url(key);
        let request = HttpRequest::put(&url)
            .bearer_auth(&self.token)?
            .header(header::CONTENT_TYPE, "application/json")?
            .body(value);
        let response = self.transport.send(request).await?;

        if response.status.is_success() {
            Ok(())
        } else {
            Err(FetchError::Http {
                status: response.status.as_u16(),
                url,
            }
            .into())
        }
    }
}

/// Something that can hand out the store for the current deploy.
pub trait StoreResolver: Send + Sync {
    /// Resolve the store. Fails when required configuration is missing.
    fn resolve_store(&self) -> Result<Arc<dyn BlobStore>, ConfigurationError>;
}

/// Resolves the deploy store from configuration.
///
/// The transport is supplied by the caller once, at construction, and every
/// store handed out uses it.
#[derive(Clone)]
pub struct StoreSelector {
    config: Arc<BridgeConfig>,
    transport: Arc<dyn HttpTransport>,
}

impl fmt::Debug for StoreSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreSelector")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StoreSelector {
    /// Create a selector.
    pub fn new(config: Arc<BridgeConfig>, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    /// Scope the selector would resolve to.
    pub fn scope(&self) -> Result<StoreScope, ConfigurationError> {
        let region = if self.config.use_regional_blobs {
            StoreRegion::Regional(self.config.blobs_region.clone())
        } else {
            StoreRegion::Global
        };

        Ok(StoreScope {
            site_id: self.config.require_site_id()?.to_string(),
            deploy_id: self.config.require_deploy_id()?.to_string(),
            region,
        })
    }

    /// Open the deploy store.
    pub fn resolve(&self) -> Result<DeployBlobStore, ConfigurationError> {
        let token = self.config.require_api_token()?;
        let scope = self.scope()?;
        tracing::debug!(store = %scope.store_name(), region = ?scope.region, "resolved blob store");
        Ok(DeployBlobStore::new(
            self.transport.clone(),
            scope,
            self.config.api_host.clone(),
            token,
        ))
    }
}

impl StoreResolver for StoreSelector {
    fn resolve_store(&self) -> Result<Arc<dyn BlobStore>, ConfigurationError> {
        Ok(Arc::new(self.resolve()?))
    }
}

/// Resolver that always returns the same store.
#[derive(Clone)]
pub struct FixedStore(pub Arc<dyn BlobStore>);

impl StoreResolver for FixedStore {
    fn resolve_store(&self) -> Result<Arc<dyn BlobStore>, ConfigurationError> {
        Ok(self.0.clone())
    }
}
