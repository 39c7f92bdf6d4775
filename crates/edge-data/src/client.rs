//! HTTP transport seam and the reqwest-backed fetch client.
//!
//! The rendering runtime patches its own global fetch to implement fetch
//! caching. Store and purge traffic must never go through that path, so every
//! component that talks to the platform receives its transport explicitly at
//! construction time and uses only that.

use async_trait::async_trait;
use bytes::Bytes;
use edge_core::StoreConfig;
use http::{header, HeaderMap, HeaderValue, Method, StatusCode};

use crate::retry::RetryPolicy;
use crate::timeout::TimeoutConfig;

/// Error type for fetch operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP error: {status} for {url}")]
    Http { status: u16, url: String },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request error: {0}")]
    Request(String),
}

/// An outbound request. Cheap to clone so it can be retried.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Bytes,
}

impl HttpRequest {
    /// Create a request with an empty body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Create a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Create a PUT request.
    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    /// Create a POST request.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Add a header. Invalid header values are reported as request errors.
    pub fn header(mut self, name: header::HeaderName, value: &str) -> Result<Self, FetchError> {
        let value = HeaderValue::from_str(value)
            .map_err(|e| FetchError::Request(format!("invalid header {}: {}", name, e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Add a bearer `Authorization` header.
    pub fn bearer_auth(self, token: &str) -> Result<Self, FetchError> {
        self.header(header::AUTHORIZATION, &format!("Bearer {}", token))
    }

    /// Set the body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// A received response with its body fully read.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

impl HttpResponse {
    /// Create a response with the given status and body.
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Body as lossy UTF-8, for error messages.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// The network primitive used for store and purge traffic.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request and read the whole response.
    ///
    /// Non-2xx responses are returned as `Ok`; callers decide what a status
    /// means for them.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, FetchError>;
}

/// Fetch policy combining timeout and retry configuration.
#[derive(Debug, Clone, Default)]
pub struct FetchPolicy {
    /// Timeout configuration.
    pub timeout: TimeoutConfig,
    /// Retry policy.
    pub retry: RetryPolicy,
}

impl From<&StoreConfig> for FetchPolicy {
    fn from(config: &StoreConfig) -> Self {
        Self {
            timeout: TimeoutConfig::from(config),
            retry: RetryPolicy::from(config),
        }
    }
}

/// Platform fetch client.
///
/// Owns its own `reqwest::Client`, so it is unaffected by anything the
/// runtime does to its global fetch. Applies per-attempt timeouts and retries
/// according to its [`FetchPolicy`].
#[derive(Debug, Clone)]
pub struct FetchClient {
    client: reqwest::Client,
    policy: FetchPolicy,
}

impl FetchClient {
    /// Create a client with the given policy.
    pub fn new(policy: FetchPolicy) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(policy.timeout.connect)
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))?;
        Ok(Self { client, policy })
    }

    /// Create a client from store settings.
    pub fn from_store_config(config: &StoreConfig) -> Result<Self, FetchError> {
        Self::new(FetchPolicy::from(config))
    }

    /// The active policy.
    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    async fn send_once(&self, request: &HttpRequest) -> Result<HttpResponse, FetchError> {
        let response = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone())
            .body(request.body.clone())
            .timeout(self.policy.timeout.total)
            .send()
            .await
            .map_err(|e| classify(e, &request.url))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| classify(e, &request.url))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl HttpTransport for FetchClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, FetchError> {
        let retry = &self.policy.retry;
        let mut attempt = 0;

        loop {
            match self.send_once(&request).await {
                Ok(response) if retry.should_retry_status(response.status.as_u16(), attempt) => {
                    tracing::debug!(
                        url = %request.url,
                        status = response.status.as_u16(),
                        attempt,
                        "retrying request"
                    );
                }
                Ok(response) => return Ok(response),
                Err(e) if retry.should_retry_error(&e, attempt) => {
                    tracing::debug!(url = %request.url, error = %e, attempt, "retrying request");
                }
                Err(e) => return Err(e),
            }

            tokio::time::sleep(retry.backoff.delay_for_attempt(attempt)).await;
            attempt += 1;
        }
    }
}

fn classify(error: reqwest::Error, url: &str) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout(url.to_string())
    } else if error.is_connect() {
        FetchError::Connection(error.to_string())
    } else {
        FetchError::Request(error.to_string())
    }
}
