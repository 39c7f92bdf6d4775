//! Scriptable transport for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use http::StatusCode;

use crate::client::{FetchError, HttpRequest, HttpResponse, HttpTransport};

type Responder = dyn Fn(&HttpRequest) -> Result<HttpResponse, FetchError> + Send + Sync;

/// Transport that records every request and answers from a closure.
pub struct RecordingTransport {
    responder: Box<Responder>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl RecordingTransport {
    /// Answer every request with an empty `200 OK`.
    pub fn new() -> Self {
        Self::with_responder(|_| Ok(HttpResponse::new(StatusCode::OK, "")))
    }

    /// Answer requests with `responder`.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, FetchError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for RecordingTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, FetchError> {
        let response = (self.responder)(&request);
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);
        response
    }
}
