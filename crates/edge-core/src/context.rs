//! Request identity and per-request scope.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use tokio::task::JoinHandle;

/// Unique request identifier for tracing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(pub String);

impl RequestId {
    /// Generate a new request ID.
    pub fn generate() -> Self {
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("{:x}-{:x}-{:x}", nanos, std::process::id(), seq))
    }

    /// Create from an existing ID string.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State that lives for exactly one request.
///
/// Holds the flags the response bridge sets while the runtime renders, and
/// the background work (CDN purges and the like) that must finish before the
/// function instance is frozen. Nothing in here outlives the request.
#[derive(Debug)]
pub struct RequestScope {
    request_id: RequestId,
    on_demand_revalidate: AtomicBool,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl RequestScope {
    /// Create a scope with a fresh request ID.
    pub fn new() -> Self {
        Self::with_request_id(RequestId::generate())
    }

    /// Create a scope for an existing request ID.
    pub fn with_request_id(request_id: RequestId) -> Self {
        Self {
            request_id,
            on_demand_revalidate: AtomicBool::new(false),
            background: Mutex::new(Vec::new()),
        }
    }

    /// The request ID.
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Record that the runtime performed an on-demand revalidation while
    /// handling this request.
    pub fn mark_on_demand_revalidate(&self) {
        self.on_demand_revalidate.store(true, Ordering::SeqCst);
    }

    /// Whether an on-demand revalidation happened during this request.
    pub fn is_on_demand_revalidate(&self) -> bool {
        self.on_demand_revalidate.load(Ordering::SeqCst)
    }

    /// Spawn work that must not delay the response but must complete before
    /// the request is torn down. Must be called from within a tokio runtime.
    pub fn track_background_work<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(work);
        self.background
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(handle);
    }

    /// Number of background tasks not yet awaited.
    pub fn pending_background_work(&self) -> usize {
        self.background
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Await every tracked background task.
    ///
    /// Panicked tasks are logged and otherwise ignored; background failures
    /// never fail the request.
    pub async fn wait_for_background_work(&self) {
        loop {
            let handles: Vec<JoinHandle<()>> = std::mem::take(
                &mut *self
                    .background
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner()),
            );
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::error!(request_id = %self.request_id, error = %e, "background task failed");
                }
            }
        }
    }
}

impl Default for RequestScope {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_request_id_generate_uniqueness() {
        let a = RequestId::generate();
        let b = RequestId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_request_id_display() {
        let id = RequestId::from_string("req-1");
        assert_eq!(format!("{}", id), "req-1");
    }

    #[test]
    fn test_on_demand_flag() {
        let scope = RequestScope::new();
        assert!(!scope.is_on_demand_revalidate());
        scope.mark_on_demand_revalidate();
        assert!(scope.is_on_demand_revalidate());
    }

    #[tokio::test]
    async fn test_wait_for_background_work() {
        let scope = RequestScope::new();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let counter = counter.clone();
            scope.track_background_work(async move {
                tokio::task::yield_now().await;
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(scope.pending_background_work(), 3);

        scope.wait_for_background_work().await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(scope.pending_background_work(), 0);
    }

    #[tokio::test]
    async fn test_panicking_background_work_is_contained() {
        let scope = RequestScope::new();
        scope.track_background_work(async { panic!("boom") });
        scope.wait_for_background_work().await;
        assert_eq!(scope.pending_background_work(), 0);
    }
}
