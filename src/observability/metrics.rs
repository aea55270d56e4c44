//! Metrics middleware and collector.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::middleware::Middleware;
use crate::transport::{Executor, HttpRequest, HttpResponse, TransportError};

/// Metrics collector interface.
///
/// `status` 0 marks a call that failed before any HTTP status was received.
pub trait MetricsCollector: Send + Sync {
    /// Records the duration of a call that produced a response.
    fn observe_request_duration(&self, method: &str, path: &str, duration: Duration);

    /// Counts a call.
    fn inc_request_count(&self, method: &str, path: &str, status: u16);

    /// Records the size of a non-empty response.
    fn observe_response_size(&self, method: &str, path: &str, bytes: u64);
}

/// Identifies a request counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    /// HTTP method.
    pub method: String,
    /// URL path.
    pub path: String,
    /// HTTP status, or 0 for execution failures.
    pub status: u16,
}

/// Point-in-time copy of collected metrics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    /// Total calls counted.
    pub total_requests: u64,
    /// Calls that failed without a response.
    pub failed_requests: u64,
    /// Sum of observed durations in milliseconds.
    pub total_duration_ms: u64,
    /// Number of observed durations.
    pub observed_durations: u64,
    /// Sum of observed response sizes.
    pub total_response_bytes: u64,
    /// Counts per method, path and status.
    pub requests: HashMap<RequestKey, u64>,
}

impl MetricsSnapshot {
    /// Returns the count recorded for one key.
    pub fn count(&self, method: &str, path: &str, status: u16) -> u64 {
        self.requests
            .get(&RequestKey {
                method: method.to_string(),
                path: path.to_string(),
                status,
            })
            .copied()
            .unwrap_or(0)
    }

    /// Calculates average duration in milliseconds.
    #[allow(clippy::cast_precision_loss)]
    pub fn average_duration_ms(&self) -> f64 {
        if self.observed_durations == 0 {
            0.0
        } else {
            self.total_duration_ms as f64 / self.observed_durations as f64
        }
    }
}

/// In-memory metrics collector.
#[derive(Default)]
pub struct DefaultMetricsCollector {
    total_requests: AtomicU64,
    failed_requests: AtomicU64,
    total_duration_ms: AtomicU64,
    observed_durations: AtomicU64,
    total_response_bytes: AtomicU64,
    requests: RwLock<HashMap<RequestKey, u64>>,
}

impl DefaultMetricsCollector {
    /// Creates a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            total_duration_ms: self.total_duration_ms.load(Ordering::Relaxed),
            observed_durations: self.observed_durations.load(Ordering::Relaxed),
            total_response_bytes: self.total_response_bytes.load(Ordering::Relaxed),
            requests: self.requests.read().clone(),
        }
    }

    /// Resets all metrics.
    pub fn reset(&self) {
        self.total_requests.store(0, Ordering::Relaxed);
        self.failed_requests.store(0, Ordering::Relaxed);
        self.total_duration_ms.store(0, Ordering::Relaxed);
        self.observed_durations.store(0, Ordering::Relaxed);
        self.total_response_bytes.store(0, Ordering::Relaxed);
        self.requests.write().clear();
    }
}

impl MetricsCollector for DefaultMetricsCollector {
    fn observe_request_duration(&self, _method: &str, _path: &str, duration: Duration) {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.total_duration_ms.fetch_add(millis, Ordering::Relaxed);
        self.observed_durations.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_request_count(&self, method: &str, path: &str, status: u16) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if status == 0 {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }

        let key = RequestKey {
            method: method.to_string(),
            path: path.to_string(),
            status,
        };
        *self.requests.write().entry(key).or_insert(0) += 1;
    }

    fn observe_response_size(&self, _method: &str, _path: &str, bytes: u64) {
        self.total_response_bytes.fetch_add(bytes, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for DefaultMetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultMetricsCollector")
            .field("total_requests", &self.total_requests.load(Ordering::Relaxed))
            .field("failed_requests", &self.failed_requests.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Reports every call to a [`MetricsCollector`].
///
/// Errors and responses are returned unchanged.
#[derive(Clone)]
pub struct MetricsMiddleware {
    collector: Arc<dyn MetricsCollector>,
}

impl MetricsMiddleware {
    /// Creates a metrics middleware reporting to `collector`.
    pub fn new(collector: Arc<dyn MetricsCollector>) -> Self {
        Self { collector }
    }
}

impl Middleware for MetricsMiddleware {
    fn wrap(&self, next: Arc<dyn Executor>) -> Arc<dyn Executor> {
        Arc::new(MeteredExecutor {
            next,
            collector: Arc::clone(&self.collector),
        })
    }
}

impl std::fmt::Debug for MetricsMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsMiddleware").finish_non_exhaustive()
    }
}

struct MeteredExecutor {
    next: Arc<dyn Executor>,
    collector: Arc<dyn MetricsCollector>,
}

#[async_trait]
impl Executor for MeteredExecutor {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let start = Instant::now();
        let outcome = self.next.execute(request).await;
        let duration = start.elapsed();

        let method = request.method.as_str();
        let path = request.path();

        match &outcome {
            Ok(response) => {
                self.collector
                    .observe_request_duration(method, path, duration);
                self.collector
                    .inc_request_count(method, path, response.status);

                let size = response.content_length();
                if size > 0 {
                    self.collector.observe_response_size(method, path, size);
                }
            }
            Err(_) => self.collector.inc_request_count(method, path, 0),
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{MockExecutor, MockResponse};
    use crate::transport::RequestContext;
    use http::Method;
    use url::Url;

    fn request() -> HttpRequest {
        HttpRequest::new(
            Method::POST,
            Url::parse("https://postal.example.com/send/message").unwrap(),
            RequestContext::new(),
        )
    }

    fn metered(
        mock: &Arc<MockExecutor>,
        collector: &Arc<DefaultMetricsCollector>,
    ) -> Arc<dyn Executor> {
        MetricsMiddleware::new(Arc::clone(collector) as Arc<dyn MetricsCollector>)
            .wrap(Arc::clone(mock) as Arc<dyn Executor>)
    }

    #[tokio::test]
    async fn test_records_success() {
        let collector = Arc::new(DefaultMetricsCollector::new());
        let mock = Arc::new(MockExecutor::new().with_response(MockResponse::success("m1")));
        let executor = metered(&mock, &collector);

        let response = executor.execute(&request()).await.unwrap();

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.total_requests, 1);
        assert_eq!(snapshot.failed_requests, 0);
        assert_eq!(snapshot.observed_durations, 1);
        assert_eq!(snapshot.count("POST", "/send/message", 200), 1);
        assert_eq!(snapshot.total_response_bytes, response.body.len() as u64);
    }

    #[tokio::test]
    async fn test_records_error_as_status_zero() {
        let collector = Arc::new(DefaultMetricsCollector::new());
        let mock = Arc::new(MockExecutor::new().with_error(TransportError::Connection {
            message: "refused".to_string(),
        }));
        let executor = metered(&mock, &collector);

        let err = executor.execute(&request()).await.unwrap_err();

        assert!(matches!(err, TransportError::Connection { .. }));
        let snapshot = collector.snapshot();
        assert_eq!(snapshot.count("POST", "/send/message", 0), 1);
        assert_eq!(snapshot.failed_requests, 1);
        assert_eq!(snapshot.observed_durations, 0);
        assert_eq!(snapshot.total_response_bytes, 0);
    }

    #[tokio::test]
    async fn test_empty_body_size_not_observed() {
        let collector = Arc::new(DefaultMetricsCollector::new());
        let mock = Arc::new(MockExecutor::new().with_response(HttpResponse::new(204, "")));
        let executor = metered(&mock, &collector);

        executor.execute(&request()).await.unwrap();

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.count("POST", "/send/message", 204), 1);
        assert_eq!(snapshot.total_response_bytes, 0);
    }

    #[tokio::test]
    async fn test_error_status_counted_by_code() {
        let collector = Arc::new(DefaultMetricsCollector::new());
        let mock = Arc::new(
            MockExecutor::new()
                .with_response(MockResponse::error(429, "rate_limit", "slow down"))
                .with_response(MockResponse::success("m1")),
        );
        let executor = metered(&mock, &collector);

        executor.execute(&request()).await.unwrap();
        executor.execute(&request()).await.unwrap();

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.total_requests, 2);
        assert_eq!(snapshot.count("POST", "/send/message", 429), 1);
        assert_eq!(snapshot.count("POST", "/send/message", 200), 1);

        collector.reset();
        assert_eq!(collector.snapshot(), MetricsSnapshot::default());
    }
}
