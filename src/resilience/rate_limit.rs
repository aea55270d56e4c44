//! Token-bucket rate limiting middleware.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::middleware::Middleware;
use crate::transport::{Executor, HttpRequest, HttpResponse, TransportError};

/// Rate limit configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    /// Tokens added per second.
    pub requests_per_second: f64,
    /// Bucket capacity, and the number of calls admitted without waiting.
    pub burst: u32,
    /// When false, the middleware passes calls through untouched.
    pub enabled: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 10.0,
            burst: 10,
            enabled: true,
        }
    }
}

impl RateLimitConfig {
    /// Creates an enabled configuration.
    pub fn new(requests_per_second: f64, burst: u32) -> Self {
        Self {
            requests_per_second,
            burst,
            enabled: true,
        }
    }

    /// Creates a configuration that admits everything.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

enum Admission {
    Granted,
    Wait(Duration),
    Never,
}

struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_rate: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(config: &RateLimitConfig) -> Self {
        let capacity = f64::from(config.burst);
        Self {
            capacity,
            tokens: capacity,
            refill_rate: config.requests_per_second,
            last_update: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        if self.refill_rate.is_finite() && self.refill_rate > 0.0 {
            let elapsed = now.duration_since(self.last_update).as_secs_f64();
            self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        }
        self.last_update = now;
    }

    fn acquire(&mut self) -> Admission {
        if self.capacity < 1.0 {
            return Admission::Never;
        }

        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            return Admission::Granted;
        }

        if !self.refill_rate.is_finite() || self.refill_rate <= 0.0 {
            return Admission::Never;
        }

        Duration::try_from_secs_f64((1.0 - self.tokens) / self.refill_rate)
            .map_or(Admission::Never, Admission::Wait)
    }
}

/// Admits calls at a bounded rate.
///
/// The bucket belongs to the middleware value, so every executor it wraps
/// draws from the same tokens. Waiting for a token respects the call's
/// [`RequestContext`](crate::transport::RequestContext).
pub struct RateLimitMiddleware {
    config: RateLimitConfig,
    bucket: Arc<Mutex<TokenBucket>>,
}

impl RateLimitMiddleware {
    /// Creates a new rate limit middleware with a full bucket.
    pub fn new(config: RateLimitConfig) -> Self {
        let bucket = Arc::new(Mutex::new(TokenBucket::new(&config)));
        Self { config, bucket }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Returns the tokens currently available.
    pub fn available_tokens(&self) -> f64 {
        let mut bucket = self.bucket.lock();
        bucket.refill();
        bucket.tokens
    }
}

impl Default for RateLimitMiddleware {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

impl Middleware for RateLimitMiddleware {
    fn wrap(&self, next: Arc<dyn Executor>) -> Arc<dyn Executor> {
        if !self.config.enabled {
            return next;
        }

        Arc::new(RateLimitedExecutor {
            next,
            bucket: Arc::clone(&self.bucket),
        })
    }
}

impl std::fmt::Debug for RateLimitMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitMiddleware")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

struct RateLimitedExecutor {
    next: Arc<dyn Executor>,
    bucket: Arc<Mutex<TokenBucket>>,
}

#[async_trait]
impl Executor for RateLimitedExecutor {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        loop {
            let admission = self.bucket.lock().acquire();
            match admission {
                Admission::Granted => break,
                Admission::Wait(wait) => {
                    tracing::debug!(wait_ms = wait.as_millis(), "Waiting for rate limit token");
                    request.context.sleep(wait).await?;
                }
                Admission::Never => {
                    return Err(TransportError::RateLimitExceeded {
                        message: "rate limiter cannot admit requests".to_string(),
                    });
                }
            }
        }

        self.next.execute(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{MockExecutor, MockResponse};
    use crate::transport::RequestContext;
    use http::Method;
    use url::Url;

    fn request(ctx: RequestContext) -> HttpRequest {
        HttpRequest::new(
            Method::POST,
            Url::parse("https://postal.example.com/send/message").unwrap(),
            ctx,
        )
    }

    fn mock() -> Arc<MockExecutor> {
        let mock = Arc::new(MockExecutor::new());
        mock.set_default(MockResponse::success("m1"));
        mock
    }

    #[tokio::test]
    async fn test_burst_admitted_immediately() {
        let mock = mock();
        let limiter = RateLimitMiddleware::new(RateLimitConfig::new(1.0, 3));
        let executor = limiter.wrap(Arc::clone(&mock) as Arc<dyn Executor>);

        let start = Instant::now();
        for _ in 0..3 {
            executor.execute(&request(RequestContext::new())).await.unwrap();
        }

        assert!(start.elapsed() < Duration::from_millis(500));
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_waits_for_refill() {
        let mock = mock();
        let limiter = RateLimitMiddleware::new(RateLimitConfig::new(20.0, 1));
        let executor = limiter.wrap(Arc::clone(&mock) as Arc<dyn Executor>);

        executor.execute(&request(RequestContext::new())).await.unwrap();
        let start = Instant::now();
        executor.execute(&request(RequestContext::new())).await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(40));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_bucket_shared_across_wraps() {
        let mock = mock();
        let limiter = RateLimitMiddleware::new(RateLimitConfig::new(0.0, 1));

        let first = limiter.wrap(Arc::clone(&mock) as Arc<dyn Executor>);
        let second = limiter.wrap(Arc::clone(&mock) as Arc<dyn Executor>);

        first.execute(&request(RequestContext::new())).await.unwrap();
        let err = second
            .execute(&request(RequestContext::new()))
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::RateLimitExceeded { .. }));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_zero_burst_never_admits() {
        let mock = mock();
        let limiter = RateLimitMiddleware::new(RateLimitConfig::new(100.0, 0));
        let executor = limiter.wrap(Arc::clone(&mock) as Arc<dyn Executor>);

        let err = executor
            .execute(&request(RequestContext::new()))
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::RateLimitExceeded { .. }));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unrepresentable_wait_never_admits() {
        let mock = mock();
        let limiter = RateLimitMiddleware::new(RateLimitConfig::new(1e-30, 1));
        let executor = limiter.wrap(Arc::clone(&mock) as Arc<dyn Executor>);

        executor.execute(&request(RequestContext::new())).await.unwrap();
        let err = executor
            .execute(&request(RequestContext::new()))
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::RateLimitExceeded { .. }));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_disabled_passes_through() {
        let mock = mock();
        let limiter = RateLimitMiddleware::new(RateLimitConfig {
            burst: 0,
            ..RateLimitConfig::disabled()
        });
        let executor = limiter.wrap(Arc::clone(&mock) as Arc<dyn Executor>);

        for _ in 0..5 {
            executor.execute(&request(RequestContext::new())).await.unwrap();
        }
        assert_eq!(mock.call_count(), 5);
    }

    #[tokio::test]
    async fn test_cancelled_while_waiting() {
        let mock = mock();
        let limiter = RateLimitMiddleware::new(RateLimitConfig::new(0.1, 1));
        let executor = limiter.wrap(Arc::clone(&mock) as Arc<dyn Executor>);

        executor.execute(&request(RequestContext::new())).await.unwrap();

        let ctx = RequestContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = executor.execute(&request(ctx)).await.unwrap_err();
        assert!(matches!(err, TransportError::Cancelled));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_deadline_while_waiting() {
        let mock = mock();
        let limiter = RateLimitMiddleware::new(RateLimitConfig::new(0.1, 1));
        let executor = limiter.wrap(Arc::clone(&mock) as Arc<dyn Executor>);

        executor.execute(&request(RequestContext::new())).await.unwrap();

        let ctx = RequestContext::new().with_timeout(Duration::from_millis(20));
        let err = executor.execute(&request(ctx)).await.unwrap_err();
        assert!(matches!(err, TransportError::DeadlineExceeded));
    }

    #[test]
    fn test_available_tokens() {
        let limiter = RateLimitMiddleware::new(RateLimitConfig::new(1.0, 4));
        assert!((limiter.available_tokens() - 4.0).abs() < f64::EPSILON);
    }
}
