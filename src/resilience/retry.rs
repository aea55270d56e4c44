//! Retry middleware.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::instrument;

use crate::config::PostalConfig;
use crate::middleware::Middleware;
use crate::transport::{Executor, HttpRequest, HttpResponse, TransportError};

/// Retry configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub interval: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Delay multiplier per retry; `1.0` keeps the interval fixed.
    pub multiplier: f64,
    /// Whether to add up to 25% random jitter.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            interval: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 1.0,
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives a configuration from client settings: one initial attempt
    /// plus `max_retries` retries, `retry_interval` apart.
    pub fn from_config(config: &PostalConfig) -> Self {
        Self {
            max_attempts: config.max_retries.saturating_add(1),
            interval: config.retry_interval,
            ..Self::default()
        }
    }

    /// Sets the total number of attempts.
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the interval.
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the multiplier.
    #[must_use]
    pub fn multiplier(mut self, mult: f64) -> Self {
        self.multiplier = mult;
        self
    }

    /// Sets whether to use jitter.
    #[must_use]
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Creates a configuration that never retries.
    pub fn no_retries() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Calculates the delay before retry number `retry` (zero based).
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    pub fn calculate_delay(&self, retry: u32) -> Duration {
        let base_ms =
            self.interval.as_millis() as f64 * self.multiplier.max(1.0).powi(retry as i32);
        let delay_ms = base_ms.min(self.max_delay.as_millis() as f64);

        let delay_ms = if self.jitter {
            delay_ms * (1.0 + rand::random::<f64>() * 0.25)
        } else {
            delay_ms
        };

        Duration::from_millis(delay_ms as u64)
    }
}

/// Re-executes failed calls.
///
/// Execution failures that [`TransportError::is_retryable`] accepts and 5xx
/// responses are retried; 4xx responses, cancellation and deadline expiry
/// are returned at once. When attempts run out, a failing call returns
/// [`TransportError::RetriesExhausted`] carrying the last error, and a 5xx
/// response is returned unchanged so the transport can classify it.
#[derive(Debug, Clone)]
pub struct RetryMiddleware {
    config: RetryConfig,
}

impl RetryMiddleware {
    /// Creates a new retry middleware.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

impl Default for RetryMiddleware {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl Middleware for RetryMiddleware {
    fn wrap(&self, next: Arc<dyn Executor>) -> Arc<dyn Executor> {
        Arc::new(RetryExecutor {
            next,
            config: self.config.clone(),
        })
    }
}

struct RetryExecutor {
    next: Arc<dyn Executor>,
    config: RetryConfig,
}

#[async_trait]
impl Executor for RetryExecutor {
    #[instrument(skip(self, request), fields(max_attempts = self.config.max_attempts))]
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let outcome = self.next.execute(request).await;

            let retryable = match &outcome {
                Ok(response) => response.is_server_error(),
                Err(err) => err.is_retryable(),
            };
            if !retryable {
                return outcome;
            }

            if attempt >= max_attempts {
                return outcome.map_err(|err| TransportError::RetriesExhausted {
                    attempts: attempt,
                    source: Box::new(err),
                });
            }

            let delay = self.config.calculate_delay(attempt - 1);
            match &outcome {
                Ok(response) => tracing::info!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis(),
                    status = response.status,
                    "Retrying after server error"
                ),
                Err(err) => tracing::info!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "Retrying after error"
                ),
            }

            request.context.sleep(delay).await?;
            attempt += 1;
        }
    }
}
