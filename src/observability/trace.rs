//! Tracing middleware.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{info_span, Instrument};

use crate::middleware::Middleware;
use crate::transport::{Executor, HttpRequest, HttpResponse, TransportError, REQUEST_ID_HEADER};

/// Service name used when none is given.
const DEFAULT_SERVICE_NAME: &str = "postal-client";

/// Receives the start and end of every traced call.
pub trait TracingHandler: Send + Sync {
    /// Called before the inner executor runs.
    fn on_request_start(&self, request: &HttpRequest);

    /// Called after the inner executor returns, whether it failed or not.
    fn on_request_end(
        &self,
        request: &HttpRequest,
        outcome: Result<&HttpResponse, &TransportError>,
        duration: Duration,
    );
}

/// Emits `tracing` events for each call.
#[derive(Debug, Clone, Default)]
pub struct DefaultTracingHandler;

impl TracingHandler for DefaultTracingHandler {
    fn on_request_start(&self, request: &HttpRequest) {
        tracing::info!(
            method = %request.method,
            url = %request.url,
            request_id = request.header(REQUEST_ID_HEADER).unwrap_or_default(),
            "Request started"
        );
    }

    fn on_request_end(
        &self,
        request: &HttpRequest,
        outcome: Result<&HttpResponse, &TransportError>,
        duration: Duration,
    ) {
        let request_id = request.header(REQUEST_ID_HEADER).unwrap_or_default();
        match outcome {
            Ok(response) => tracing::info!(
                method = %request.method,
                url = %request.url,
                request_id,
                status = response.status,
                duration_ms = duration.as_millis(),
                "Request completed"
            ),
            Err(err) => tracing::warn!(
                method = %request.method,
                url = %request.url,
                request_id,
                status = 0u16,
                duration_ms = duration.as_millis(),
                error = %err,
                "Request failed"
            ),
        }
    }
}

/// Brackets each call with handler hooks inside an `info` span.
///
/// The request and response pass through unchanged.
#[derive(Clone)]
pub struct TracingMiddleware {
    service_name: String,
    handler: Arc<dyn TracingHandler>,
}

impl TracingMiddleware {
    /// Creates a tracing middleware using [`DefaultTracingHandler`].
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            handler: Arc::new(DefaultTracingHandler),
        }
    }

    /// Replaces the handler.
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn TracingHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Returns the service name.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Default for TracingMiddleware {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE_NAME)
    }
}

impl Middleware for TracingMiddleware {
    fn wrap(&self, next: Arc<dyn Executor>) -> Arc<dyn Executor> {
        Arc::new(TracedExecutor {
            next,
            service_name: self.service_name.clone(),
            handler: Arc::clone(&self.handler),
        })
    }
}

impl std::fmt::Debug for TracingMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracingMiddleware")
            .field("service_name", &self.service_name)
            .finish_non_exhaustive()
    }
}

struct TracedExecutor {
    next: Arc<dyn Executor>,
    service_name: String,
    handler: Arc<dyn TracingHandler>,
}

#[async_trait]
impl Executor for TracedExecutor {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let span = info_span!(
            "postal.request",
            service = %self.service_name,
            method = %request.method,
            path = request.path(),
        );

        async {
            let start = Instant::now();
            self.handler.on_request_start(request);

            let outcome = self.next.execute(request).await;

            self.handler
                .on_request_end(request, outcome.as_ref(), start.elapsed());
            outcome
        }
        .instrument(span)
        .await
    }
}
