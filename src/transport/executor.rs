//! HTTP executor abstraction and its reqwest implementation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method};
use reqwest::{Client, ClientBuilder};
use tracing::instrument;
use url::Url;

use super::{RequestContext, TransportError};

/// HTTP request representation.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Fully joined request URL.
    pub url: Url,
    /// Request headers.
    pub headers: HeaderMap,
    /// Encoded request body.
    pub body: Bytes,
    /// Per-request timeout.
    pub timeout: Option<Duration>,
    /// Cancellation scope of the call this request belongs to.
    pub context: RequestContext,
}

impl HttpRequest {
    /// Creates a request with an empty body and no headers.
    pub fn new(method: Method, url: Url, context: RequestContext) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            timeout: None,
            context,
        }
    }

    /// Sets the request body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the URL path, used as the metrics and tracing key.
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Returns a header value as a string, if present and printable.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// HTTP response representation.
///
/// The body is fully read by the executor before the response is handed
/// back, so it is consumed exactly once regardless of outcome.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

impl HttpResponse {
    /// Creates a response with no headers.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Returns true if the status indicates success (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns true for 4xx statuses.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Returns true for 5xx statuses.
    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }

    /// Returns the response size: the `Content-Length` header when present,
    /// otherwise the length of the buffered body.
    pub fn content_length(&self) -> u64 {
        self.headers
            .get(http::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.body.len() as u64)
    }

    /// Parses the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Executes a single HTTP request.
///
/// This is the capability middleware wraps. Implementations must be safe to
/// call concurrently.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Executes the request and returns the buffered response.
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Adapts an async closure into an [`Executor`].
pub struct ExecutorFn<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Executor for ExecutorFn<F>
where
    F: Fn(HttpRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<HttpResponse, TransportError>> + Send,
{
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (self.f)(request.clone()).await
    }
}

/// Wraps an async closure as a shared executor.
pub fn executor_fn<F, Fut>(f: F) -> Arc<dyn Executor>
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse, TransportError>> + Send + 'static,
{
    Arc::new(ExecutorFn { f })
}

/// Executor backed by a shared reqwest client.
///
/// The client is never mutated after construction; cloning the executor
/// shares the underlying connection pool.
#[derive(Clone)]
pub struct ReqwestExecutor {
    client: Client,
}

impl ReqwestExecutor {
    /// Creates an executor with its own connection pool.
    pub fn new(max_idle_per_host: usize) -> Result<Self, TransportError> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(max_idle_per_host)
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| TransportError::Connection {
                message: e.to_string(),
            })?;

        Ok(Self { client })
    }

    /// Creates an executor around an existing client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Executor for ReqwestExecutor {
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path()))]
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut req_builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .body(request.body.clone());

        if let Some(timeout) = request.timeout {
            req_builder = req_builder.timeout(timeout);
        }

        let timeout = request.timeout;
        request
            .context
            .run(async move {
                let response = req_builder
                    .send()
                    .await
                    .map_err(|e| TransportError::from_reqwest(&e, timeout))?;

                let status = response.status().as_u16();
                let headers = response.headers().clone();
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| TransportError::from_reqwest(&e, timeout))?;

                Ok(HttpResponse {
                    status,
                    headers,
                    body,
                })
            })
            .await
    }
}

impl std::fmt::Debug for ReqwestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestExecutor").finish()
    }
}
