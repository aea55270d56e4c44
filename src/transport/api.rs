//! Request lifecycle for Postal API calls.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::Method;
use serde::Serialize;
use tracing::instrument;
use url::Url;
use uuid::Uuid;

use super::{Executor, HttpRequest, HttpResponse, RequestContext, ResourceLocator};
use crate::auth::AuthProvider;
use crate::config::PostalConfig;
use crate::errors::{ApiError, PostalError, PostalResult};
use crate::middleware::{Chain, Middleware};
use crate::observability::{log_error, log_request, log_response};
use crate::types::SendResult;

/// Header carrying the server API key.
pub const API_KEY_HEADER: &str = "x-server-api-key";

/// Header carrying the per-call correlation ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// A single API call before encoding.
#[derive(Debug, Clone)]
pub struct ApiRequest<B> {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the base address.
    pub path: String,
    /// Payload, encoded as JSON on submit.
    pub body: B,
    /// Extra headers; these override the defaults.
    pub headers: HashMap<String, String>,
}

impl<B> ApiRequest<B> {
    /// Creates a POST request.
    pub fn post(path: impl Into<String>, body: B) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body,
            headers: HashMap::new(),
        }
    }

    /// Adds an extra header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Drives API calls from payload to typed result.
///
/// The base executor is never modified. When middleware is configured, each
/// call composes a fresh executor around it, so concurrent calls never
/// share composition state.
pub struct Transport {
    locator: ResourceLocator,
    auth: Arc<dyn AuthProvider>,
    base: Arc<dyn Executor>,
    middleware: Vec<Arc<dyn Middleware>>,
    timeout: Option<Duration>,
    debug: bool,
}

impl Transport {
    /// Creates a transport with no middleware.
    pub fn new(
        locator: ResourceLocator,
        auth: Arc<dyn AuthProvider>,
        base: Arc<dyn Executor>,
    ) -> Self {
        Self {
            locator,
            auth,
            base,
            middleware: Vec::new(),
            timeout: None,
            debug: false,
        }
    }

    /// Appends a middleware. Earlier middleware wraps later middleware.
    pub fn add_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.middleware.push(middleware);
    }

    /// Applies the per-call settings of a client configuration.
    pub fn apply_config(&mut self, config: &PostalConfig) {
        self.timeout = Some(config.timeout);
        self.debug = config.debug;
    }

    /// Returns the base address.
    pub fn locator(&self) -> &ResourceLocator {
        &self.locator
    }

    /// Returns the number of configured middleware.
    pub fn middleware_len(&self) -> usize {
        self.middleware.len()
    }

    /// Returns the executor for one call.
    pub fn executor(&self) -> Arc<dyn Executor> {
        if self.middleware.is_empty() {
            return Arc::clone(&self.base);
        }

        Chain::new(self.middleware.clone()).wrap(Arc::clone(&self.base))
    }

    /// Submits a request and classifies the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`PostalError::Encode`] or [`PostalError::Request`] before any
    /// network activity, [`PostalError::Transport`] when execution fails,
    /// [`PostalError::Api`] for 4xx/5xx responses and
    /// [`PostalError::Decode`] when a response body cannot be parsed.
    #[instrument(skip(self, ctx, request), fields(path = %request.path))]
    pub async fn submit<B: Serialize>(
        &self,
        ctx: &RequestContext,
        request: ApiRequest<B>,
    ) -> PostalResult<SendResult> {
        let url = Url::parse(&self.locator.join_path(&request.path)).map_err(|e| {
            PostalError::Request {
                message: e.to_string(),
            }
        })?;

        let body = serde_json::to_vec(&request.body).map_err(|e| PostalError::Encode {
            message: e.to_string(),
        })?;

        if self.debug {
            log_request(
                request.method.as_str(),
                url.path(),
                std::str::from_utf8(&body).ok(),
            );
        }

        let mut http_request = HttpRequest::new(request.method, url, ctx.clone()).with_body(body);
        if let Some(timeout) = self.timeout {
            http_request = http_request.with_timeout(timeout);
        }
        self.apply_headers(&mut http_request, &request.headers)?;

        let executor = self.executor();
        let start = Instant::now();
        let response = match executor.execute(&http_request).await {
            Ok(response) => response,
            Err(err) => {
                if self.debug {
                    log_error(&err, "request execution failed");
                }
                return Err(err.into());
            }
        };

        if self.debug {
            log_response(
                response.status,
                u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                std::str::from_utf8(&response.body).ok(),
            );
        }

        let outcome = classify(&response);
        if self.debug {
            if let Err(err) = &outcome {
                log_error(err, "request rejected");
            }
        }
        outcome
    }

    fn apply_headers(
        &self,
        request: &mut HttpRequest,
        extra: &HashMap<String, String>,
    ) -> PostalResult<()> {
        let content_type =
            HeaderValue::from_str(mime::APPLICATION_JSON.as_ref()).map_err(|e| {
                PostalError::Request {
                    message: e.to_string(),
                }
            })?;
        request.headers.insert(CONTENT_TYPE, content_type);

        self.auth.apply_auth(&mut request.headers)?;

        let request_id = HeaderValue::from_str(&Uuid::new_v4().to_string()).map_err(|e| {
            PostalError::Request {
                message: e.to_string(),
            }
        })?;
        request
            .headers
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), request_id);

        for (name, value) in extra {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|_| PostalError::Request {
                    message: format!("invalid header name: {}", name),
                })?;
            let header_value = HeaderValue::from_str(value).map_err(|_| PostalError::Request {
                message: format!("invalid value for header {}", name),
            })?;
            request.headers.insert(header_name, header_value);
        }

        Ok(())
    }
}

fn classify(response: &HttpResponse) -> PostalResult<SendResult> {
    if response.status >= 400 {
        let mut err: ApiError = response.json().map_err(|e| PostalError::Decode {
            context: "failed to parse error response",
            message: e.to_string(),
            status_code: response.status,
        })?;
        err.status_code = response.status;
        return Err(PostalError::Api(err));
    }

    response.json().map_err(|e| PostalError::Decode {
        context: "failed to parse response",
        message: e.to_string(),
        status_code: response.status,
    })
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("locator", &self.locator)
            .field("middleware", &self.middleware.len())
            .field("timeout", &self.timeout)
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}
