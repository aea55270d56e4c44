//! Mock implementations for testing.
//!
//! Provides a scripted executor and canned responses so the transport,
//! middleware and client can be exercised without a network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use parking_lot::Mutex;

use crate::transport::{Executor, HttpRequest, HttpResponse, TransportError};

/// Canned responses.
pub struct MockResponse;

impl MockResponse {
    /// Creates a JSON response with the given status.
    pub fn json<T: serde::Serialize>(status: u16, value: &T) -> HttpResponse {
        let body = serde_json::to_vec(value).unwrap_or_default();
        let mut response = HttpResponse::new(status, Bytes::from(body));
        response
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }

    /// Creates a 200 response for an accepted message.
    pub fn success(message_id: &str) -> HttpResponse {
        Self::json(
            200,
            &serde_json::json!({"message_id": message_id, "status": "success"}),
        )
    }

    /// Creates an API error response.
    pub fn error(status: u16, code: &str, message: &str) -> HttpResponse {
        Self::json(
            status,
            &serde_json::json!({"code": code, "message": message}),
        )
    }
}

/// Executor that replays queued outcomes and records every request.
///
/// Outcomes are consumed in order; once the queue is empty the default
/// outcome is returned, or an [`TransportError::InvalidResponse`] if none
/// was set.
#[derive(Default)]
pub struct MockExecutor {
    outcomes: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    default_response: Mutex<Option<HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
    calls: AtomicUsize,
}

impl MockExecutor {
    /// Creates an empty mock executor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response.
    #[must_use]
    pub fn with_response(self, response: HttpResponse) -> Self {
        self.queue(response);
        self
    }

    /// Queues an execution error.
    #[must_use]
    pub fn with_error(self, error: TransportError) -> Self {
        self.queue_error(error);
        self
    }

    /// Queues a response.
    pub fn queue(&self, response: HttpResponse) {
        self.outcomes.lock().push_back(Ok(response));
    }

    /// Queues an execution error.
    pub fn queue_error(&self, error: TransportError) {
        self.outcomes.lock().push_back(Err(error));
    }

    /// Sets the response returned once the queue is drained.
    pub fn set_default(&self, response: HttpResponse) {
        *self.default_response.lock() = Some(response);
    }

    /// Gets all recorded requests.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Gets the last recorded request.
    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests.lock().last().cloned()
    }

    /// Returns the number of times the executor was invoked.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        if let Some(outcome) = self.outcomes.lock().pop_front() {
            return outcome;
        }

        self.default_response
            .lock()
            .clone()
            .ok_or_else(|| TransportError::InvalidResponse {
                message: "no mock response queued".to_string(),
            })
    }
}
