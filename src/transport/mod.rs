//! HTTP transport layer for the Postal client.
//!
//! Provides the executor abstraction that middleware wraps, the reqwest
//! backed executor that performs the real network call, base address
//! handling, and the [`Transport`] that drives a request through its whole
//! lifecycle.

mod api;
mod context;
mod executor;
mod locator;

pub use api::{ApiRequest, Transport, API_KEY_HEADER, REQUEST_ID_HEADER};
pub use context::RequestContext;
pub use executor::{executor_fn, Executor, ExecutorFn, HttpRequest, HttpResponse, ReqwestExecutor};
pub use locator::ResourceLocator;

use std::time::Duration;

/// Transport error types.
///
/// Produced by executors and middleware; the [`Transport`] wraps them into
/// [`PostalError::Transport`](crate::errors::PostalError::Transport).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection error.
    #[error("Connection error: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// The per-request timeout elapsed.
    #[error("Timeout: {message}")]
    Timeout {
        /// Error message.
        message: String,
    },

    /// The request context deadline elapsed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// The request context was cancelled.
    #[error("context cancelled")]
    Cancelled,

    /// Invalid response.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Error message.
        message: String,
    },

    /// The rate limiter can never admit the request.
    #[error("Rate limit exceeded: {message}")]
    RateLimitExceeded {
        /// Error message.
        message: String,
    },

    /// Every retry attempt failed.
    #[error("retries exhausted after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The failure of the last attempt.
        source: Box<TransportError>,
    },
}

impl TransportError {
    /// Returns true if re-executing the request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Connection { .. }
                | TransportError::Timeout { .. }
                | TransportError::InvalidResponse { .. }
        )
    }

    /// Returns true if the call was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root_cause(), TransportError::Cancelled)
    }

    /// Returns the failure of the last attempt of an exhausted retry.
    pub fn last_error(&self) -> Option<&TransportError> {
        match self {
            TransportError::RetriesExhausted { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Returns the innermost failure, looking through exhausted retries.
    pub fn root_cause(&self) -> &TransportError {
        match self {
            TransportError::RetriesExhausted { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub(crate) fn from_reqwest(err: &reqwest::Error, timeout: Option<Duration>) -> Self {
        if err.is_timeout() {
            TransportError::Timeout {
                message: match timeout {
                    Some(t) => format!("no response after {:?}", t),
                    None => err.to_string(),
                },
            }
        } else if err.is_connect() {
            TransportError::Connection {
                message: err.to_string(),
            }
        } else {
            TransportError::InvalidResponse {
                message: err.to_string(),
            }
        }
    }
}
