//! Error types for the Postal client.
//!
//! Every failure surfaces as a [`PostalError`]. Callers branch on
//! [`PostalError::kind`] or [`PostalError::code`], never on message text.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transport::TransportError;

/// Result type alias for Postal operations.
pub type PostalResult<T> = Result<T, PostalError>;

/// Code used for locally generated validation failures.
pub const VALIDATION_ERROR_CODE: &str = "validation_error";

/// Closed set of error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Payload failed local validation (never sent over the wire).
    Validation,
    /// API key rejected (HTTP 401).
    Unauthorized,
    /// Server-side rate limit hit (HTTP 429).
    RateLimit,
    /// Server failure (HTTP 5xx).
    Server,
    /// Any other error reported by the API.
    Api,
    /// Request body could not be encoded.
    Encode,
    /// Outbound request could not be constructed.
    Request,
    /// Network or connection level failure.
    Network,
    /// Per-request timeout or context deadline elapsed.
    Timeout,
    /// The call was cancelled by the caller.
    Cancelled,
    /// Response body could not be decoded.
    Decode,
    /// Client configuration is invalid.
    Configuration,
}

impl ErrorKind {
    /// Returns the stable machine-readable code for this kind.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Validation => VALIDATION_ERROR_CODE,
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Server => "server_error",
            ErrorKind::Api => "api_error",
            ErrorKind::Encode => "encode_error",
            ErrorKind::Request => "request_error",
            ErrorKind::Network => "network_error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Decode => "decode_error",
            ErrorKind::Configuration => "configuration_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Structured error returned by the Postal API.
///
/// The HTTP status is not part of the JSON body; the transport stamps it
/// onto the decoded value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Machine-readable error code.
    #[serde(default)]
    pub code: String,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Additional error details.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub details: HashMap<String, serde_json::Value>,
    /// HTTP status code of the response that carried this error.
    #[serde(skip)]
    pub status_code: u16,
}

impl ApiError {
    /// Creates a new API error with an empty details map.
    pub fn new(code: impl Into<String>, message: impl Into<String>, status_code: u16) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: HashMap::new(),
            status_code,
        }
    }

    /// Replaces the error details.
    #[must_use]
    pub fn with_details(mut self, details: HashMap<String, serde_json::Value>) -> Self {
        self.details = details;
        self
    }

    /// Classifies the error, preferring the HTTP status over the code.
    pub fn kind(&self) -> ErrorKind {
        match self.status_code {
            401 => ErrorKind::Unauthorized,
            429 => ErrorKind::RateLimit,
            500..=599 => ErrorKind::Server,
            _ => match self.code.as_str() {
                "unauthorized" => ErrorKind::Unauthorized,
                "rate_limit" => ErrorKind::RateLimit,
                "server_error" => ErrorKind::Server,
                VALIDATION_ERROR_CODE => ErrorKind::Validation,
                _ => ErrorKind::Api,
            },
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.details.is_empty() {
            write!(f, "{}: {}", self.code, self.message)
        } else {
            let details = serde_json::to_string(&self.details).unwrap_or_default();
            write!(f, "{}: {} (details: {})", self.code, self.message, details)
        }
    }
}

impl std::error::Error for ApiError {}

/// Comprehensive error type for Postal client operations.
#[derive(Debug, Error)]
pub enum PostalError {
    /// The payload failed local validation.
    #[error("validation_error: {}", .violations.join("; "))]
    Validation {
        /// Every violation found, in check order.
        violations: Vec<String>,
    },

    /// The API returned an error response.
    #[error("{0}")]
    Api(ApiError),

    /// The request body could not be encoded.
    #[error("failed to encode request body: {message}")]
    Encode {
        /// Error message from the encoder.
        message: String,
    },

    /// The outbound request could not be constructed.
    #[error("failed to create request: {message}")]
    Request {
        /// Error message.
        message: String,
    },

    /// Executing the request failed before a response was received.
    #[error("request failed: {0}")]
    Transport(#[from] TransportError),

    /// A response was received but could not be decoded.
    #[error("{context}: {message}")]
    Decode {
        /// Which response was being decoded.
        context: &'static str,
        /// Error message from the decoder.
        message: String,
        /// HTTP status of the response.
        status_code: u16,
    },

    /// Client configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message describing the configuration issue.
        message: String,
    },
}

impl PostalError {
    /// Creates a validation error from a list of violations.
    pub fn validation(violations: Vec<String>) -> Self {
        PostalError::Validation { violations }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        PostalError::Configuration {
            message: message.into(),
        }
    }

    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PostalError::Validation { .. } => ErrorKind::Validation,
            PostalError::Api(err) => err.kind(),
            PostalError::Encode { .. } => ErrorKind::Encode,
            PostalError::Request { .. } => ErrorKind::Request,
            PostalError::Transport(err) => match err.root_cause() {
                TransportError::Cancelled => ErrorKind::Cancelled,
                TransportError::Timeout { .. } | TransportError::DeadlineExceeded => {
                    ErrorKind::Timeout
                }
                TransportError::RateLimitExceeded { .. } => ErrorKind::RateLimit,
                _ => ErrorKind::Network,
            },
            PostalError::Decode { .. } => ErrorKind::Decode,
            PostalError::Configuration { .. } => ErrorKind::Configuration,
        }
    }

    /// Returns the machine-readable code.
    ///
    /// API errors report the code sent by the server; everything else
    /// reports the code of its [`ErrorKind`].
    pub fn code(&self) -> &str {
        match self {
            PostalError::Api(err) => &err.code,
            other => other.kind().code(),
        }
    }

    /// Returns the HTTP status associated with the error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            PostalError::Validation { .. } => Some(400),
            PostalError::Api(err) => Some(err.status_code),
            PostalError::Decode { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// Returns the API error details, if this is an API error.
    pub fn details(&self) -> Option<&HashMap<String, serde_json::Value>> {
        match self {
            PostalError::Api(err) => Some(&err.details),
            _ => None,
        }
    }

    /// Returns the violation list of a validation error.
    pub fn violations(&self) -> &[String] {
        match self {
            PostalError::Validation { violations } => violations,
            _ => &[],
        }
    }

    /// Returns the structured form of this error, as the API would report it.
    pub fn to_api_error(&self) -> ApiError {
        match self {
            PostalError::Api(err) => err.clone(),
            PostalError::Validation { violations } => {
                ApiError::new(VALIDATION_ERROR_CODE, violations.join("; "), 400)
            }
            other => ApiError::new(
                other.code(),
                other.to_string(),
                other.status_code().unwrap_or(0),
            ),
        }
    }

    /// Returns true for local validation failures.
    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    /// Returns true if the API key was rejected.
    pub fn is_unauthorized(&self) -> bool {
        self.kind() == ErrorKind::Unauthorized
    }

    /// Returns true if the server or a local rate limiter refused the request.
    pub fn is_rate_limit(&self) -> bool {
        self.kind() == ErrorKind::RateLimit
    }

    /// Returns true for 5xx server failures.
    pub fn is_server_error(&self) -> bool {
        self.kind() == ErrorKind::Server
    }

    /// Returns true if the caller cancelled the call.
    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }
}

impl From<ApiError> for PostalError {
    fn from(err: ApiError) -> Self {
        PostalError::Api(err)
    }
}

impl From<url::ParseError> for PostalError {
    fn from(err: url::ParseError) -> Self {
        PostalError::Configuration {
            message: format!("invalid URL format: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::error::Error as _;

    #[test]
    fn test_new_api_error_has_empty_details() {
        let err = ApiError::new("rate_limit", "slow down", 429);
        assert!(err.details.is_empty());
        assert_eq!(err.status_code, 429);
    }

    #[test]
    fn test_api_error_display() {
        let err = ApiError::new("server_error", "boom", 500);
        assert_eq!(err.to_string(), "server_error: boom");

        let mut details = HashMap::new();
        details.insert("field".to_string(), serde_json::json!("to"));
        let err = err.with_details(details);
        assert_eq!(err.to_string(), r#"server_error: boom (details: {"field":"to"})"#);
    }

    #[test]
    fn test_api_error_kind_by_status() {
        assert_eq!(ApiError::new("x", "", 401).kind(), ErrorKind::Unauthorized);
        assert_eq!(ApiError::new("x", "", 429).kind(), ErrorKind::RateLimit);
        assert_eq!(ApiError::new("x", "", 502).kind(), ErrorKind::Server);
        assert_eq!(ApiError::new("x", "", 404).kind(), ErrorKind::Api);
    }

    #[test]
    fn test_api_error_kind_by_code() {
        assert_eq!(
            ApiError::new("rate_limit", "", 400).kind(),
            ErrorKind::RateLimit
        );
        assert_eq!(
            ApiError::new("validation_error", "", 422).kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_api_error_status_not_serialized() {
        let err = ApiError::new("unauthorized", "bad key", 401);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"code": "unauthorized", "message": "bad key"})
        );
    }

    #[test]
    fn test_api_error_round_trip() {
        let mut details = HashMap::new();
        details.insert("limit".to_string(), serde_json::json!(100));
        let err = ApiError::new("rate_limit", "too many", 0).with_details(details);

        let decoded: ApiError = serde_json::from_str(&serde_json::to_string(&err).unwrap()).unwrap();
        assert_eq!(decoded, err);
    }

    #[test]
    fn test_validation_error() {
        let err = PostalError::validation(vec![
            "subject is required".to_string(),
            "sender (From) is required".to_string(),
        ]);

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.code(), "validation_error");
        assert_eq!(err.status_code(), Some(400));
        assert!(err.is_validation());
        assert_eq!(
            err.to_api_error().message,
            "subject is required; sender (From) is required"
        );
    }

    #[test]
    fn test_api_code_passthrough() {
        let err = PostalError::from(ApiError::new("NoRecipients", "none", 422));
        assert_eq!(err.code(), "NoRecipients");
        assert_eq!(err.kind(), ErrorKind::Api);
        assert_eq!(err.status_code(), Some(422));
    }

    #[test]
    fn test_transport_error_classification() {
        let cancelled = PostalError::from(TransportError::Cancelled);
        assert!(cancelled.is_cancelled());
        assert_eq!(cancelled.code(), "cancelled");

        let deadline = PostalError::from(TransportError::DeadlineExceeded);
        assert_eq!(deadline.kind(), ErrorKind::Timeout);

        let network = PostalError::from(TransportError::Connection {
            message: "refused".to_string(),
        });
        assert_eq!(network.kind(), ErrorKind::Network);
        assert_eq!(network.status_code(), None);
    }

    #[test]
    fn test_local_rate_limit_classification() {
        let err = PostalError::from(TransportError::RateLimitExceeded {
            message: "burst is zero".to_string(),
        });

        assert!(err.is_rate_limit());
        assert_eq!(err.code(), "rate_limit");
        assert_eq!(err.status_code(), None);
    }

    #[test]
    fn test_exhausted_retries_keep_last_failure() {
        let err = PostalError::from(TransportError::RetriesExhausted {
            attempts: 3,
            source: Box::new(TransportError::Timeout {
                message: "read timed out".to_string(),
            }),
        });

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.to_string().contains("read timed out"));
        assert!(err.source().is_some());
    }
}
