//! Postal Client Library
//!
//! A production-ready Rust client for the Postal transactional mail API.
//! Messages are validated locally, marshaled to JSON and submitted over
//! HTTPS through a composable middleware pipeline.
//!
//! # Features
//!
//! - **Local Validation**: Every violation in a message is reported at once,
//!   before any network activity
//! - **Middleware Pipeline**: Rate limiting, retries, tracing and metrics
//!   composed around the wire call in a deterministic order
//! - **Typed Errors**: Remote and local failures share one error type with
//!   stable machine-readable codes
//! - **Cancellation**: Every call is bounded by a caller-supplied
//!   [`RequestContext`]
//! - **Async/Await**: Built on Tokio and reqwest
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use postal_client::{Message, PostalClient, RequestContext};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = PostalClient::builder()
//!         .base_url("postal.example.com")
//!         .api_key("your_api_key")
//!         .build()?;
//!
//!     let message = Message {
//!         to: vec!["user@example.com".to_string()],
//!         from: "sender@example.com".to_string(),
//!         subject: "Hello".to_string(),
//!         plain_body: Some("Hello from Postal".to_string()),
//!         ..Default::default()
//!     };
//!
//!     let result = client.send(&RequestContext::new(), &message).await?;
//!     println!("queued {} ({})", result.message_id, result.status);
//!     Ok(())
//! }
//! ```
//!
//! # Middleware Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use postal_client::PostalClient;
//! use postal_client::resilience::{RateLimitConfig, RateLimitMiddleware, RetryConfig, RetryMiddleware};
//! use postal_client::observability::TracingMiddleware;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = PostalClient::builder()
//!     .base_url("https://postal.example.com")
//!     .api_key("your_api_key")
//!     .build()?;
//!
//! // First added is outermost.
//! client
//!     .with_middleware(TracingMiddleware::default())
//!     .with_middleware(RateLimitMiddleware::new(RateLimitConfig::new(10.0, 5)))
//!     .with_middleware(RetryMiddleware::new(
//!         RetryConfig::new().max_attempts(3).interval(Duration::from_millis(500)),
//!     ));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod middleware;
pub mod observability;
pub mod resilience;
pub mod transport;
pub mod types;
pub mod validation;

// Re-exports for convenience
pub use client::{PostalClient, PostalClientBuilder};
pub use config::PostalConfig;
pub use errors::{ApiError, ErrorKind, PostalError, PostalResult};
pub use middleware::{Chain, Middleware};
pub use transport::{Executor, HttpRequest, HttpResponse, RequestContext, TransportError};

// Type re-exports
pub use types::{Attachment, Message, RawMessage, SendResult};

/// Mock implementations for testing.
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
