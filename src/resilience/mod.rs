//! Resilience middleware for the Postal client.
//!
//! Provides bounded retries and token-bucket rate limiting, both as
//! [`Middleware`](crate::middleware::Middleware) that can be composed in any
//! order around the transport.

mod rate_limit;
mod retry;

pub use rate_limit::{RateLimitConfig, RateLimitMiddleware};
pub use retry::{RetryConfig, RetryMiddleware};
