//! Observability module for the Postal client.
//!
//! Provides logging setup and helpers, and the tracing and metrics
//! middleware. Everything is emitted through the `tracing` crate; the
//! API key never appears in any event.

mod logging;
mod metrics;
mod trace;

pub use logging::{log_error, log_request, log_response, LogFormat, LogLevel, LoggingConfig};
pub use metrics::{
    DefaultMetricsCollector, MetricsCollector, MetricsMiddleware, MetricsSnapshot, RequestKey,
};
pub use trace::{DefaultTracingHandler, TracingHandler, TracingMiddleware};
