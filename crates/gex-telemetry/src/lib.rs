//! Prometheus metrics and structured logging for the GEX stream.
//!
//! - Structured logging with tracing (pretty for development, JSON in production)
//! - Prometheus collectors for session health and exposure snapshots
//! - Text exposition for a node-exporter style textfile collector

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, DEFAULT_DIRECTIVE};
pub use metrics::Metrics;
