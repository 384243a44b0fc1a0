//! # Trail Telemetry
//!
//! Observability bootstrap for the ingestion pipeline: structured
//! logging via `tracing-subscriber` and Prometheus counters for the
//! pipeline's throughput and degradation signals.
//!
//! Call [`init_logging`] once at process start; repeated calls are
//! harmless. Metrics register lazily through [`metrics::register_metrics`]
//! and export as Prometheus text via [`metrics::encode_metrics`].

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod logging;
pub mod metrics;

use thiserror::Error;

pub use logging::{init_logging, LoggingConfig};
pub use metrics::{encode_metrics, register_metrics, MetricsHandle};

/// Telemetry initialization errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to initialize metrics: {0}")]
    MetricsInit(String),

    #[error("invalid log filter: {0}")]
    Filter(String),
}
