//! Prometheus metrics for the ingestion pipeline.
//!
//! Naming convention: `trail_<stage>_<metric>_<unit>`.

use crate::TelemetryError;
use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, Gauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

lazy_static! {
    /// Global metrics registry.
    pub static ref REGISTRY: Registry = Registry::new();

    /// Blocks fully processed and acknowledged by intake.
    pub static ref BLOCKS_CONSUMED: Counter = Counter::new(
        "trail_intake_blocks_consumed_total",
        "Blocks fully processed and acknowledged"
    ).expect("metric creation failed");

    /// Last block number consumed by intake.
    pub static ref LAST_CONSUMED_BLOCK: Gauge = Gauge::new(
        "trail_intake_last_consumed_block",
        "Block number of the most recently consumed block"
    ).expect("metric creation failed");

    /// Finalized actions emitted by the decoder pool.
    pub static ref ACTIONS_DESERIALIZED: Counter = Counter::new(
        "trail_decoder_actions_deserialized_total",
        "Finalized actions emitted by the decoder workers"
    ).expect("metric creation failed");

    /// Delta rows forwarded to the index queues.
    pub static ref DELTAS_PROCESSED: Counter = Counter::new(
        "trail_deltas_rows_processed_total",
        "Decoded table-delta rows forwarded downstream"
    ).expect("metric creation failed");

    /// Decodes that degraded to hex, by kind (action/delta).
    pub static ref DS_ERRORS: CounterVec = CounterVec::new(
        Opts::new(
            "trail_decode_errors_total",
            "Decodes degraded to hex payloads"
        ),
        &["kind"]
    ).expect("metric creation failed");

    /// Publishes deferred to a pending list, by queue label.
    pub static ref BACKPRESSURE_STALLS: CounterVec = CounterVec::new(
        Opts::new(
            "trail_backpressure_stalls_total",
            "Publishes held back by a stalled downstream queue"
        ),
        &["queue"]
    ).expect("metric creation failed");
}

/// Keeps the registry handle alive for the process lifetime.
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register the pipeline metrics with the global registry.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(BLOCKS_CONSUMED.clone()),
        Box::new(LAST_CONSUMED_BLOCK.clone()),
        Box::new(ACTIONS_DESERIALIZED.clone()),
        Box::new(DELTAS_PROCESSED.clone()),
        Box::new(DS_ERRORS.clone()),
        Box::new(BACKPRESSURE_STALLS.clone()),
    ];
    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }
    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode the registry as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
