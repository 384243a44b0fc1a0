//! Subscriber setup: env-filter driven, plain or JSON output.

use crate::TelemetryError;
use tracing_subscriber::{fmt, EnvFilter};

/// How the process formats its log stream.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Filter directives; falls back to `RUST_LOG`, then this default.
    pub default_filter: String,
    /// Emit JSON lines instead of the human-readable format.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            json: false,
        }
    }
}

/// Install the global subscriber. Idempotent: a second call in the same
/// process (common under `cargo test`) is a no-op, not a panic.
pub fn init_logging(config: &LoggingConfig) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_filter))
        .map_err(|e| TelemetryError::Filter(e.to_string()))?;

    let result = if config.json {
        fmt()
            .with_env_filter(filter)
            .json()
            .flatten_event(true)
            .try_init()
    } else {
        fmt().with_env_filter(filter).try_init()
    };

    // Err here means a subscriber is already installed.
    if result.is_err() {
        tracing::debug!("logging already initialized, keeping existing subscriber");
    }
    Ok(())
}
