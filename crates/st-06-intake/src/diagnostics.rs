//! Control-channel diagnostics adapter.

use async_trait::async_trait;
use shared_bus::InMemoryControlBus;
use shared_types::ipc::{ControlEvent, DsError};
use st_01_abi_cache::DiagnosticSink;
use std::sync::Arc;

/// Forwards decode diagnostics onto the control channel so a supervisor
/// can drive alerting and blacklist policy.
pub struct BusDiagnostics {
    bus: Arc<InMemoryControlBus>,
}

impl BusDiagnostics {
    #[must_use]
    pub fn new(bus: Arc<InMemoryControlBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl DiagnosticSink for BusDiagnostics {
    async fn report(&self, error: DsError) {
        self.bus.publish_control(ControlEvent::DsError(error)).await;
    }
}
