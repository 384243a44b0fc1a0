//! Control-channel event envelope and subscription filters.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::ipc::ControlEvent;

/// Coarse routing classes on the broadcast channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusTopic {
    /// Schema updates, diagnostics, consumption reports.
    Control,
    /// Per-action live stream payloads.
    TraceStream,
    /// Per-row live stream payloads.
    DeltaStream,
}

/// Routing hints for streamed actions, mirrored from the document body so
/// stream consumers can match without parsing the payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceStreamHeaders {
    pub account: String,
    pub name: String,
    /// Comma-joined receiver set.
    pub notified: String,
}

/// Routing hints for streamed table rows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaStreamHeaders {
    pub code: String,
    pub table: String,
    pub scope: String,
    pub payer: String,
}

/// Everything that rides the broadcast channel.
#[derive(Clone, Debug, PartialEq)]
pub enum BusEvent {
    Control(ControlEvent),
    TraceStream {
        headers: TraceStreamHeaders,
        payload: Value,
    },
    DeltaStream {
        headers: DeltaStreamHeaders,
        payload: Value,
    },
}

impl BusEvent {
    #[must_use]
    pub fn topic(&self) -> BusTopic {
        match self {
            Self::Control(_) => BusTopic::Control,
            Self::TraceStream { .. } => BusTopic::TraceStream,
            Self::DeltaStream { .. } => BusTopic::DeltaStream,
        }
    }
}

/// Topic filter applied on the subscriber side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventFilter {
    pub topics: Vec<BusTopic>,
}

impl EventFilter {
    /// Match every event.
    #[must_use]
    pub fn all() -> Self {
        Self { topics: Vec::new() }
    }

    /// Match only the given topics.
    #[must_use]
    pub fn topics(topics: Vec<BusTopic>) -> Self {
        Self { topics }
    }

    #[must_use]
    pub fn matches(&self, event: &BusEvent) -> bool {
        self.topics.is_empty() || self.topics.contains(&event.topic())
    }
}
