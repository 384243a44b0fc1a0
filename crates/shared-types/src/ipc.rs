//! # Control-Channel Events
//!
//! Out-of-band process-to-process messages: schema bootstrap/update
//! notifications, decode diagnostics and per-block consumption reports.
//! These never ride the document queues; an external supervisor consumes
//! them to drive alerting and scaling policy.

use crate::entities::{AbiUpdateRecord, Act, ProducerSchedule};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What failed to decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DsErrorKind {
    Action,
    Delta,
}

/// One degraded decode: the action/row was forwarded with hex data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DsError {
    pub kind: DsErrorKind,
    pub contract: String,
    pub name: String,
    pub block_num: u64,
    /// Global sequence of the affected action; zero for delta rows.
    #[serde(default)]
    pub global_sequence: u64,
}

/// Control-channel message set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ControlEvent {
    /// A contract published new code; workers must refresh their caches.
    UpdateSchema(AbiUpdateRecord),
    /// Evict one contract from worker caches.
    RemoveContract { contract: String },
    /// Enable live-stream publishing.
    ConnectStream,
    /// Replace the contract-affinity pool map.
    UpdatePoolMap { map: HashMap<String, Vec<usize>> },
    /// Extend the dynamic-contract allow list.
    AllowDynamicContracts { contracts: Vec<String> },
    /// A decode degraded to hex.
    DsError(DsError),
    /// One block fully processed and acknowledged.
    ConsumedBlock {
        block_num: u64,
        block_id: String,
        trx_ids: Vec<String>,
        /// Last irreversible block at the time of consumption.
        lib: u64,
        live: bool,
    },
    /// A block rotated the producer schedule.
    NewSchedule {
        block_num: u64,
        new_producers: ProducerSchedule,
        live: bool,
    },
    /// Live mode: a transaction was seen inside a block.
    IncludedTrx {
        block_num: u64,
        trx_id: String,
        signatures: Vec<String>,
        root_act: Act,
    },
    /// Periodic throughput report.
    DsReport { actions: u64, deltas: u64 },
}
