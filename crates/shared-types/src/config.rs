//! # Pipeline Configuration
//!
//! Serde-deserializable configuration for the ingestion pipeline. Every
//! section has sane defaults so tests can build a config incrementally.

use crate::ProtocolVersion;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level configuration shared by intake and decoder workers.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IndexerConfig {
    #[serde(default)]
    pub settings: ChainSettings,
    #[serde(default)]
    pub scaling: Scaling,
    #[serde(default)]
    pub indexer: IndexerSwitches,
    #[serde(default)]
    pub features: Features,
    #[serde(default)]
    pub prefetch: Prefetch,
    #[serde(default)]
    pub whitelists: Whitelists,
    #[serde(default)]
    pub blacklists: Blacklists,
}

impl IndexerConfig {
    /// Load from a JSON string.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Chain identity and protocol selection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainSettings {
    /// Chain short name; prefixes every queue name.
    pub chain: String,
    /// System contract account (`onblock` issuer, housekeeping tables).
    pub system_contract: String,
    /// State-history protocol release to parse.
    pub parser_version: ProtocolVersion,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            chain: "local".to_string(),
            system_contract: "eosio".to_string(),
            parser_version: ProtocolVersion::V1,
        }
    }
}

/// Routing strategy for the decoder pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    #[default]
    RoundRobin,
    /// Contract-affinity routing from an externally supplied pool map.
    Heatmap,
}

/// Worker-pool and queue-shard sizing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scaling {
    /// Decoder pool size (workers 1..=N).
    pub ds_pool_size: usize,
    /// Shard count for the action and delta index queues.
    pub ad_idx_queues: usize,
    /// Shard count for the generic/block index queues.
    pub indexing_queues: usize,
    /// Shard count for the dynamic table queues.
    pub dyn_idx_queues: usize,
    pub routing_mode: RoutingMode,
    /// Upper bound on the router/dispatcher pending lists.
    pub max_pending: usize,
}

impl Default for Scaling {
    fn default() -> Self {
        Self {
            ds_pool_size: 4,
            ad_idx_queues: 2,
            indexing_queues: 2,
            dyn_idx_queues: 2,
            routing_mode: RoutingMode::RoundRobin,
            max_pending: 4096,
        }
    }
}

/// What the intake stage fetches and processes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexerSwitches {
    pub fetch_block: bool,
    pub fetch_traces: bool,
    pub process_deltas: bool,
    pub disable_indexing: bool,
    /// Scan only for ABI-bearing deltas (bootstrap pass).
    pub abi_scan_mode: bool,
    /// Trim transactions with more inline actions than this; 0 disables.
    pub max_inline: usize,
    pub live_mode: bool,
}

impl Default for IndexerSwitches {
    fn default() -> Self {
        Self {
            fetch_block: true,
            fetch_traces: true,
            process_deltas: true,
            disable_indexing: false,
            abi_scan_mode: false,
            max_inline: 0,
            live_mode: false,
        }
    }
}

/// Optional document categories and streaming gates.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Features {
    pub index_deltas: bool,
    /// Forward rows no handler matched.
    pub index_all_deltas: bool,
    pub failed_trx: bool,
    pub resource_usage: bool,
    pub resource_limits: bool,
    #[serde(default)]
    pub streaming: Streaming,
    /// Contract → tables whose rows feed the dynamic queues.
    #[serde(default)]
    pub contract_state: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub tables: TableFeatures,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            index_deltas: true,
            index_all_deltas: true,
            failed_trx: false,
            resource_usage: false,
            resource_limits: false,
            streaming: Streaming::default(),
            contract_state: HashMap::new(),
            tables: TableFeatures::default(),
        }
    }
}

/// Live-stream gates per document category.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Streaming {
    pub enable: bool,
    pub traces: bool,
    pub deltas: bool,
}

/// System-table side documents.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableFeatures {
    pub accounts: bool,
    pub voters: bool,
    pub proposals: bool,
}

impl Default for TableFeatures {
    fn default() -> Self {
        Self {
            accounts: true,
            voters: true,
            proposals: true,
        }
    }
}

/// Broker prefetch (in-flight unacknowledged message cap).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Prefetch {
    pub block: usize,
}

impl Default for Prefetch {
    fn default() -> Self {
        Self { block: 5 }
    }
}

/// Allow-lists, `chain::code::action` key form (`*` wildcard action).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Whitelists {
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub deltas: Vec<String>,
    /// Pre-scan packed root transactions and skip blocks with no match.
    #[serde(default)]
    pub root_only: bool,
    /// Bound on the whitelist scan across a transaction's flat action list;
    /// 0 means scan everything.
    #[serde(default)]
    pub max_depth: usize,
}

/// Deny-lists, same key form as [`Whitelists`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Blacklists {
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub deltas: Vec<String>,
}
