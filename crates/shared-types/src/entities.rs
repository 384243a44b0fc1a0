//! # Domain Entities
//!
//! Everything a block turns into on its way through the pipeline: the raw
//! state-history envelope, transaction/action traces, table-delta rows and
//! the canonical documents pushed to the indexing queues.
//!
//! Index documents serialize with the `@timestamp` field name expected by
//! the storage backend; internal-only fields are skipped when empty so the
//! emitted JSON stays lean.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Block number + id pair as carried in the envelope.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPosition {
    pub block_num: u64,
    pub block_id: String,
}

/// One raw state-history message, parsed only to the envelope level.
///
/// The `block`, `traces` and `deltas` buffers stay opaque (and possibly
/// compressed) until the protocol parser inflates and decodes them.
/// Ephemeral: lives for one intake cycle.
#[derive(Clone, Debug, Default)]
pub struct RawBlockEnvelope {
    pub head: Option<BlockPosition>,
    pub last_irreversible: Option<BlockPosition>,
    pub this_block: Option<BlockPosition>,
    pub prev_block: Option<BlockPosition>,
    pub block: Option<Vec<u8>>,
    pub traces: Option<Vec<u8>>,
    pub deltas: Option<Vec<u8>>,
}

/// actor@permission pair on an action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub actor: String,
    pub permission: String,
}

/// An action's payload: decoded JSON when a schema resolved, otherwise the
/// raw bytes as lowercase hex.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionData {
    Decoded(Value),
    Hex(String),
}

impl Default for ActionData {
    fn default() -> Self {
        Self::Hex(String::new())
    }
}

impl ActionData {
    #[must_use]
    pub fn is_decoded(&self) -> bool {
        matches!(self, Self::Decoded(_))
    }

    /// The hex form, when decoding never happened (or failed). The enum
    /// is untagged, so a queue round trip turns `Hex` into a decoded
    /// string value; a bare JSON string is always the hex form.
    #[must_use]
    pub fn as_hex(&self) -> Option<&str> {
        match self {
            Self::Hex(h) => Some(h),
            Self::Decoded(Value::String(h)) => Some(h),
            Self::Decoded(_) => None,
        }
    }
}

/// The action itself: contract account, action name, authorizations, data.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Act {
    pub account: String,
    pub name: String,
    pub authorization: Vec<Authorization>,
    pub data: ActionData,
}

/// Per-account sequence entry inside a receipt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSequence {
    pub account: String,
    pub sequence: u64,
}

/// The receipt the chain issues for one notified delivery of an action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReceipt {
    pub receiver: String,
    /// Content digest shared by every delivery of the same logical action.
    pub act_digest: String,
    pub global_sequence: u64,
    pub recv_sequence: u64,
    pub auth_sequence: Vec<AuthSequence>,
    pub code_sequence: u32,
    pub abi_sequence: u32,
}

/// Receipt entry after deduplication: the per-receiver fields only, with
/// `code_sequence`/`abi_sequence`/`act_digest` hoisted to the action level.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptEntry {
    pub receiver: String,
    pub global_sequence: u64,
    pub recv_sequence: u64,
    pub auth_sequence: Vec<AuthSequence>,
}

impl From<ActionReceipt> for ReceiptEntry {
    fn from(r: ActionReceipt) -> Self {
        Self {
            receiver: r.receiver,
            global_sequence: r.global_sequence,
            recv_sequence: r.recv_sequence,
            auth_sequence: r.auth_sequence,
        }
    }
}

/// RAM accounting entry attached to a trace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RamDelta {
    pub account: String,
    pub delta: i64,
}

/// One execution of one action as emitted by the node.
///
/// `inline_traces` is only populated by the earliest protocol version;
/// newer releases deliver a flat list with the ordinals pre-assigned.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionTrace {
    pub action_ordinal: u32,
    pub creator_action_ordinal: u32,
    pub receipt: Option<ActionReceipt>,
    pub receiver: String,
    pub act: Option<Act>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub except: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub account_ram_deltas: Vec<RamDelta>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inline_traces: Vec<ActionTrace>,
}

/// Transaction execution status codes used by the node.
pub mod trx_status {
    pub const EXECUTED: u8 = 0;
    pub const SOFT_FAIL: u8 = 1;
    pub const HARD_FAIL: u8 = 2;
    pub const DELAYED: u8 = 3;
    pub const EXPIRED: u8 = 4;
}

/// One transaction's worth of traces, as routed to a decoder worker.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionTrace {
    pub id: String,
    pub status: u8,
    pub cpu_usage_us: u32,
    pub net_usage_words: u32,
    pub action_traces: Vec<ActionTrace>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signatures: Vec<String>,
}

/// Block metadata headers accompanying a routed transaction on the decoder
/// input queue.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrxMetadata {
    pub trx_id: String,
    pub block_num: u64,
    pub block_id: String,
    pub producer: String,
    pub ts: String,
    pub cpu_usage_us: u32,
    pub net_usage_words: u32,
    pub inline_count: usize,
    pub filtered: bool,
    pub live: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signatures: Vec<String>,
}

/// Decoder input queue payload: one transaction plus its block headers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutedTransaction {
    pub trace: TransactionTrace,
    pub headers: TrxMetadata,
}

/// Post-parse, pre-deduplication form of one action: trace fields merged
/// with block metadata, receipt still attached.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessedAction {
    #[serde(rename = "@timestamp")]
    pub timestamp: String,
    pub block_num: u64,
    pub block_id: String,
    pub producer: String,
    pub trx_id: String,
    pub action_ordinal: u32,
    pub creator_action_ordinal: u32,
    pub global_sequence: u64,
    pub act: Act,
    pub receipt: ActionReceipt,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub account_ram_deltas: Vec<RamDelta>,
    /// Usage fields are stamped onto the first action of the transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_usage_us: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_usage_words: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_filtered: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signatures: Vec<String>,
}

/// The canonical, deduplicated action document: exactly one per unique
/// content digest within a transaction.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalizedAction {
    #[serde(rename = "@timestamp")]
    pub timestamp: String,
    pub block_num: u64,
    pub block_id: String,
    pub producer: String,
    pub trx_id: String,
    pub action_ordinal: u32,
    pub creator_action_ordinal: u32,
    pub global_sequence: u64,
    pub act: Act,
    /// One entry per notified receiver, original notification order.
    pub receipts: Vec<ReceiptEntry>,
    /// Deduplicated receiver set, notification order preserved.
    pub notified: Vec<String>,
    pub code_sequence: u32,
    pub abi_sequence: u32,
    pub act_digest: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub account_ram_deltas: Vec<RamDelta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_usage_us: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_usage_words: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_filtered: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signatures: Vec<String>,
}

/// A raw table-delta row before contract-schema decoding.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDeltaRow {
    pub present: bool,
    /// Record-type-encoded row bytes.
    pub data: Vec<u8>,
}

/// All rows of one record type within a block, as grouped by the node.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDeltaGroup {
    /// Record type name, e.g. `contract_row`, `account`, `resource_usage`.
    pub name: String,
    pub rows: Vec<RawDeltaRow>,
}

/// A decoded contract-table row document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeltaRow {
    #[serde(rename = "@timestamp")]
    pub timestamp: String,
    pub code: String,
    pub scope: String,
    pub table: String,
    pub primary_key: String,
    pub payer: String,
    pub present: bool,
    pub block_num: u64,
    pub block_id: String,
    /// Decoded row contents; `None` when every schema tier failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Raw row bytes as hex, kept when decoding failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Handler-reshaped sub-documents keyed `@table`.
    #[serde(flatten)]
    pub extras: serde_json::Map<String, Value>,
}

/// Light block summary document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LightBlock {
    #[serde(rename = "@timestamp")]
    pub timestamp: String,
    pub block_num: u64,
    pub block_id: String,
    pub prev_id: String,
    pub producer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_producers: Option<ProducerSchedule>,
    pub schedule_version: u32,
    pub cpu_usage: u64,
    pub net_usage: u64,
    pub trx_count: u64,
}

/// Producer schedule attached to blocks that rotate the producer set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerSchedule {
    pub version: u32,
    pub producers: Vec<ProducerKey>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerKey {
    pub producer_name: String,
    pub block_signing_key: String,
}

/// Per-transaction receipt inside the signed block header.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BlockTransaction {
    pub status: u8,
    pub cpu_usage_us: u32,
    pub net_usage_words: u32,
    pub trx_id: String,
    /// Packed root actions, used only by the root-only whitelist pre-scan.
    pub packed_actions: Vec<Act>,
}

/// Decoded signed-block header plus its transaction receipts.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SignedBlock {
    pub timestamp: String,
    pub producer: String,
    pub schedule_version: u32,
    pub new_producers: Option<ProducerSchedule>,
    pub transactions: Vec<BlockTransaction>,
}

/// Failed-transaction record (generic queue, `trx_error` type).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedTransaction {
    #[serde(rename = "@timestamp")]
    pub timestamp: String,
    pub block_num: u64,
    pub trx_id: String,
    pub status: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net: Option<u32>,
}

/// ABI-update record published to the abi queue and applied to the cache.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AbiUpdateRecord {
    #[serde(rename = "@timestamp")]
    pub timestamp: String,
    pub account: String,
    pub block: u64,
    /// Canonical JSON form of the ABI.
    pub abi: String,
    /// Hex-wrapped form, as fetched from the chain.
    pub abi_hex: String,
    pub actions: Vec<String>,
    pub tables: Vec<String>,
}

/// Removal-queue payload: the fields the delta updater needs to mark
/// superseded rows.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalNotice {
    pub code: String,
    pub table: String,
    pub scope: String,
    pub primary_key: String,
    pub block_num: u64,
}

/// Dynamic per-contract table-state document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DynamicTableDoc {
    #[serde(rename = "@timestamp")]
    pub timestamp: String,
    pub scope: String,
    pub primary_key: String,
    pub payer: String,
    pub block_num: u64,
    pub block_id: String,
    pub data: Option<Value>,
}
