//! One parser per protocol release, behind a common trait.

use crate::flatten::flatten_nested;
use crate::wire::{self, TraceLayout};
use flate2::read::ZlibDecoder;
use shared_types::entities::{ActionTrace, SignedBlock, TableDeltaGroup, TransactionTrace};
use shared_types::{IndexerError, ProtocolVersion};
use std::io::Read;
use std::sync::Arc;

/// Decodes the node's raw section buffers for one protocol release.
///
/// Implementations are stateless; one instance is selected from
/// configuration at startup and shared by every intake task.
pub trait ProtocolParser: Send + Sync {
    fn version(&self) -> ProtocolVersion;

    /// Whether traces arrive as nested inline trees that need the
    /// recursive flattener.
    fn flatten_required(&self) -> bool;

    fn parse_block(&self, buf: &[u8], block_num: u64) -> Result<SignedBlock, IndexerError>;

    fn parse_traces(
        &self,
        buf: &[u8],
        block_num: u64,
    ) -> Result<Vec<TransactionTrace>, IndexerError>;

    fn parse_deltas(
        &self,
        buf: &[u8],
        block_num: u64,
    ) -> Result<Vec<TableDeltaGroup>, IndexerError>;

    /// Normalize one transaction's action traces into flat, ordinal-
    /// stamped, sequence-ordered form. The flat releases return their
    /// input unchanged: the node already emits traces in global-sequence
    /// order, so re-sorting is only needed after recursive traversal.
    fn flatten(&self, traces: Vec<ActionTrace>) -> Vec<ActionTrace> {
        traces
    }
}

/// The configured parser instance.
#[must_use]
pub fn parser_for(version: ProtocolVersion) -> Arc<dyn ProtocolParser> {
    match version {
        ProtocolVersion::V0 => Arc::new(V0Parser),
        ProtocolVersion::V1 => Arc::new(V1Parser),
        ProtocolVersion::V2 => Arc::new(V2Parser),
    }
}

fn inflate(section: &'static str, buf: &[u8]) -> Result<Vec<u8>, IndexerError> {
    let mut out = Vec::new();
    ZlibDecoder::new(buf)
        .read_to_end(&mut out)
        .map_err(|e| IndexerError::Decompression {
            section,
            reason: e.to_string(),
        })?;
    Ok(out)
}

fn protocol_err(block_num: u64) -> impl FnOnce(shared_types::codec::CodecError) -> IndexerError {
    move |source| IndexerError::ProtocolDecode { block_num, source }
}

/// Earliest release: nested inline trees, zlib-compressed sections.
pub struct V0Parser;

impl ProtocolParser for V0Parser {
    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::V0
    }

    fn flatten_required(&self) -> bool {
        true
    }

    fn parse_block(&self, buf: &[u8], block_num: u64) -> Result<SignedBlock, IndexerError> {
        let raw = inflate("block", buf)?;
        wire::read_signed_block(&raw).map_err(protocol_err(block_num))
    }

    fn parse_traces(
        &self,
        buf: &[u8],
        block_num: u64,
    ) -> Result<Vec<TransactionTrace>, IndexerError> {
        let raw = inflate("traces", buf)?;
        wire::read_trace_list(&raw, TraceLayout::Nested).map_err(protocol_err(block_num))
    }

    fn parse_deltas(
        &self,
        buf: &[u8],
        block_num: u64,
    ) -> Result<Vec<TableDeltaGroup>, IndexerError> {
        let raw = inflate("deltas", buf)?;
        wire::read_delta_groups(&raw).map_err(protocol_err(block_num))
    }

    fn flatten(&self, traces: Vec<ActionTrace>) -> Vec<ActionTrace> {
        flatten_nested(traces)
    }
}

/// Flat traces with pre-assigned ordinals, zlib-compressed sections.
pub struct V1Parser;

impl ProtocolParser for V1Parser {
    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::V1
    }

    fn flatten_required(&self) -> bool {
        false
    }

    fn parse_block(&self, buf: &[u8], block_num: u64) -> Result<SignedBlock, IndexerError> {
        let raw = inflate("block", buf)?;
        wire::read_signed_block(&raw).map_err(protocol_err(block_num))
    }

    fn parse_traces(
        &self,
        buf: &[u8],
        block_num: u64,
    ) -> Result<Vec<TransactionTrace>, IndexerError> {
        let raw = inflate("traces", buf)?;
        wire::read_trace_list(&raw, TraceLayout::Flat).map_err(protocol_err(block_num))
    }

    fn parse_deltas(
        &self,
        buf: &[u8],
        block_num: u64,
    ) -> Result<Vec<TableDeltaGroup>, IndexerError> {
        let raw = inflate("deltas", buf)?;
        wire::read_delta_groups(&raw).map_err(protocol_err(block_num))
    }
}

/// Current release: uncompressed sections, signature lists may be pruned.
pub struct V2Parser;

impl ProtocolParser for V2Parser {
    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::V2
    }

    fn flatten_required(&self) -> bool {
        false
    }

    fn parse_block(&self, buf: &[u8], block_num: u64) -> Result<SignedBlock, IndexerError> {
        wire::read_signed_block(buf).map_err(protocol_err(block_num))
    }

    fn parse_traces(
        &self,
        buf: &[u8],
        block_num: u64,
    ) -> Result<Vec<TransactionTrace>, IndexerError> {
        wire::read_trace_list(buf, TraceLayout::FlatPruned).map_err(protocol_err(block_num))
    }

    fn parse_deltas(
        &self,
        buf: &[u8],
        block_num: u64,
    ) -> Result<Vec<TableDeltaGroup>, IndexerError> {
        wire::read_delta_groups(buf).map_err(protocol_err(block_num))
    }
}
