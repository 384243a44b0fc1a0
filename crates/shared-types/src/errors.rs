//! Pipeline-wide error taxonomy.
//!
//! The split that matters operationally is fatal versus degradable.
//! A fatal error means the block payload itself cannot be trusted and
//! the containing message must be negatively acknowledged for redelivery.
//! A degradable error affects one action or one delta row; the pipeline
//! forwards the raw hex and reports a [`crate::ipc::DsError`] instead of
//! halting.

use crate::codec::CodecError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexerError {
    /// The block/trace/delta envelope failed structural decode. Fatal:
    /// nothing downstream of this message can be salvaged.
    #[error("protocol decode failed at block {block_num}: {source}")]
    ProtocolDecode {
        block_num: u64,
        #[source]
        source: CodecError,
    },

    /// An inflate pass over a compressed section failed. Fatal.
    #[error("decompression failed for {section}: {reason}")]
    Decompression { section: &'static str, reason: String },

    /// No usable schema for a contract at a given block. Degradable.
    #[error("no schema for {contract} at block {block_num}")]
    SchemaResolution { contract: String, block_num: u64 },

    /// A table or action handler rejected its input. Degradable.
    #[error("handler for {target} failed: {reason}")]
    HandlerFailed { target: String, reason: String },

    /// A routed payload did not match the shape its queue promises.
    #[error("malformed routed payload: {0}")]
    MalformedRouting(String),

    /// All destination shards are saturated and the pending buffer is
    /// full. The producer must pause until a drain signal fires.
    #[error("output stalled: {queue} pending buffer exhausted")]
    PublishStalled { queue: String },

    /// The control channel to the supervisor is gone.
    #[error("control channel closed")]
    ControlChannelClosed,

    /// Configuration rejected at load time.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl IndexerError {
    /// Whether the containing message must be redelivered.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ProtocolDecode { .. }
                | Self::Decompression { .. }
                | Self::ControlChannelClosed
                | Self::InvalidConfig(_)
        )
    }
}
