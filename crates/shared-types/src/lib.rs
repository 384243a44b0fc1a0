//! # Shared Types Crate
//!
//! This crate contains all domain entities, queue payloads, configuration
//! structures and the state-history binary codec shared across the pipeline
//! subsystems.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: all cross-subsystem types are defined here.
//! - **Degradable Decoding**: payloads that cannot be decoded are carried as
//!   hex strings, never dropped; the entities model both forms explicitly.
//! - **No Transport Assumptions**: queue payloads are plain serde structs;
//!   the broker abstraction lives in `shared-bus`.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod codec;
pub mod config;
pub mod entities;
pub mod errors;
pub mod filters;
pub mod ipc;
pub mod schema;

pub use codec::{ByteReader, ByteWriter, CodecError};
pub use config::IndexerConfig;
pub use entities::*;
pub use errors::IndexerError;
pub use filters::FilterSet;
pub use ipc::{ControlEvent, DsError, DsErrorKind};
pub use schema::{AbiDefinition, SchemaKind};

/// Supported state-history protocol releases.
///
/// Selected once at startup from `settings.parser_version`; all versions
/// share the same downstream output shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ProtocolVersion {
    /// Earliest supported release: nested inline traces, zlib buffers.
    #[serde(rename = "v0")]
    V0,
    /// Flat trace lists, zlib buffers.
    #[serde(rename = "v1")]
    V1,
    /// Flat trace lists, uncompressed buffers, prunable signature data.
    #[serde(rename = "v2")]
    V2,
}

impl ProtocolVersion {
    /// Parse from the configuration string form.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "v0" => Some(Self::V0),
            "v1" => Some(Self::V1),
            "v2" => Some(Self::V2),
            _ => None,
        }
    }
}
