//! # Trace Reshaper Subsystem
//!
//! Takes the node's raw trace and delta buffers and normalizes them into
//! the one shape the rest of the pipeline understands, across three
//! protocol releases:
//!
//! | Version | Trace layout | Compression | Signatures |
//! |---------|--------------|-------------|------------|
//! | v0      | nested inline trees | zlib | always present |
//! | v1      | flat, ordinals pre-assigned | zlib | always present |
//! | v2      | flat | none | may be pruned |
//!
//! One [`parser::ProtocolParser`] implementation exists per release,
//! selected from configuration at startup. Logic common to all releases
//! (binary record layouts, the flattener, deduplication) lives in shared
//! modules rather than on the implementations.
//!
//! Flattening assigns depth-first ordinals and then re-sorts by global
//! sequence; the flat releases skip both steps because the node already
//! emits traces in sequence order.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod dedup;
pub mod flatten;
pub mod parser;
pub mod testing;
pub mod wire;

pub use dedup::deduplicate;
pub use flatten::flatten_nested;
pub use parser::{parser_for, ProtocolParser, V0Parser, V1Parser, V2Parser};
