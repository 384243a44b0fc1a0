//! # Action Decoder Subsystem
//!
//! Turns the opaque hex payload of an action into structured JSON using
//! the schema the ABI cache resolves for the action's block height.
//!
//! Decoding is degradable by contract: when no schema resolves, or the
//! payload does not parse under the resolved type, the action keeps its
//! raw payload as lowercase hex and the pipeline moves on. A decode
//! mismatch raises exactly one diagnostic for the affected action; a
//! schema miss is diagnosed by the cache's negative-cache registration
//! instead, so a dead contract does not flood the control channel.
//!
//! Successfully decoded payloads pass through the enrichment registry,
//! an ordered set of hooks keyed `contract::action` (exact) or
//! `contract::*` (wildcard) that may rewrite the decoded value. The
//! system `onblock` action bypasses enrichment.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod decoder;
pub mod enrich;

pub use decoder::{ActionDecoder, DecodeOutcome};
pub use enrich::{ActionEnricher, EnricherRegistry};
