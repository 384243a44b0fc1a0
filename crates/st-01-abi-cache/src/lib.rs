//! # ABI Cache Subsystem
//!
//! Resolves the contract schema that governs an action or table row at a
//! given block height. Decode workers ask this cache before every
//! schema-driven decode, so the lookup order is tuned for the common case
//! of a busy contract whose schema rarely changes:
//!
//! 1. **Hot cache** - per-worker LRU keyed by account, no validity-range
//!    check on hit. A stale hit surfaces as a decode failure downstream
//!    and degrades to hex, it never corrupts output silently.
//! 2. **Historical index** - versioned schemas in the search engine, with
//!    `valid_until` computed from the next stored version.
//! 3. **Head-block fetch** - current ABI straight from a chain node,
//!    cached with unbounded validity.
//! 4. **Negative cache** - contracts that failed all three tiers are
//!    blacklisted for the failing validity range so repeated misses stop
//!    paying for remote lookups.
//!
//! Resolution never fails the pipeline: every miss path reports a
//! diagnostic and returns not-found.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod cache;
pub mod ports;
pub mod testing;

pub use cache::{AbiCache, Resolution, ResolveSource, DEFAULT_HOT_CAPACITY};
pub use ports::{CacheError, ChainClient, DiagnosticSink, NullDiagnostics, SchemaIndex};
