//! # Work Router Subsystem
//!
//! Assigns each transaction to one decoder worker queue. The routing
//! contract is derived from the transaction's first real action; a
//! `<system>.null::nonce` placeholder up front is skipped.
//!
//! Two interchangeable strategies pick the worker:
//! - round robin over the whole pool, wrapping to 1, and
//! - contract affinity ("heatmap"), which keeps a hot contract's
//!   transactions on a small externally-supplied set of workers for
//!   cache locality, advancing ascending within that set.
//!
//! Filtering runs before routing: the action blacklist applies to the
//! first action only, and when a whitelist is configured the flat
//! action list is scanned (optionally depth-bounded) for any match.
//! Rejected transactions are dropped silently.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod heatmap;
pub mod router;

pub use heatmap::Heatmap;
pub use router::{RouteOutcome, WorkRouter};
