//! # Delta Processor Subsystem
//!
//! Turns the node's per-block table-delta groups into indexable
//! documents. Each group carries every row of one native record type
//! (`contract_row`, `account`, `permission`, ...); contract rows decode
//! twice, first with the native record layout to recover code/scope/
//! table/key, then with the owning contract's schema to recover the row
//! contents.
//!
//! Decoded contract rows pass through an ordered handler registry keyed
//! `code:table`, `code:*` or `*:table`; every matching handler runs, and
//! a handler failure is logged and skipped. Unmatched rows are only
//! forwarded when the index-all-deltas policy is on.
//!
//! Two outputs are special:
//! - Row deletions (`present == false`) go to the removal channel only,
//!   never to the delta queues.
//! - An `account` delta carrying contract code is the path by which
//!   contract upgrades propagate: it loads the new schema into the ABI
//!   cache before any of the same block's actions decode.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod handlers;
pub mod processor;
pub mod rows;
pub mod testing;

pub use handlers::{HandlerError, HandlerRegistry, TableHandler};
pub use processor::{BlockContext, DeltaBatch, DeltaProcessor, DynamicRow};
