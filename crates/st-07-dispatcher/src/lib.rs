//! # Output Dispatcher Subsystem
//!
//! Fans the pipeline's finished documents out to the sharded index
//! queues. Each category (actions, deltas, generic documents, dynamic
//! table rows, block summaries) rotates its own 1-based cursor over N
//! shards; schema updates and removals each ride a single fixed queue.
//!
//! Publishing obeys the same try-send, pending-list, drain-signal
//! contract as the work router. Live streaming onto the control bus is
//! a best-effort side channel and can neither block nor fail a
//! dispatch.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod dispatcher;

pub use dispatcher::{Dispatcher, OutputReceivers};
