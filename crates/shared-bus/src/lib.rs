//! # Shared Bus - Queues and Control Channel Between Indexer Stages
//!
//! Two transport shapes live here, matching the two kinds of traffic the
//! pipeline produces:
//!
//! - **Sharded document queues** ([`ShardedQueueSet`]): bounded,
//!   single-consumer-per-shard channels carrying decoded documents toward
//!   the storage writers. Producers never block on a full shard; overflow
//!   lands in a FIFO pending buffer and the producer pauses until a drain
//!   signal fires.
//! - **Broadcast control channel** ([`InMemoryControlBus`]): fan-out of
//!   schema updates, decode diagnostics and live-stream payloads to any
//!   interested stage. Delivery is best effort; a lagging subscriber loses
//!   events rather than stalling the pipeline.
//!
//! ## Ordering
//!
//! Within one shard, messages arrive in publish order. Across shards no
//! order is promised; consumers that need block ordering must sort on
//! `block_num`.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod sharded;
pub mod subscriber;

// Re-export main types
pub use events::{BusEvent, BusTopic, DeltaStreamHeaders, EventFilter, TraceStreamHeaders};
pub use publisher::{ControlPublisher, InMemoryControlBus};
pub use sharded::{QueueMessage, ShardedQueueSet};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events to buffer per control-channel subscriber before lag.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Per-shard document queue depth.
pub const DEFAULT_SHARD_CAPACITY: usize = 512;

/// Pending-buffer ceiling before producers must stop outright.
pub const DEFAULT_MAX_PENDING: usize = 4096;
