//! # Sharded Document Queues
//!
//! A [`ShardedQueueSet`] is a fixed fan of bounded channels feeding one
//! consumer each. Producers either name a shard explicitly (affinity
//! routing) or take the next one off a rotating cursor. Shard indices are
//! one-based: the cursor runs `1, 2, .., n, 1, ..` so queue names compose
//! as `label:1` through `label:n`.
//!
//! ## Backpressure
//!
//! `try_send` is the only path onto a shard. When a shard is full the
//! message goes to a FIFO pending buffer and the set flips to stalled;
//! the owning stage must stop producing, await [`ShardedQueueSet::drain`],
//! and resume once the buffer has been flushed in order. A pending buffer
//! at its ceiling is a hard error surfaced to the caller.

use serde_json::Value;
use shared_types::IndexerError;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio::sync::Notify;
use tracing::{debug, trace, warn};

use crate::{DEFAULT_MAX_PENDING, DEFAULT_SHARD_CAPACITY};

/// One document plus the routing facts its consumer indexes by.
#[derive(Clone, Debug, PartialEq)]
pub struct QueueMessage {
    /// Full queue name, e.g. `local::index_actions:2`.
    pub routing_key: String,
    /// Block the document came from. Zero for non-block payloads.
    pub block_num: u64,
    pub payload: Value,
}

impl QueueMessage {
    #[must_use]
    pub fn new(routing_key: impl Into<String>, block_num: u64, payload: Value) -> Self {
        Self {
            routing_key: routing_key.into(),
            block_num,
            payload,
        }
    }
}

struct PendingEntry {
    shard: usize,
    message: QueueMessage,
}

/// A label-scoped fan of bounded queues with a rotating cursor.
pub struct ShardedQueueSet {
    label: String,
    shards: Vec<mpsc::Sender<QueueMessage>>,
    /// Next shard the cursor will hand out, one-based.
    cursor: AtomicUsize,
    pending: Mutex<VecDeque<PendingEntry>>,
    stalled: AtomicBool,
    drained: Notify,
    max_pending: usize,
}

impl ShardedQueueSet {
    /// Build a set of `shard_count` queues. Returns the set plus one
    /// receiver per shard, in shard order (index 0 is shard 1).
    #[must_use]
    pub fn new(
        label: impl Into<String>,
        shard_count: usize,
    ) -> (Self, Vec<mpsc::Receiver<QueueMessage>>) {
        Self::with_limits(label, shard_count, DEFAULT_SHARD_CAPACITY, DEFAULT_MAX_PENDING)
    }

    /// Build a set with explicit per-shard and pending-buffer depths.
    #[must_use]
    pub fn with_limits(
        label: impl Into<String>,
        shard_count: usize,
        shard_capacity: usize,
        max_pending: usize,
    ) -> (Self, Vec<mpsc::Receiver<QueueMessage>>) {
        let shard_count = shard_count.max(1);
        let mut shards = Vec::with_capacity(shard_count);
        let mut receivers = Vec::with_capacity(shard_count);
        for _ in 0..shard_count {
            let (tx, rx) = mpsc::channel(shard_capacity.max(1));
            shards.push(tx);
            receivers.push(rx);
        }

        let set = Self {
            label: label.into(),
            shards,
            cursor: AtomicUsize::new(1),
            pending: Mutex::new(VecDeque::new()),
            stalled: AtomicBool::new(false),
            drained: Notify::new(),
            max_pending,
        };
        (set, receivers)
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Queue name for a one-based shard index.
    #[must_use]
    pub fn queue_name(&self, shard: usize) -> String {
        format!("{}:{shard}", self.label)
    }

    /// Advance the cursor and return the shard it handed out (one-based).
    /// Wraps back to 1 past the last shard.
    fn advance_cursor(&self) -> usize {
        let n = self.shards.len();
        let mut current = self.cursor.load(Ordering::Relaxed);
        loop {
            let next = if current >= n { 1 } else { current + 1 };
            match self.cursor.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return current,
                Err(observed) => current = observed,
            }
        }
    }

    /// Whether overflow has forced the set into the stalled state.
    #[must_use]
    pub fn is_stalled(&self) -> bool {
        self.stalled.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        match self.pending.lock() {
            Ok(queue) => queue.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Publish to the next shard on the rotating cursor. Returns the
    /// one-based shard the message was routed to (or buffered for).
    pub fn publish_next(&self, message: QueueMessage) -> Result<usize, IndexerError> {
        let shard = self.advance_cursor();
        self.publish_to(shard, message)?;
        Ok(shard)
    }

    /// Publish to an explicit one-based shard.
    pub fn publish_to(&self, shard: usize, message: QueueMessage) -> Result<(), IndexerError> {
        let Some(sender) = self.shards.get(shard.wrapping_sub(1)) else {
            return Err(IndexerError::MalformedRouting(format!(
                "shard {shard} out of range for {} ({} shards)",
                self.label,
                self.shards.len()
            )));
        };

        // Ordering: once anything is pending, everything must go through
        // the pending buffer or FIFO order on the shard breaks.
        if self.is_stalled() {
            return self.buffer(shard, message);
        }

        match sender.try_send(message) {
            Ok(()) => {
                trace!(queue = %self.queue_name(shard), "document queued");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(message)) => {
                self.stalled.store(true, Ordering::Release);
                debug!(queue = %self.queue_name(shard), "shard full, buffering");
                self.buffer(shard, message)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(IndexerError::PublishStalled {
                queue: self.queue_name(shard),
            }),
        }
    }

    fn buffer(&self, shard: usize, message: QueueMessage) -> Result<(), IndexerError> {
        let mut queue = match self.pending.lock() {
            Ok(queue) => queue,
            Err(poisoned) => poisoned.into_inner(),
        };
        if queue.len() >= self.max_pending {
            warn!(
                label = %self.label,
                pending = queue.len(),
                "pending buffer exhausted"
            );
            return Err(IndexerError::PublishStalled {
                queue: self.queue_name(shard),
            });
        }
        queue.push_back(PendingEntry { shard, message });
        Ok(())
    }

    /// Flush the pending buffer in FIFO order, waiting for shard capacity
    /// as needed. Clears the stalled flag and fires the drain signal.
    /// Returns the number of messages flushed.
    pub async fn flush_pending(&self) -> Result<usize, IndexerError> {
        let mut flushed = 0;
        loop {
            let entry = {
                let mut queue = match self.pending.lock() {
                    Ok(queue) => queue,
                    Err(poisoned) => poisoned.into_inner(),
                };
                queue.pop_front()
            };
            let Some(PendingEntry { shard, message }) = entry else {
                break;
            };
            let Some(sender) = self.shards.get(shard - 1) else {
                continue;
            };
            if sender.send(message).await.is_err() {
                return Err(IndexerError::PublishStalled {
                    queue: self.queue_name(shard),
                });
            }
            flushed += 1;
        }

        if flushed > 0 {
            debug!(label = %self.label, flushed, "pending buffer drained");
        }
        self.stalled.store(false, Ordering::Release);
        self.drained.notify_waiters();
        Ok(flushed)
    }

    /// Wait until the next drain completes. Returns immediately if the
    /// set is not stalled.
    pub async fn drain(&self) {
        if !self.is_stalled() {
            return;
        }
        let notified = self.drained.notified();
        if !self.is_stalled() {
            return;
        }
        notified.await;
    }
}
