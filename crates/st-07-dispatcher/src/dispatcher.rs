//! Per-category queue sets and the dispatch surface.

use serde_json::Value;
use shared_bus::{
    BusEvent, ControlPublisher, DeltaStreamHeaders, InMemoryControlBus, QueueMessage,
    ShardedQueueSet, TraceStreamHeaders,
};
use shared_types::config::{Scaling, Streaming};
use shared_types::entities::{
    AbiUpdateRecord, DeltaRow, DynamicTableDoc, FinalizedAction, LightBlock, RemovalNotice,
};
use shared_types::errors::IndexerError;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Consumer-side handles for every output queue, in shard order.
pub struct OutputReceivers {
    pub actions: Vec<mpsc::Receiver<QueueMessage>>,
    pub deltas: Vec<mpsc::Receiver<QueueMessage>>,
    pub generic: Vec<mpsc::Receiver<QueueMessage>>,
    pub dynamic: Vec<mpsc::Receiver<QueueMessage>>,
    pub blocks: Vec<mpsc::Receiver<QueueMessage>>,
    pub abi: Vec<mpsc::Receiver<QueueMessage>>,
    pub removals: Vec<mpsc::Receiver<QueueMessage>>,
}

/// The output side of the pipeline.
pub struct Dispatcher {
    actions: ShardedQueueSet,
    deltas: ShardedQueueSet,
    generic: ShardedQueueSet,
    dynamic: ShardedQueueSet,
    blocks: ShardedQueueSet,
    abi: ShardedQueueSet,
    removals: ShardedQueueSet,
    streaming: Streaming,
    stream_bus: Option<Arc<InMemoryControlBus>>,
}

impl Dispatcher {
    /// Build the queue sets for one chain. Queue names follow the
    /// `chain:category:N` convention.
    #[must_use]
    pub fn new(chain: &str, scaling: &Scaling, streaming: Streaming) -> (Self, OutputReceivers) {
        let set = |category: &str, shards: usize| {
            ShardedQueueSet::with_limits(
                format!("{chain}:{category}"),
                shards,
                shared_bus::DEFAULT_SHARD_CAPACITY,
                scaling.max_pending,
            )
        };
        let (actions, actions_rx) = set("index_actions", scaling.ad_idx_queues);
        let (deltas, deltas_rx) = set("index_deltas", scaling.ad_idx_queues);
        let (generic, generic_rx) = set("index_generic", scaling.indexing_queues);
        let (dynamic, dynamic_rx) = set("dynamic_rows", scaling.dyn_idx_queues);
        let (blocks, blocks_rx) = set("index_blocks", scaling.indexing_queues);
        // Schema updates and removals are order-sensitive: one queue each.
        let (abi, abi_rx) = set("index_abis", 1);
        let (removals, removals_rx) = set("delta_removals", 1);

        let dispatcher = Self {
            actions,
            deltas,
            generic,
            dynamic,
            blocks,
            abi,
            removals,
            streaming,
            stream_bus: None,
        };
        let receivers = OutputReceivers {
            actions: actions_rx,
            deltas: deltas_rx,
            generic: generic_rx,
            dynamic: dynamic_rx,
            blocks: blocks_rx,
            abi: abi_rx,
            removals: removals_rx,
        };
        (dispatcher, receivers)
    }

    /// Attach the live-stream bus. Without one, streaming stays off
    /// regardless of feature flags.
    #[must_use]
    pub fn with_stream_bus(mut self, bus: Arc<InMemoryControlBus>) -> Self {
        self.stream_bus = Some(bus);
        self
    }

    pub async fn dispatch_action(&self, action: &FinalizedAction) -> Result<(), IndexerError> {
        let payload = serde_json::to_value(action)?;
        self.actions.publish_next(QueueMessage::new(
            action.act.account.clone(),
            action.block_num,
            payload.clone(),
        ))?;

        if self.streaming.enable && self.streaming.traces {
            self.stream(BusEvent::TraceStream {
                headers: TraceStreamHeaders {
                    account: action.act.account.clone(),
                    name: action.act.name.clone(),
                    notified: action.notified.join(","),
                },
                payload,
            })
            .await;
        }
        Ok(())
    }

    pub async fn dispatch_delta(&self, row: &DeltaRow) -> Result<(), IndexerError> {
        let payload = serde_json::to_value(row)?;
        self.deltas.publish_next(QueueMessage::new(
            row.code.clone(),
            row.block_num,
            payload.clone(),
        ))?;

        if self.streaming.enable && self.streaming.deltas {
            self.stream(BusEvent::DeltaStream {
                headers: DeltaStreamHeaders {
                    code: row.code.clone(),
                    table: row.table.clone(),
                    scope: row.scope.clone(),
                    payer: row.payer.clone(),
                },
                payload,
            })
            .await;
        }
        Ok(())
    }

    /// Typed side documents (`permission`, `resource_usage`, `schedule`,
    /// ...), keyed by category.
    pub fn dispatch_generic(
        &self,
        category: &str,
        block_num: u64,
        doc: &Value,
    ) -> Result<(), IndexerError> {
        self.generic.publish_next(QueueMessage::new(
            category.to_string(),
            block_num,
            doc.clone(),
        ))?;
        Ok(())
    }

    pub fn dispatch_dynamic(
        &self,
        code: &str,
        table: &str,
        doc: &DynamicTableDoc,
    ) -> Result<(), IndexerError> {
        self.dynamic.publish_next(QueueMessage::new(
            format!("{code}:{table}"),
            doc.block_num,
            serde_json::to_value(doc)?,
        ))?;
        Ok(())
    }

    pub fn dispatch_block(&self, block: &LightBlock) -> Result<(), IndexerError> {
        self.blocks.publish_next(QueueMessage::new(
            block.producer.clone(),
            block.block_num,
            serde_json::to_value(block)?,
        ))?;
        Ok(())
    }

    pub fn dispatch_abi(&self, record: &AbiUpdateRecord) -> Result<(), IndexerError> {
        self.abi.publish_to(
            1,
            QueueMessage::new(
                record.account.clone(),
                record.block,
                serde_json::to_value(record)?,
            ),
        )
    }

    pub fn dispatch_removal(&self, notice: &RemovalNotice) -> Result<(), IndexerError> {
        self.removals.publish_to(
            1,
            QueueMessage::new(
                notice.code.clone(),
                notice.block_num,
                serde_json::to_value(notice)?,
            ),
        )
    }

    async fn stream(&self, event: BusEvent) {
        let Some(bus) = &self.stream_bus else {
            return;
        };
        // Zero receivers just means nobody is watching the live feed.
        let delivered = bus.publish(event).await;
        debug!(delivered, "streamed event");
    }

    /// Whether any category is holding messages for a stalled consumer.
    #[must_use]
    pub fn is_stalled(&self) -> bool {
        self.sets().iter().any(|s| s.is_stalled())
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.sets().iter().map(|s| s.pending_len()).sum()
    }

    /// Flush every category's pending list. Returns the total number of
    /// re-published messages.
    pub async fn flush_pending(&self) -> Result<usize, IndexerError> {
        let mut flushed = 0;
        for set in self.sets() {
            flushed += set.flush_pending().await?;
        }
        Ok(flushed)
    }

    fn sets(&self) -> [&ShardedQueueSet; 7] {
        [
            &self.actions,
            &self.deltas,
            &self.generic,
            &self.dynamic,
            &self.blocks,
            &self.abi,
            &self.removals,
        ]
    }
}
