//! Decoder worker: consumes routed transactions, decodes and finalizes
//! their actions, dispatches the results.

use shared_bus::{InMemoryControlBus, QueueMessage};
use shared_types::entities::{ProcessedAction, RoutedTransaction};
use shared_types::errors::IndexerError;
use shared_types::ipc::ControlEvent;
use st_01_abi_cache::{AbiCache, ChainClient, DiagnosticSink, SchemaIndex};
use st_02_action_decoder::ActionDecoder;
use st_03_trace_reshaper::deduplicate;
use st_07_dispatcher::Dispatcher;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// One member of the decoder pool. Owns its schema cache; peers pay
/// their own resolution costs rather than coordinate.
pub struct DecoderWorker<I, C, D> {
    cache: Arc<AbiCache<I, C, D>>,
    decoder: ActionDecoder<I, C, D>,
    dispatcher: Arc<Dispatcher>,
    bus: Arc<InMemoryControlBus>,
    system_contract: String,
    actions_decoded: AtomicU64,
}

impl<I, C, D> DecoderWorker<I, C, D>
where
    I: SchemaIndex,
    C: ChainClient,
    D: DiagnosticSink,
{
    pub fn new(
        cache: Arc<AbiCache<I, C, D>>,
        decoder: ActionDecoder<I, C, D>,
        dispatcher: Arc<Dispatcher>,
        bus: Arc<InMemoryControlBus>,
        system_contract: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            decoder,
            dispatcher,
            bus,
            system_contract: system_contract.into(),
            actions_decoded: AtomicU64::new(0),
        }
    }

    /// Consume the worker's queue until it closes. A malformed message
    /// is dropped with a warning; queue-publish backpressure errors
    /// propagate.
    pub async fn run(
        &self,
        mut queue: mpsc::Receiver<QueueMessage>,
    ) -> Result<(), IndexerError> {
        while let Some(message) = queue.recv().await {
            let routed: RoutedTransaction = match serde_json::from_value(message.payload) {
                Ok(routed) => routed,
                Err(e) => {
                    warn!(block_num = message.block_num, error = %e, "malformed routed transaction, dropping");
                    continue;
                }
            };
            self.process(routed).await?;
        }
        self.publish_report().await;
        info!(
            actions = self.actions_decoded.load(Ordering::Relaxed),
            "decoder worker queue closed"
        );
        Ok(())
    }

    /// Decode one routed transaction end to end: merge headers, decode
    /// payloads, deduplicate receipts, dispatch.
    pub async fn process(&self, routed: RoutedTransaction) -> Result<u64, IndexerError> {
        let headers = routed.headers;
        let mut actions = Vec::with_capacity(routed.trace.action_traces.len());
        for trace in routed.trace.action_traces {
            // Traces without a receipt never executed; nothing to index.
            let (Some(receipt), Some(act)) = (trace.receipt, trace.act) else {
                continue;
            };
            let first = actions.is_empty();
            actions.push(ProcessedAction {
                timestamp: headers.ts.clone(),
                block_num: headers.block_num,
                block_id: headers.block_id.clone(),
                producer: headers.producer.clone(),
                trx_id: headers.trx_id.clone(),
                action_ordinal: trace.action_ordinal,
                creator_action_ordinal: trace.creator_action_ordinal,
                global_sequence: receipt.global_sequence,
                act,
                receipt,
                account_ram_deltas: trace.account_ram_deltas,
                cpu_usage_us: first.then_some(headers.cpu_usage_us),
                net_usage_words: first.then_some(headers.net_usage_words),
                inline_count: first.then_some(headers.inline_count),
                inline_filtered: first.then_some(headers.filtered),
                signatures: if first {
                    headers.signatures.clone()
                } else {
                    Vec::new()
                },
            });
        }

        for action in &mut actions {
            self.decoder
                .decode(&mut action.act, action.global_sequence, action.block_num)
                .await;
        }

        let finalized = deduplicate(actions, &self.system_contract);
        let count = finalized.len() as u64;
        for action in &finalized {
            self.dispatcher.dispatch_action(action).await?;
        }
        self.actions_decoded.fetch_add(count, Ordering::Relaxed);
        Ok(count)
    }

    /// Apply a control-channel event to this worker's cache.
    pub fn handle_control(&self, event: &ControlEvent) {
        match event {
            ControlEvent::UpdateSchema(record) => {
                if let Err(e) = self.cache.load_record(record) {
                    warn!(account = %record.account, error = %e, "schema update rejected");
                }
            }
            ControlEvent::RemoveContract { contract } => {
                debug!(contract = %contract, "evicting contract schema");
                self.cache.evict(contract);
            }
            _ => {}
        }
    }

    #[must_use]
    pub fn actions_decoded(&self) -> u64 {
        self.actions_decoded.load(Ordering::Relaxed)
    }

    /// Publish a throughput report on the control channel.
    pub async fn publish_report(&self) {
        let actions = self.actions_decoded.load(Ordering::Relaxed);
        let _ = self
            .bus
            .publish_control(ControlEvent::DsReport { actions, deltas: 0 })
            .await;
    }
}
