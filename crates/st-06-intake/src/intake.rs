//! The per-block intake state machine.

use shared_bus::InMemoryControlBus;
use shared_types::config::{Features, IndexerConfig, IndexerSwitches};
use shared_types::entities::{
    trx_status, FailedTransaction, LightBlock, RawBlockEnvelope, RoutedTransaction, SignedBlock,
    TransactionTrace, TrxMetadata,
};
use shared_types::errors::IndexerError;
use shared_types::filters::FilterSet;
use shared_types::ipc::ControlEvent;
use st_01_abi_cache::{ChainClient, DiagnosticSink, SchemaIndex};
use st_03_trace_reshaper::ProtocolParser;
use st_04_delta_processor::{BlockContext, DeltaProcessor};
use st_05_work_router::WorkRouter;
use st_07_dispatcher::Dispatcher;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Broker acknowledgement for one envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AckOutcome {
    Ack,
    /// Reject and requeue.
    Nack,
}

/// One inbound envelope plus its acknowledgement channel.
pub struct IntakeMessage {
    pub envelope: RawBlockEnvelope,
    pub reply: oneshot::Sender<AckOutcome>,
}

impl IntakeMessage {
    #[must_use]
    pub fn new(envelope: RawBlockEnvelope) -> (Self, oneshot::Receiver<AckOutcome>) {
        let (reply, rx) = oneshot::channel();
        (Self { envelope, reply }, rx)
    }
}

/// Consumes state-history envelopes and drives the per-block pipeline.
pub struct IntakeLoop<I, C, D> {
    parser: Arc<dyn ProtocolParser>,
    deltas: DeltaProcessor<I, C, D>,
    router: WorkRouter,
    dispatcher: Arc<Dispatcher>,
    bus: Arc<InMemoryControlBus>,
    filters: FilterSet,
    switches: IndexerSwitches,
    features: Features,
    root_only: bool,
    deltas_processed: AtomicU64,
}

impl<I, C, D> IntakeLoop<I, C, D>
where
    I: SchemaIndex,
    C: ChainClient,
    D: DiagnosticSink,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        parser: Arc<dyn ProtocolParser>,
        deltas: DeltaProcessor<I, C, D>,
        router: WorkRouter,
        dispatcher: Arc<Dispatcher>,
        bus: Arc<InMemoryControlBus>,
        config: &IndexerConfig,
    ) -> Self {
        Self {
            parser,
            deltas,
            router,
            dispatcher,
            bus,
            filters: FilterSet::from_config(config),
            switches: config.indexer.clone(),
            features: config.features.clone(),
            root_only: config.whitelists.root_only,
            deltas_processed: AtomicU64::new(0),
        }
    }

    /// Run until the inbox closes or a fatal protocol error occurs.
    /// Every message is answered: ack on success or skip, nack on any
    /// error. A fatal error terminates the loop after the nack.
    pub async fn run(
        &self,
        mut inbox: mpsc::Receiver<IntakeMessage>,
    ) -> Result<(), IndexerError> {
        while let Some(IntakeMessage { envelope, reply }) = inbox.recv().await {
            match self.process_block(envelope).await {
                Ok(()) => {
                    let _ = reply.send(AckOutcome::Ack);
                }
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "fatal intake failure, terminating");
                    let _ = reply.send(AckOutcome::Nack);
                    return Err(e);
                }
                Err(e) => {
                    warn!(error = %e, "block pipeline failed, rejecting message");
                    let _ = reply.send(AckOutcome::Nack);
                }
            }
        }
        info!("intake inbox closed");
        Ok(())
    }

    /// One full `ParseEnvelope → ProcessDeltas → ProcessTraces →
    /// Dispatch` pass.
    pub async fn process_block(&self, envelope: RawBlockEnvelope) -> Result<(), IndexerError> {
        let Some(position) = &envelope.this_block else {
            warn!("envelope without this_block, skipping");
            return Ok(());
        };
        let block_num = position.block_num;
        let block_id = position.block_id.clone();
        let lib = envelope
            .last_irreversible
            .as_ref()
            .map_or(0, |p| p.block_num);
        let live = self.switches.live_mode
            && envelope
                .head
                .as_ref()
                .is_some_and(|head| head.block_num <= block_num + 1);

        let signed = match (&envelope.block, self.switches.fetch_block) {
            (Some(buf), true) => Some(self.parser.parse_block(buf, block_num)?),
            _ => None,
        };
        let timestamp = signed
            .as_ref()
            .map(|b| b.timestamp.clone())
            .unwrap_or_default();

        // The pre-scan can veto trace decoding, never delta processing:
        // schema updates inside a skipped block must still reach the cache.
        let skip_traces = self.skip_by_root_scan(signed.as_ref());
        if skip_traces {
            debug!(block_num, "no whitelisted root action, skipping traces");
        }

        if self.switches.process_deltas {
            if let Some(buf) = &envelope.deltas {
                self.process_deltas(buf, block_num, &block_id, &timestamp)
                    .await?;
            }
        }

        let mut trx_ids = Vec::new();
        if self.switches.fetch_traces && !skip_traces {
            if let Some(buf) = &envelope.traces {
                trx_ids = self
                    .process_traces(buf, block_num, &block_id, &timestamp, signed.as_ref(), live)
                    .await?;
            }
        }

        if let Some(block) = signed {
            self.dispatch_block(block, block_num, &block_id, &envelope)
                .await?;
        }

        let _ = self
            .bus
            .publish_control(ControlEvent::ConsumedBlock {
                block_num,
                block_id,
                trx_ids,
                lib,
                live,
            })
            .await;

        if self.router.is_stalled() {
            self.router.flush_pending().await?;
        }
        if self.dispatcher.is_stalled() {
            self.dispatcher.flush_pending().await?;
        }
        Ok(())
    }

    /// Root-only whitelist pre-scan over the block header's packed
    /// transactions.
    fn skip_by_root_scan(&self, signed: Option<&SignedBlock>) -> bool {
        if !self.root_only || !self.filters.has_action_whitelist() {
            return false;
        }
        let Some(block) = signed else {
            return false;
        };
        !block
            .transactions
            .iter()
            .flat_map(|t| &t.packed_actions)
            .any(|act| self.filters.action_whitelisted(act))
    }

    async fn process_deltas(
        &self,
        buf: &[u8],
        block_num: u64,
        block_id: &str,
        timestamp: &str,
    ) -> Result<(), IndexerError> {
        let groups = self.parser.parse_deltas(buf, block_num)?;
        let ctx = BlockContext {
            block_num,
            block_id: block_id.to_string(),
            timestamp: timestamp.to_string(),
        };
        let batch = self.deltas.process(&groups, &ctx).await;

        for record in &batch.abi_updates {
            self.dispatcher.dispatch_abi(record)?;
            let _ = self
                .bus
                .publish_control(ControlEvent::UpdateSchema(record.clone()))
                .await;
        }
        for notice in &batch.removals {
            self.dispatcher.dispatch_removal(notice)?;
        }
        for row in &batch.rows {
            self.dispatcher.dispatch_delta(row).await?;
        }
        for (category, doc) in &batch.generic {
            self.dispatcher.dispatch_generic(category, block_num, doc)?;
        }
        for dynamic in &batch.dynamic {
            self.dispatcher
                .dispatch_dynamic(&dynamic.code, &dynamic.table, &dynamic.doc)?;
        }
        self.deltas_processed
            .fetch_add(batch.rows.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    async fn process_traces(
        &self,
        buf: &[u8],
        block_num: u64,
        block_id: &str,
        timestamp: &str,
        signed: Option<&SignedBlock>,
        live: bool,
    ) -> Result<Vec<String>, IndexerError> {
        let traces = self.parser.parse_traces(buf, block_num)?;
        let mut trx_ids = Vec::with_capacity(traces.len());

        for trx in traces {
            if matches!(
                trx.status,
                trx_status::SOFT_FAIL | trx_status::HARD_FAIL | trx_status::EXPIRED
            ) {
                if self.features.failed_trx {
                    let doc = FailedTransaction {
                        timestamp: timestamp.to_string(),
                        block_num,
                        trx_id: trx.id.clone(),
                        status: trx.status,
                        cpu: Some(trx.cpu_usage_us),
                        net: Some(trx.net_usage_words),
                    };
                    self.dispatcher.dispatch_generic(
                        "trx_error",
                        block_num,
                        &serde_json::to_value(&doc)?,
                    )?;
                }
                continue;
            }
            if trx.status != trx_status::EXECUTED {
                continue;
            }

            let routed = self.prepare_transaction(trx, block_num, block_id, timestamp, signed, live);
            let outcome = self.router.route(&routed)?;
            if !outcome.accepted() {
                continue;
            }
            trx_ids.push(routed.headers.trx_id.clone());

            if live {
                let root_act = routed
                    .trace
                    .action_traces
                    .iter()
                    .find_map(|t| t.act.clone());
                if let Some(root_act) = root_act {
                    let _ = self
                        .bus
                        .publish_control(ControlEvent::IncludedTrx {
                            block_num,
                            trx_id: routed.headers.trx_id,
                            signatures: routed.headers.signatures,
                            root_act,
                        })
                        .await;
                }
            }
        }
        Ok(trx_ids)
    }

    /// Flatten the trace set (protocol-version dependent) and attach the
    /// block headers the decoder workers stamp onto actions.
    fn prepare_transaction(
        &self,
        mut trx: TransactionTrace,
        block_num: u64,
        block_id: &str,
        timestamp: &str,
        signed: Option<&SignedBlock>,
        live: bool,
    ) -> RoutedTransaction {
        let inline_count = trx.action_traces.len();
        trx.action_traces = self.parser.flatten(std::mem::take(&mut trx.action_traces));
        let max_inline = self.switches.max_inline;
        let filtered = max_inline > 0 && trx.action_traces.len() > max_inline;
        if filtered {
            trx.action_traces.truncate(max_inline);
        }

        let headers = TrxMetadata {
            trx_id: trx.id.clone(),
            block_num,
            block_id: block_id.to_string(),
            producer: signed.map(|b| b.producer.clone()).unwrap_or_default(),
            ts: timestamp.to_string(),
            cpu_usage_us: trx.cpu_usage_us,
            net_usage_words: trx.net_usage_words,
            inline_count,
            filtered,
            live,
            signatures: std::mem::take(&mut trx.signatures),
        };
        RoutedTransaction {
            trace: trx,
            headers,
        }
    }

    async fn dispatch_block(
        &self,
        block: SignedBlock,
        block_num: u64,
        block_id: &str,
        envelope: &RawBlockEnvelope,
    ) -> Result<(), IndexerError> {
        if let Some(schedule) = &block.new_producers {
            info!(
                block_num,
                version = schedule.version,
                "producer schedule rotation"
            );
            let _ = self
                .bus
                .publish_control(ControlEvent::NewSchedule {
                    block_num,
                    new_producers: schedule.clone(),
                    live: self.switches.live_mode,
                })
                .await;
        }

        let light = LightBlock {
            timestamp: block.timestamp,
            block_num,
            block_id: block_id.to_string(),
            prev_id: envelope
                .prev_block
                .as_ref()
                .map(|p| p.block_id.clone())
                .unwrap_or_default(),
            producer: block.producer,
            new_producers: block.new_producers,
            schedule_version: block.schedule_version,
            cpu_usage: block
                .transactions
                .iter()
                .map(|t| u64::from(t.cpu_usage_us))
                .sum(),
            net_usage: block
                .transactions
                .iter()
                .map(|t| u64::from(t.net_usage_words) * 8)
                .sum(),
            trx_count: block.transactions.len() as u64,
        };
        self.dispatcher.dispatch_block(&light)
    }

    #[must_use]
    pub fn deltas_processed(&self) -> u64 {
        self.deltas_processed.load(Ordering::Relaxed)
    }

    /// Publish a throughput report on the control channel.
    pub async fn publish_report(&self) {
        let deltas = self.deltas_processed.load(Ordering::Relaxed);
        let _ = self
            .bus
            .publish_control(ControlEvent::DsReport { actions: 0, deltas })
            .await;
    }
}
