//! The router proper: filtering, strategy selection and queue publish.

use crate::heatmap::Heatmap;
use parking_lot::Mutex;
use shared_bus::{QueueMessage, ShardedQueueSet};
use shared_types::config::RoutingMode;
use shared_types::entities::{Act, RoutedTransaction};
use shared_types::errors::IndexerError;
use shared_types::filters::FilterSet;
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// What became of one transaction offered to the router.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Accepted and published to the given 1-based worker queue.
    Routed(usize),
    /// Rejected by the blacklist/whitelist. Not an error.
    Filtered,
    /// No routable first action. Dropped with a warning.
    Malformed,
}

impl RouteOutcome {
    #[must_use]
    pub fn accepted(self) -> bool {
        matches!(self, Self::Routed(_))
    }
}

/// Assigns transactions to decoder worker queues.
pub struct WorkRouter {
    queues: ShardedQueueSet,
    filters: FilterSet,
    mode: RoutingMode,
    heatmap: Mutex<Heatmap>,
    /// `<system>.null`, whose `nonce` action is a routing no-op.
    null_account: String,
    /// Whitelist scan bound over the flat action list; 0 scans all.
    max_depth: usize,
}

impl WorkRouter {
    #[must_use]
    pub fn new(
        queues: ShardedQueueSet,
        filters: FilterSet,
        mode: RoutingMode,
        system_contract: &str,
        max_depth: usize,
    ) -> Self {
        Self {
            queues,
            filters,
            mode,
            heatmap: Mutex::new(Heatmap::new()),
            null_account: format!("{system_contract}.null"),
            max_depth,
        }
    }

    /// Install a new contract-affinity map (control channel
    /// `update_pool_map`).
    pub fn update_pool_map(&self, map: HashMap<String, Vec<usize>>) {
        let mut heatmap = self.heatmap.lock();
        heatmap.update(map, self.queues.shard_count());
        debug!(contracts = heatmap.contract_count(), "pool map updated");
    }

    fn is_nonce(&self, act: &Act) -> bool {
        act.account == self.null_account && act.name == "nonce"
    }

    /// The action whose contract decides the route: the first action,
    /// unless it is the nonce placeholder.
    fn routing_action<'a>(&self, routed: &'a RoutedTransaction) -> Option<&'a Act> {
        routed
            .trace
            .action_traces
            .iter()
            .filter_map(|t| t.act.as_ref())
            .find(|act| !self.is_nonce(act))
    }

    fn whitelist_passes(&self, routed: &RoutedTransaction) -> bool {
        let mut acts = routed
            .trace
            .action_traces
            .iter()
            .filter_map(|t| t.act.as_ref());
        match self.max_depth {
            0 => acts.any(|a| self.filters.action_whitelisted(a)),
            depth => acts.take(depth).any(|a| self.filters.action_whitelisted(a)),
        }
    }

    /// Filter and publish one transaction. `Err` means the destination
    /// pool is stalled beyond the pending bound, not a filtering drop.
    pub fn route(&self, routed: &RoutedTransaction) -> Result<RouteOutcome, IndexerError> {
        let Some(first) = self.routing_action(routed) else {
            warn!(
                trx_id = %routed.trace.id,
                block_num = routed.headers.block_num,
                "transaction without a routable action, dropping"
            );
            return Ok(RouteOutcome::Malformed);
        };

        if self.filters.action_blacklisted(first) {
            trace!(trx_id = %routed.trace.id, contract = %first.account, "blacklisted, dropping");
            return Ok(RouteOutcome::Filtered);
        }
        if self.filters.has_action_whitelist() && !self.whitelist_passes(routed) {
            trace!(trx_id = %routed.trace.id, "no whitelisted action, dropping");
            return Ok(RouteOutcome::Filtered);
        }

        let contract = first.account.clone();
        let message = QueueMessage::new(
            contract.clone(),
            routed.headers.block_num,
            serde_json::to_value(routed)?,
        );

        let shard = match self.mode {
            RoutingMode::RoundRobin => self.queues.publish_next(message)?,
            RoutingMode::Heatmap => {
                let affinity = self.heatmap.lock().next_worker(&contract);
                match affinity {
                    Some(shard) => {
                        self.queues.publish_to(shard, message)?;
                        shard
                    }
                    None => self.queues.publish_next(message)?,
                }
            }
        };
        Ok(RouteOutcome::Routed(shard))
    }

    /// Re-publish held messages after the destination signalled drained
    /// capacity. FIFO order.
    pub async fn flush_pending(&self) -> Result<usize, IndexerError> {
        self.queues.flush_pending().await
    }

    /// Wait for the pending list to clear.
    pub async fn drain(&self) {
        self.queues.drain().await;
    }

    #[must_use]
    pub fn is_stalled(&self) -> bool {
        self.queues.is_stalled()
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.queues.pending_len()
    }
}
