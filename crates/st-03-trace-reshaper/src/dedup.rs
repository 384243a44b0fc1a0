//! Receipt deduplication.
//!
//! The node emits one raw trace per notified receiver; all copies of the
//! same logical action share an act digest. This module collapses each
//! digest group into one [`FinalizedAction`] carrying the per-receiver
//! receipts.

use shared_types::entities::{FinalizedAction, ProcessedAction, ReceiptEntry};
use std::collections::HashMap;
use tracing::trace;

fn finalize(group: Vec<ProcessedAction>) -> Option<FinalizedAction> {
    // The group arrives in sequence order, so the first member is the
    // earliest delivery; its fields become the action-level fields.
    let mut receipts = Vec::with_capacity(group.len());
    let mut notified = Vec::with_capacity(group.len());
    for member in &group {
        let receiver = member.receipt.receiver.clone();
        if !notified.contains(&receiver) {
            notified.push(receiver);
        }
        receipts.push(ReceiptEntry::from(member.receipt.clone()));
    }

    let mut base = group.into_iter().next()?;
    let receipt = base.receipt;
    base.global_sequence = receipt.global_sequence;

    Some(FinalizedAction {
        timestamp: base.timestamp,
        block_num: base.block_num,
        block_id: base.block_id,
        producer: base.producer,
        trx_id: base.trx_id,
        action_ordinal: base.action_ordinal,
        creator_action_ordinal: base.creator_action_ordinal,
        global_sequence: base.global_sequence,
        act: base.act,
        receipts,
        notified,
        code_sequence: receipt.code_sequence,
        abi_sequence: receipt.abi_sequence,
        act_digest: receipt.act_digest,
        account_ram_deltas: base.account_ram_deltas,
        cpu_usage_us: base.cpu_usage_us,
        net_usage_words: base.net_usage_words,
        inline_count: base.inline_count,
        inline_filtered: base.inline_filtered,
        signatures: base.signatures,
    })
}

/// Collapse one transaction's processed actions into finalized form:
/// exactly one output per unique act digest, `receipts` built from every
/// grouped delivery with the code/abi sequences and digest hoisted to the
/// action level.
///
/// A transaction whose sole action is the system contract's periodic
/// `onblock` housekeeping call is dropped entirely.
#[must_use]
pub fn deduplicate(actions: Vec<ProcessedAction>, system_contract: &str) -> Vec<FinalizedAction> {
    if actions.is_empty() {
        return Vec::new();
    }

    if let [only] = actions.as_slice() {
        if only.act.account == system_contract && only.act.name == "onblock" {
            trace!(block_num = only.block_num, "dropping onblock-only transaction");
            return Vec::new();
        }
    }

    // A single action needs no grouping; its receipts array is the
    // singleton built from its own receipt.
    if actions.len() == 1 {
        return actions
            .into_iter()
            .filter_map(|a| finalize(vec![a]))
            .collect();
    }

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<ProcessedAction>> = HashMap::new();
    for action in actions {
        let digest = action.receipt.act_digest.clone();
        let group = groups.entry(digest.clone()).or_insert_with(|| {
            order.push(digest);
            Vec::new()
        });
        group.push(action);
    }

    order
        .into_iter()
        .filter_map(|digest| groups.remove(&digest))
        .filter_map(finalize)
        .collect()
}
