//! Depth-first flattening of nested inline-action trees.

use shared_types::entities::ActionTrace;

fn visit(mut node: ActionTrace, parent: u32, next: &mut u32, out: &mut Vec<ActionTrace>) {
    let ordinal = *next;
    *next += 1;
    node.action_ordinal = ordinal;
    node.creator_action_ordinal = parent;
    let children = std::mem::take(&mut node.inline_traces);
    out.push(node);
    for child in children {
        visit(child, ordinal, next, out);
    }
}

/// Flatten nested traces into one list, stamping each node with a
/// strictly increasing `action_ordinal` (depth-first, starting at 1) and
/// its parent's ordinal as `creator_action_ordinal` (0 for roots).
///
/// The output is re-sorted ascending by global sequence: depth-first
/// visiting order diverges from chain-assigned sequence order when inline
/// actions interleave across siblings. Traces without a receipt (failed
/// executions) sort last, after every sequenced trace.
#[must_use]
pub fn flatten_nested(roots: Vec<ActionTrace>) -> Vec<ActionTrace> {
    let mut out = Vec::new();
    let mut next = 1u32;
    for root in roots {
        visit(root, 0, &mut next, &mut out);
    }
    out.sort_by_key(|t| t.receipt.as_ref().map_or(u64::MAX, |r| r.global_sequence));
    out
}
