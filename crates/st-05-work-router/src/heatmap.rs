//! Contract-affinity worker selection.

use std::collections::HashMap;
use tracing::warn;

/// Maps hot contracts to their eligible worker subsets and tracks a
/// per-contract cursor through each subset.
///
/// Worker indices are 1-based queue shard numbers. The map arrives from
/// the supervisor over the control channel and may be replaced live;
/// replacement resets the cursors.
#[derive(Debug, Default)]
pub struct Heatmap {
    assignments: HashMap<String, Vec<usize>>,
    cursors: HashMap<String, usize>,
}

impl Heatmap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the assignment map. Out-of-range and duplicate worker
    /// indices are dropped; each contract's set is kept sorted so the
    /// cursor advances in ascending worker order.
    pub fn update(&mut self, map: HashMap<String, Vec<usize>>, pool_size: usize) {
        self.assignments.clear();
        self.cursors.clear();
        for (contract, mut workers) in map {
            workers.retain(|&w| {
                let valid = w >= 1 && w <= pool_size;
                if !valid {
                    warn!(contract = %contract, worker = w, pool_size, "worker index out of range, ignoring");
                }
                valid
            });
            workers.sort_unstable();
            workers.dedup();
            if !workers.is_empty() {
                self.assignments.insert(contract, workers);
            }
        }
    }

    /// Next worker for `contract`, or `None` when the contract has no
    /// affinity entry and the caller should fall back to round robin.
    pub fn next_worker(&mut self, contract: &str) -> Option<usize> {
        let workers = self.assignments.get(contract)?;
        let cursor = self.cursors.entry(contract.to_string()).or_insert(0);
        let worker = workers[*cursor % workers.len()];
        *cursor = (*cursor + 1) % workers.len();
        Some(worker)
    }

    #[must_use]
    pub fn contract_count(&self) -> usize {
        self.assignments.len()
    }
}
