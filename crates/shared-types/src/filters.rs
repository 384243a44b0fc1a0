//! # Action/Delta Filter Sets
//!
//! Blacklist/whitelist matching over `chain::code::action` (or
//! `chain::code::table`) key forms, with `*` as the wildcard third part.
//! Shared by the work router (first-action checks) and the delta processor.

use crate::config::IndexerConfig;
use crate::entities::Act;
use std::collections::HashSet;

/// Compiled filter keys for one chain.
#[derive(Clone, Debug, Default)]
pub struct FilterSet {
    chain: String,
    pub action_blacklist: HashSet<String>,
    pub action_whitelist: HashSet<String>,
    pub delta_blacklist: HashSet<String>,
    pub delta_whitelist: HashSet<String>,
}

impl FilterSet {
    /// Build the filter sets from configuration, keeping only keys that
    /// belong to this chain.
    #[must_use]
    pub fn from_config(config: &IndexerConfig) -> Self {
        let chain = config.settings.chain.clone();
        let keep = |keys: &[String]| -> HashSet<String> {
            keys.iter()
                .filter(|k| k.starts_with(&format!("{chain}::")))
                .cloned()
                .collect()
        };
        Self {
            action_blacklist: keep(&config.blacklists.actions),
            action_whitelist: keep(&config.whitelists.actions),
            delta_blacklist: keep(&config.blacklists.deltas),
            delta_whitelist: keep(&config.whitelists.deltas),
            chain,
        }
    }

    fn keys_for(&self, code: &str, name: &str) -> [String; 2] {
        [
            format!("{}::{}::{}", self.chain, code, name),
            format!("{}::{}::*", self.chain, code),
        ]
    }

    /// Whether an action is blacklisted (exact or code-wildcard key).
    #[must_use]
    pub fn action_blacklisted(&self, act: &Act) -> bool {
        self.keys_for(&act.account, &act.name)
            .iter()
            .any(|k| self.action_blacklist.contains(k))
    }

    /// Whether an action matches the whitelist. Only meaningful when the
    /// whitelist is non-empty; callers skip the check otherwise.
    #[must_use]
    pub fn action_whitelisted(&self, act: &Act) -> bool {
        self.keys_for(&act.account, &act.name)
            .iter()
            .any(|k| self.action_whitelist.contains(k))
    }

    #[must_use]
    pub fn has_action_whitelist(&self) -> bool {
        !self.action_whitelist.is_empty()
    }

    /// Whether a delta row is blacklisted by `code::table`.
    #[must_use]
    pub fn delta_blacklisted(&self, code: &str, table: &str) -> bool {
        self.keys_for(code, table)
            .iter()
            .any(|k| self.delta_blacklist.contains(k))
    }

    /// Whether a delta row matches the delta whitelist.
    #[must_use]
    pub fn delta_whitelisted(&self, code: &str, table: &str) -> bool {
        self.keys_for(code, table)
            .iter()
            .any(|k| self.delta_whitelist.contains(k))
    }

    #[must_use]
    pub fn has_delta_whitelist(&self) -> bool {
        !self.delta_whitelist.is_empty()
    }
}
