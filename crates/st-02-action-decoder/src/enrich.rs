//! Post-decode enrichment hooks.

use serde_json::Value;
use shared_types::entities::Act;
use std::sync::Arc;

/// A hook invoked after an action payload decodes successfully. Hooks may
/// rewrite the decoded value in place; they must not fail.
pub trait ActionEnricher: Send + Sync {
    fn enrich(&self, act: &Act, decoded: &mut Value);
}

/// Ordered registry of enrichment hooks.
///
/// Keys are `contract::action` for an exact match or `contract::*` for
/// every action of a contract. All matching hooks run, in registration
/// order, exact and wildcard alike.
#[derive(Default)]
pub struct EnricherRegistry {
    handlers: Vec<(String, Arc<dyn ActionEnricher>)>,
}

impl EnricherRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: impl Into<String>, handler: Arc<dyn ActionEnricher>) {
        self.handlers.push((key.into(), handler));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run every hook registered for this contract/action pair.
    pub fn apply(&self, act: &Act, decoded: &mut Value) {
        let exact = format!("{}::{}", act.account, act.name);
        let wildcard = format!("{}::*", act.account);
        for (key, handler) in &self.handlers {
            if *key == exact || *key == wildcard {
                handler.enrich(act, decoded);
            }
        }
    }
}
