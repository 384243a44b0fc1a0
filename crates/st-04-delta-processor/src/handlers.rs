//! The wildcard table-handler registry and the built-in handlers.

use serde_json::{json, Map, Value};
use shared_types::entities::DeltaRow;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

/// A per-table reshaping hook. Runs after the contract-schema decode;
/// may rewrite `data` and attach `@table` sub-documents via `extras`.
pub trait TableHandler: Send + Sync {
    fn handle(&self, row: &mut DeltaRow) -> Result<(), HandlerError>;
}

enum HandlerKey {
    Exact { code: String, table: String },
    CodeWildcard { code: String },
    TableWildcard { table: String },
}

impl HandlerKey {
    fn parse(key: &str) -> Option<Self> {
        let (code, table) = key.split_once(':')?;
        match (code, table) {
            ("*", "*") | ("", _) | (_, "") => None,
            ("*", table) => Some(Self::TableWildcard {
                table: table.to_string(),
            }),
            (code, "*") => Some(Self::CodeWildcard {
                code: code.to_string(),
            }),
            (code, table) => Some(Self::Exact {
                code: code.to_string(),
                table: table.to_string(),
            }),
        }
    }

    fn matches(&self, code: &str, table: &str) -> bool {
        match self {
            Self::Exact { code: c, table: t } => c == code && t == table,
            Self::CodeWildcard { code: c } => c == code,
            Self::TableWildcard { table: t } => t == table,
        }
    }

    /// Evaluation class: exact first, then code wildcards, then table
    /// wildcards.
    fn priority(&self) -> u8 {
        match self {
            Self::Exact { .. } => 0,
            Self::CodeWildcard { .. } => 1,
            Self::TableWildcard { .. } => 2,
        }
    }
}

/// Ordered `(matcher, handler)` pairs. All matching handlers run, in
/// priority class order and registration order within a class.
#[derive(Default)]
pub struct HandlerRegistry {
    entries: Vec<(HandlerKey, Arc<dyn TableHandler>)>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard handler set for a chain with the given system
    /// contract.
    #[must_use]
    pub fn with_defaults(system_contract: &str) -> Self {
        let mut registry = Self::new();
        let _ = registry.register("*:accounts", Arc::new(AccountsHandler));
        let _ = registry.register(
            &format!("{system_contract}:voters"),
            Arc::new(SubDocHandler::new(
                "@voters",
                &[
                    "is_proxy",
                    "producers",
                    "last_vote_weight",
                    "proxied_vote_weight",
                    "staked",
                    "proxy",
                ],
            )),
        );
        let _ = registry.register(
            &format!("{system_contract}:producers"),
            Arc::new(SubDocHandler::new(
                "@producers",
                &["total_votes", "is_active", "unpaid_blocks"],
            )),
        );
        let _ = registry.register(
            &format!("{system_contract}:global"),
            Arc::new(SubDocHandler::all("@global")),
        );
        let _ = registry.register(
            &format!("{system_contract}:userres"),
            Arc::new(SubDocHandler::new(
                "@userres",
                &["net_weight", "cpu_weight", "ram_bytes"],
            )),
        );
        let _ = registry.register(
            &format!("{system_contract}:delband"),
            Arc::new(SubDocHandler::new(
                "@delband",
                &["from", "to", "net_weight", "cpu_weight"],
            )),
        );
        registry
    }

    /// Register a handler under a `code:table`, `code:*` or `*:table`
    /// key.
    pub fn register(
        &mut self,
        key: &str,
        handler: Arc<dyn TableHandler>,
    ) -> Result<(), HandlerError> {
        let key = HandlerKey::parse(key)
            .ok_or_else(|| HandlerError(format!("invalid handler key: {key}")))?;
        self.entries.push((key, handler));
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run every matching handler against the row. Returns whether any
    /// handler matched; a failing handler logs and is skipped without
    /// affecting the others.
    pub fn run_all(&self, row: &mut DeltaRow) -> bool {
        let mut matched = false;
        for priority in 0u8..=2 {
            for (key, handler) in &self.entries {
                if key.priority() != priority || !key.matches(&row.code, &row.table) {
                    continue;
                }
                matched = true;
                if let Err(e) = handler.handle(row) {
                    warn!(
                        code = %row.code,
                        table = %row.table,
                        block_num = row.block_num,
                        %e,
                        "table handler failed, skipping"
                    );
                }
            }
        }
        matched
    }
}

/// Splits a `"1.5000 EOS"` asset string into amount and symbol.
fn split_asset(text: &str) -> Option<(f64, String)> {
    let (amount, symbol) = text.split_once(' ')?;
    let amount: f64 = amount.parse().ok()?;
    Some((amount, symbol.to_string()))
}

/// Token-balance reshaping for any contract's `accounts` table: the
/// `balance` asset splits into an amount/symbol pair under `@accounts`.
pub struct AccountsHandler;

impl TableHandler for AccountsHandler {
    fn handle(&self, row: &mut DeltaRow) -> Result<(), HandlerError> {
        let Some(data) = row.data.take() else {
            // Undecodable balance rows pass through untouched.
            return Ok(());
        };
        let Some((amount, symbol)) = data
            .get("balance")
            .and_then(Value::as_str)
            .and_then(split_asset)
        else {
            row.data = Some(data);
            return Err(HandlerError("accounts row without parsable balance".to_string()));
        };
        row.extras.insert(
            "@accounts".to_string(),
            json!({ "amount": amount, "symbol": symbol }),
        );
        Ok(())
    }
}

/// Moves selected fields of the decoded row under an `@table` key, or
/// the whole row when no field list is given.
pub struct SubDocHandler {
    key: &'static str,
    fields: Option<&'static [&'static str]>,
}

impl SubDocHandler {
    #[must_use]
    pub fn new(key: &'static str, fields: &'static [&'static str]) -> Self {
        Self {
            key,
            fields: Some(fields),
        }
    }

    #[must_use]
    pub fn all(key: &'static str) -> Self {
        Self { key, fields: None }
    }
}

impl TableHandler for SubDocHandler {
    fn handle(&self, row: &mut DeltaRow) -> Result<(), HandlerError> {
        let Some(data) = row.data.take() else {
            return Ok(());
        };
        let sub = match self.fields {
            None => data,
            Some(fields) => {
                let Some(source) = data.as_object() else {
                    row.data = Some(data);
                    return Err(HandlerError("row data is not an object".to_string()));
                };
                let mut sub = Map::new();
                for field in fields {
                    if let Some(v) = source.get(*field) {
                        sub.insert((*field).to_string(), v.clone());
                    }
                }
                Value::Object(sub)
            }
        };
        row.extras.insert(self.key.to_string(), sub);
        Ok(())
    }
}
