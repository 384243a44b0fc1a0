//! Cache service: tiered resolution plus the mutation paths driven by the
//! control channel (schema updates, contract removal).

use crate::ports::{ChainClient, DiagnosticSink, SchemaIndex};
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use shared_types::entities::AbiUpdateRecord;
use shared_types::ipc::{DsError, DsErrorKind};
use shared_types::schema::{AbiDefinition, ContractSchema, SchemaKind};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Hot-cache capacity in contracts per worker.
pub const DEFAULT_HOT_CAPACITY: usize = 512;

/// Which tier satisfied a resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolveSource {
    HotCache,
    Index,
    Chain,
}

/// A successful schema resolution: the governing schema plus the concrete
/// struct type the requested action or table decodes with.
#[derive(Clone, Debug)]
pub struct Resolution {
    pub schema: Arc<ContractSchema>,
    pub type_name: String,
    pub source: ResolveSource,
}

struct NegativeEntry {
    account: String,
    kind: SchemaKind,
    name: String,
    valid_from: u64,
    valid_until: Option<u64>,
}

impl NegativeEntry {
    fn covers(&self, account: &str, kind: SchemaKind, name: &str, block_num: u64) -> bool {
        self.account == account
            && self.kind == kind
            && self.name == name
            && block_num >= self.valid_from
            && self.valid_until.is_none_or(|until| block_num < until)
    }
}

/// Per-worker schema cache. See the crate docs for the tier ordering.
pub struct AbiCache<I, C, D> {
    hot: Mutex<LruCache<String, Arc<ContractSchema>>>,
    negative: RwLock<Vec<NegativeEntry>>,
    index: Arc<I>,
    chain: Arc<C>,
    diagnostics: Arc<D>,
}

impl<I, C, D> AbiCache<I, C, D>
where
    I: SchemaIndex,
    C: ChainClient,
    D: DiagnosticSink,
{
    #[must_use]
    pub fn new(index: Arc<I>, chain: Arc<C>, diagnostics: Arc<D>) -> Self {
        Self::with_capacity(index, chain, diagnostics, DEFAULT_HOT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(
        index: Arc<I>,
        chain: Arc<C>,
        diagnostics: Arc<D>,
        capacity: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            hot: Mutex::new(LruCache::new(capacity)),
            negative: RwLock::new(Vec::new()),
            index,
            chain,
            diagnostics,
        }
    }

    /// Resolve the schema governing `name` on `account` at `block_num`.
    /// Idempotent; a repeated miss inside a blacklisted range costs one
    /// in-memory scan and no remote traffic.
    pub async fn resolve(
        &self,
        account: &str,
        name: &str,
        kind: SchemaKind,
        block_num: u64,
    ) -> Option<Resolution> {
        // Tier 1. No validity check on a hot hit: the far common case is
        // one live schema version per contract.
        if let Some(schema) = self.hot.lock().get(account).cloned() {
            if let Some(type_name) = schema.abi.type_for(kind, name) {
                return Some(Resolution {
                    type_name: type_name.to_string(),
                    schema,
                    source: ResolveSource::HotCache,
                });
            }
        }

        if self.is_blacklisted(account, kind, name, block_num) {
            return None;
        }

        // Tier 2. The failing range for a later blacklist entry comes from
        // the indexed version even when the type is absent from it.
        let mut failed_range = (0u64, None);
        match self.index.schema_at(account, block_num).await {
            Ok(Some(schema)) => {
                failed_range = (schema.valid_from, schema.valid_until);
                if let Some(type_name) = schema.abi.type_for(kind, name) {
                    let type_name = type_name.to_string();
                    let schema = Arc::new(schema);
                    self.hot.lock().put(account.to_string(), schema.clone());
                    return Some(Resolution {
                        type_name,
                        schema,
                        source: ResolveSource::Index,
                    });
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(account, %e, "schema index unavailable, treating as miss");
                return None;
            }
        }

        // Tier 3. Head-block ABI, cached for subsequent hot hits.
        match self.chain.current_schema(account).await {
            Ok(Some(schema)) => {
                let schema = Arc::new(schema);
                self.hot.lock().put(account.to_string(), schema.clone());
                if let Some(type_name) = schema.abi.type_for(kind, name) {
                    return Some(Resolution {
                        type_name: type_name.to_string(),
                        schema,
                        source: ResolveSource::Chain,
                    });
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(account, %e, "chain abi fetch failed, treating as miss");
                return None;
            }
        }

        // Tier 4. Every tier agreed the type does not exist here; remember
        // that for the failing range and say so once.
        self.blacklist(account, kind, name, failed_range);
        self.diagnostics
            .report(DsError {
                kind: match kind {
                    SchemaKind::Action => DsErrorKind::Action,
                    SchemaKind::Table => DsErrorKind::Delta,
                },
                contract: account.to_string(),
                name: name.to_string(),
                block_num,
                global_sequence: 0,
            })
            .await;
        None
    }

    /// Install a freshly published schema and forget every negative entry
    /// for the account. Called when a contract `setabi` lands.
    pub fn load(&self, schema: ContractSchema) {
        debug!(account = %schema.account, block = schema.valid_from, "schema loaded");
        let account = schema.account.clone();
        self.hot.lock().put(account.clone(), Arc::new(schema));
        self.clear_negative(&account);
    }

    /// [`Self::load`] from a control-channel update record, whose ABI
    /// travels as canonical JSON.
    pub fn load_record(&self, record: &AbiUpdateRecord) -> Result<(), serde_json::Error> {
        let abi: AbiDefinition = serde_json::from_str(&record.abi)?;
        self.load(ContractSchema {
            account: record.account.clone(),
            valid_from: record.block,
            valid_until: None,
            abi,
        });
        Ok(())
    }

    /// Drop the hot entry and all negative entries for an account.
    pub fn invalidate(&self, account: &str) {
        self.hot.lock().pop(account);
        self.clear_negative(account);
    }

    /// Control-channel contract removal: drop only the hot entry.
    pub fn evict(&self, account: &str) {
        self.hot.lock().pop(account);
    }

    #[must_use]
    pub fn hot_len(&self) -> usize {
        self.hot.lock().len()
    }

    #[must_use]
    pub fn negative_len(&self) -> usize {
        self.negative.read().len()
    }

    fn is_blacklisted(&self, account: &str, kind: SchemaKind, name: &str, block_num: u64) -> bool {
        self.negative
            .read()
            .iter()
            .any(|entry| entry.covers(account, kind, name, block_num))
    }

    fn blacklist(&self, account: &str, kind: SchemaKind, name: &str, range: (u64, Option<u64>)) {
        debug!(
            account,
            name,
            field = kind.field(),
            valid_from = range.0,
            "auto-blacklisting unresolvable type"
        );
        self.negative.write().push(NegativeEntry {
            account: account.to_string(),
            kind,
            name: name.to_string(),
            valid_from: range.0,
            valid_until: range.1,
        });
    }

    fn clear_negative(&self, account: &str) {
        self.negative.write().retain(|entry| entry.account != account);
    }
}
