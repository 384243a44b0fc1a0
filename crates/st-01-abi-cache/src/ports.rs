//! Outbound ports for the ABI cache.
//!
//! The cache depends on two external systems: the search engine holding
//! historical schema versions, and a chain node for the current head ABI.
//! Both are modeled as async traits so tests and alternate deployments can
//! substitute implementations.

use async_trait::async_trait;
use shared_types::ipc::DsError;
use shared_types::schema::ContractSchema;
use thiserror::Error;

/// Port-level failures. These are transient infrastructure problems, not
/// schema misses; the cache treats them as a miss without blacklisting.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("schema index lookup failed: {0}")]
    Index(String),

    #[error("chain abi fetch failed: {0}")]
    Chain(String),
}

/// Historical schema lookup against the search engine.
#[async_trait]
pub trait SchemaIndex: Send + Sync {
    /// The schema version valid at `block_num` for `account`, with
    /// `valid_until` taken from the next stored version when one exists.
    async fn schema_at(
        &self,
        account: &str,
        block_num: u64,
    ) -> Result<Option<ContractSchema>, CacheError>;
}

/// Current-ABI fetch from a chain node.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// The ABI at the head block, already parsed. `None` when the account
    /// carries no contract.
    async fn current_schema(&self, account: &str) -> Result<Option<ContractSchema>, CacheError>;
}

/// Sink for decode diagnostics raised on resolution failure.
#[async_trait]
pub trait DiagnosticSink: Send + Sync {
    async fn report(&self, error: DsError);
}

/// Diagnostic sink that drops everything. For callers that only want the
/// negative-cache behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDiagnostics;

#[async_trait]
impl DiagnosticSink for NullDiagnostics {
    async fn report(&self, _error: DsError) {}
}
