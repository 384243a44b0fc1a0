//! Mock port implementations shared by this crate's tests and the
//! integration suite.

use crate::ports::{CacheError, ChainClient, DiagnosticSink, SchemaIndex};
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::ipc::DsError;
use shared_types::schema::ContractSchema;
use std::sync::atomic::{AtomicUsize, Ordering};

/// `SchemaIndex` backed by a fixed version list.
#[derive(Default)]
pub struct MockSchemaIndex {
    schemas: Vec<ContractSchema>,
    fail: bool,
    queries: AtomicUsize,
}

impl MockSchemaIndex {
    #[must_use]
    pub fn with_schema(mut self, schema: ContractSchema) -> Self {
        self.schemas.push(schema);
        self
    }

    /// Make every lookup fail, to exercise the transient-error path.
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// How many lookups this index has served.
    #[must_use]
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchemaIndex for MockSchemaIndex {
    async fn schema_at(
        &self,
        account: &str,
        block_num: u64,
    ) -> Result<Option<ContractSchema>, CacheError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CacheError::Index("index offline".to_string()));
        }
        Ok(self
            .schemas
            .iter()
            .find(|s| s.account == account && s.covers(block_num))
            .cloned())
    }
}

/// `ChainClient` serving a fixed head schema per account.
#[derive(Default)]
pub struct MockChainClient {
    schemas: Vec<ContractSchema>,
    fail: bool,
}

impl MockChainClient {
    #[must_use]
    pub fn with_schema(mut self, schema: ContractSchema) -> Self {
        self.schemas.push(schema);
        self
    }

    #[must_use]
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn current_schema(&self, account: &str) -> Result<Option<ContractSchema>, CacheError> {
        if self.fail {
            return Err(CacheError::Chain("node unreachable".to_string()));
        }
        Ok(self.schemas.iter().find(|s| s.account == account).cloned())
    }
}

/// Diagnostic sink that records everything it receives.
#[derive(Default)]
pub struct CountingDiagnostics {
    count: AtomicUsize,
    errors: Mutex<Vec<DsError>>,
}

impl CountingDiagnostics {
    #[must_use]
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn errors(&self) -> Vec<DsError> {
        self.errors.lock().clone()
    }
}

#[async_trait]
impl DiagnosticSink for CountingDiagnostics {
    async fn report(&self, error: DsError) {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.errors.lock().push(error);
    }
}
