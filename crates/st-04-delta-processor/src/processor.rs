//! Per-block delta processing: native row decode, contract-schema
//! decode, filtering, handler dispatch and output collection.

use crate::handlers::HandlerRegistry;
use crate::rows::{
    read_account_row, read_contract_row, read_global_property_row, read_permission_link_row,
    read_permission_row, read_resource_limits_row, read_resource_usage_row,
};
use serde_json::{json, Value};
use shared_types::config::Features;
use shared_types::entities::{AbiUpdateRecord, DeltaRow, DynamicTableDoc, RemovalNotice, TableDeltaGroup};
use shared_types::filters::FilterSet;
use shared_types::ipc::{DsError, DsErrorKind};
use shared_types::schema::{AbiDefinition, ContractSchema, SchemaKind};
use st_01_abi_cache::{AbiCache, ChainClient, DiagnosticSink, SchemaIndex};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Identity of the block a delta batch belongs to.
#[derive(Clone, Debug, Default)]
pub struct BlockContext {
    pub block_num: u64,
    pub block_id: String,
    pub timestamp: String,
}

/// A dynamic table-state document plus the routing identity its
/// destination is derived from.
#[derive(Clone, Debug, PartialEq)]
pub struct DynamicRow {
    pub code: String,
    pub table: String,
    pub doc: DynamicTableDoc,
}

/// Everything one block's delta groups produce, split by destination.
#[derive(Debug, Default)]
pub struct DeltaBatch {
    /// Decoded contract rows bound for the delta queues.
    pub rows: Vec<DeltaRow>,
    /// Deletion notices bound for the removal queue.
    pub removals: Vec<RemovalNotice>,
    /// Contract schema updates observed this block.
    pub abi_updates: Vec<AbiUpdateRecord>,
    /// System-table side documents as `(category, doc)` pairs.
    pub generic: Vec<(String, Value)>,
    /// Rows bound for the per-contract dynamic queues.
    pub dynamic: Vec<DynamicRow>,
}

impl DeltaBatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
            && self.removals.is_empty()
            && self.abi_updates.is_empty()
            && self.generic.is_empty()
            && self.dynamic.is_empty()
    }
}

/// Turns raw [`TableDeltaGroup`]s into a [`DeltaBatch`].
///
/// `account` groups run their side effects unconditionally so schema
/// upgrades reach the cache even when delta indexing is off.
pub struct DeltaProcessor<I, C, D> {
    cache: Arc<AbiCache<I, C, D>>,
    diagnostics: Arc<D>,
    handlers: HandlerRegistry,
    filters: FilterSet,
    features: Features,
    system_contract: String,
}

impl<I, C, D> DeltaProcessor<I, C, D>
where
    I: SchemaIndex,
    C: ChainClient,
    D: DiagnosticSink,
{
    pub fn new(
        cache: Arc<AbiCache<I, C, D>>,
        diagnostics: Arc<D>,
        handlers: HandlerRegistry,
        filters: FilterSet,
        features: Features,
        system_contract: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            diagnostics,
            handlers,
            filters,
            features,
            system_contract: system_contract.into(),
        }
    }

    /// Process one block's delta groups, in node order.
    pub async fn process(&self, groups: &[TableDeltaGroup], ctx: &BlockContext) -> DeltaBatch {
        let mut batch = DeltaBatch::default();
        for group in groups {
            match group.name.as_str() {
                "contract_row" => self.process_contract_rows(group, ctx, &mut batch).await,
                "account" => self.process_accounts(group, ctx, &mut batch),
                "permission" => self.process_permissions(group, ctx, &mut batch),
                "permission_link" => self.process_permission_links(group, ctx, &mut batch),
                "resource_usage" => self.process_resource_usage(group, ctx, &mut batch),
                "resource_limits" => self.process_resource_limits(group, ctx, &mut batch),
                "global_property" => self.process_global_property(group, ctx, &mut batch),
                other => trace!(group = other, "unhandled delta group"),
            }
        }
        batch
    }

    async fn process_contract_rows(
        &self,
        group: &TableDeltaGroup,
        ctx: &BlockContext,
        batch: &mut DeltaBatch,
    ) {
        if !self.features.index_deltas {
            return;
        }
        for raw in &group.rows {
            let row = match read_contract_row(&raw.data) {
                Ok(row) => row,
                Err(e) => {
                    warn!(block_num = ctx.block_num, error = %e, "undecodable contract_row, dropping");
                    continue;
                }
            };

            if self.filters.delta_blacklisted(&row.code, &row.table) {
                continue;
            }
            if self.filters.has_delta_whitelist()
                && !self.filters.delta_whitelisted(&row.code, &row.table)
            {
                continue;
            }

            // Deletions carry no row image worth decoding.
            if !raw.present {
                batch.removals.push(RemovalNotice {
                    code: row.code,
                    table: row.table,
                    scope: row.scope,
                    primary_key: row.primary_key.to_string(),
                    block_num: ctx.block_num,
                });
                continue;
            }

            let mut delta = DeltaRow {
                timestamp: ctx.timestamp.clone(),
                code: row.code,
                scope: row.scope,
                table: row.table,
                primary_key: row.primary_key.to_string(),
                payer: row.payer,
                present: true,
                block_num: ctx.block_num,
                block_id: ctx.block_id.clone(),
                ..DeltaRow::default()
            };

            match self
                .cache
                .resolve(&delta.code, &delta.table, SchemaKind::Table, ctx.block_num)
                .await
            {
                Some(resolution) => {
                    match resolution.schema.abi.decode(&resolution.type_name, &row.value) {
                        Ok(decoded) => delta.data = Some(decoded),
                        Err(e) => {
                            warn!(
                                code = %delta.code,
                                table = %delta.table,
                                block_num = ctx.block_num,
                                error = %e,
                                "row decode failed against resolved schema"
                            );
                            self.diagnostics
                                .report(DsError {
                                    kind: DsErrorKind::Delta,
                                    contract: delta.code.clone(),
                                    name: delta.table.clone(),
                                    block_num: ctx.block_num,
                                    global_sequence: 0,
                                })
                                .await;
                            delta.value = Some(hex::encode(&row.value));
                        }
                    }
                }
                // The cache already reported the schema miss.
                None => delta.value = Some(hex::encode(&row.value)),
            }

            let handled = self.handlers.run_all(&mut delta);

            if let Some(tables) = self.features.contract_state.get(&delta.code) {
                if tables.is_empty() || tables.iter().any(|t| *t == delta.table) {
                    batch.dynamic.push(DynamicRow {
                        code: delta.code.clone(),
                        table: delta.table.clone(),
                        doc: DynamicTableDoc {
                            timestamp: delta.timestamp.clone(),
                            scope: delta.scope.clone(),
                            primary_key: delta.primary_key.clone(),
                            payer: delta.payer.clone(),
                            block_num: delta.block_num,
                            block_id: delta.block_id.clone(),
                            data: delta.data.clone(),
                        },
                    });
                }
            }

            if handled || self.features.index_all_deltas {
                batch.rows.push(delta);
            }
        }
    }

    /// `account` rows carry a contract's new ABI. The cache load happens
    /// here so later rows and the block's actions decode with the fresh
    /// schema.
    fn process_accounts(&self, group: &TableDeltaGroup, ctx: &BlockContext, batch: &mut DeltaBatch) {
        for raw in &group.rows {
            let row = match read_account_row(&raw.data) {
                Ok(row) => row,
                Err(e) => {
                    warn!(block_num = ctx.block_num, error = %e, "undecodable account row, dropping");
                    continue;
                }
            };
            if row.abi.is_empty() {
                continue;
            }
            let abi: AbiDefinition = match serde_json::from_slice(&row.abi) {
                Ok(abi) => abi,
                Err(e) => {
                    warn!(account = %row.name, block_num = ctx.block_num, error = %e, "unparsable contract schema, dropping");
                    continue;
                }
            };

            let mut actions: Vec<String> = abi.actions.keys().cloned().collect();
            actions.sort_unstable();
            let mut tables: Vec<String> = abi.tables.keys().cloned().collect();
            tables.sort_unstable();

            debug!(account = %row.name, block_num = ctx.block_num, "contract schema update");
            batch.abi_updates.push(AbiUpdateRecord {
                timestamp: ctx.timestamp.clone(),
                account: row.name.clone(),
                block: ctx.block_num,
                abi: String::from_utf8_lossy(&row.abi).into_owned(),
                abi_hex: hex::encode(&row.abi),
                actions,
                tables,
            });
            self.cache.load(ContractSchema {
                account: row.name,
                valid_from: ctx.block_num,
                valid_until: None,
                abi,
            });
        }
    }

    fn process_permissions(
        &self,
        group: &TableDeltaGroup,
        ctx: &BlockContext,
        batch: &mut DeltaBatch,
    ) {
        for raw in &group.rows {
            let Ok(row) = read_permission_row(&raw.data) else {
                warn!(block_num = ctx.block_num, "undecodable permission row, dropping");
                continue;
            };
            batch.generic.push((
                "permission".to_string(),
                json!({
                    "@timestamp": ctx.timestamp,
                    "block_num": ctx.block_num,
                    "present": raw.present,
                    "owner": row.owner,
                    "name": row.name,
                    "parent": row.parent,
                    "last_updated": row.last_updated,
                }),
            ));
        }
    }

    fn process_permission_links(
        &self,
        group: &TableDeltaGroup,
        ctx: &BlockContext,
        batch: &mut DeltaBatch,
    ) {
        for raw in &group.rows {
            let Ok(row) = read_permission_link_row(&raw.data) else {
                warn!(block_num = ctx.block_num, "undecodable permission_link row, dropping");
                continue;
            };
            batch.generic.push((
                "permission_link".to_string(),
                json!({
                    "@timestamp": ctx.timestamp,
                    "block_num": ctx.block_num,
                    "present": raw.present,
                    "account": row.account,
                    "code": row.code,
                    "action": row.message_type,
                    "permission": row.required_permission,
                }),
            ));
        }
    }

    fn process_resource_usage(
        &self,
        group: &TableDeltaGroup,
        ctx: &BlockContext,
        batch: &mut DeltaBatch,
    ) {
        if !self.features.resource_usage {
            return;
        }
        for raw in &group.rows {
            let Ok(row) = read_resource_usage_row(&raw.data) else {
                warn!(block_num = ctx.block_num, "undecodable resource_usage row, dropping");
                continue;
            };
            // System-account usage is pure noise at one row per block.
            if row.owner == self.system_contract {
                continue;
            }
            batch.generic.push((
                "resource_usage".to_string(),
                json!({
                    "@timestamp": ctx.timestamp,
                    "block_num": ctx.block_num,
                    "owner": row.owner,
                    "net_used": row.net_used,
                    "cpu_used": row.cpu_used,
                    "ram_used": row.ram_used,
                }),
            ));
        }
    }

    fn process_resource_limits(
        &self,
        group: &TableDeltaGroup,
        ctx: &BlockContext,
        batch: &mut DeltaBatch,
    ) {
        if !self.features.resource_limits {
            return;
        }
        for raw in &group.rows {
            let Ok(row) = read_resource_limits_row(&raw.data) else {
                warn!(block_num = ctx.block_num, "undecodable resource_limits row, dropping");
                continue;
            };
            batch.generic.push((
                "resource_limits".to_string(),
                json!({
                    "@timestamp": ctx.timestamp,
                    "block_num": ctx.block_num,
                    "owner": row.owner,
                    "net_weight": row.net_weight,
                    "cpu_weight": row.cpu_weight,
                    "ram_bytes": row.ram_bytes,
                }),
            ));
        }
    }

    fn process_global_property(
        &self,
        group: &TableDeltaGroup,
        ctx: &BlockContext,
        batch: &mut DeltaBatch,
    ) {
        for raw in &group.rows {
            let Ok(row) = read_global_property_row(&raw.data) else {
                warn!(block_num = ctx.block_num, "undecodable global_property row, dropping");
                continue;
            };
            let (Some(schedule_block), Some(schedule)) =
                (row.proposed_schedule_block_num, row.proposed_schedule)
            else {
                continue;
            };
            debug!(
                block_num = ctx.block_num,
                version = schedule.version,
                "proposed producer schedule"
            );
            batch.generic.push((
                "schedule".to_string(),
                json!({
                    "@timestamp": ctx.timestamp,
                    "block_num": ctx.block_num,
                    "proposed_at": schedule_block,
                    "version": schedule.version,
                    "producers": schedule.producers,
                }),
            ));
        }
    }
}
