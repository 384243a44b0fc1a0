//! Encoders mirroring [`crate::rows`], for fixtures.

use crate::rows::{
    AccountRow, ContractRow, GlobalPropertyRow, PermissionLinkRow, PermissionRow,
    ResourceLimitsRow, ResourceUsageRow,
};
use shared_types::codec::ByteWriter;

pub fn encode_contract_row(row: &ContractRow) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_varuint32(0);
    w.write_name(&row.code);
    w.write_name(&row.scope);
    w.write_name(&row.table);
    w.write_u64(row.primary_key);
    w.write_name(&row.payer);
    w.write_bytes(&row.value);
    w.into_bytes()
}

pub fn encode_account_row(row: &AccountRow) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_varuint32(0);
    w.write_name(&row.name);
    w.write_bytes(&row.abi);
    w.into_bytes()
}

pub fn encode_permission_row(row: &PermissionRow) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_varuint32(0);
    w.write_name(&row.owner);
    w.write_name(&row.name);
    w.write_name(&row.parent);
    w.write_string(&row.last_updated);
    w.into_bytes()
}

pub fn encode_permission_link_row(row: &PermissionLinkRow) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_varuint32(0);
    w.write_name(&row.account);
    w.write_name(&row.code);
    w.write_name(&row.message_type);
    w.write_name(&row.required_permission);
    w.into_bytes()
}

pub fn encode_resource_usage_row(row: &ResourceUsageRow) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_varuint32(0);
    w.write_name(&row.owner);
    w.write_u64(row.net_used);
    w.write_u64(row.cpu_used);
    w.write_u64(row.ram_used);
    w.into_bytes()
}

pub fn encode_resource_limits_row(row: &ResourceLimitsRow) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_varuint32(0);
    w.write_name(&row.owner);
    w.write_i64(row.net_weight);
    w.write_i64(row.cpu_weight);
    w.write_i64(row.ram_bytes);
    w.into_bytes()
}

pub fn encode_global_property_row(row: &GlobalPropertyRow) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_varuint32(0);
    w.write_optional(row.proposed_schedule_block_num, |w, n| {
        w.write_u32(n);
    });
    w.write_optional(row.proposed_schedule.as_ref(), |w, schedule| {
        w.write_u32(schedule.version);
        w.write_varuint32(schedule.producers.len() as u32);
        for p in &schedule.producers {
            w.write_name(&p.producer_name);
            w.write_string(&p.block_signing_key);
        }
    });
    w.into_bytes()
}
