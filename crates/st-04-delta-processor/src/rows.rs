//! Native record layouts for the delta groups the chain emits.
//!
//! These are the chain's own row types, decoded with the shared binary
//! reader; contract ABIs play no part here. Every record opens with a
//! varuint revision tag, revision 0 for all supported releases.

use shared_types::codec::{ByteReader, CodecError};
use shared_types::entities::{ProducerKey, ProducerSchedule};

fn read_variant_tag(r: &mut ByteReader<'_>, type_name: &'static str) -> Result<(), CodecError> {
    let tag = r.read_varuint32()?;
    if tag != 0 {
        return Err(CodecError::UnknownVariant { type_name, tag });
    }
    Ok(())
}

/// One contract-table row: addressing fields plus the schema-encoded
/// row value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractRow {
    pub code: String,
    pub scope: String,
    pub table: String,
    pub primary_key: u64,
    pub payer: String,
    pub value: Vec<u8>,
}

pub fn read_contract_row(buf: &[u8]) -> Result<ContractRow, CodecError> {
    let mut r = ByteReader::new(buf);
    read_variant_tag(&mut r, "contract_row")?;
    Ok(ContractRow {
        code: r.read_name()?,
        scope: r.read_name()?,
        table: r.read_name()?,
        primary_key: r.read_u64()?,
        payer: r.read_name()?,
        value: r.read_bytes()?,
    })
}

/// Account row; a non-empty `abi` blob means the account published
/// contract code in this block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountRow {
    pub name: String,
    pub abi: Vec<u8>,
}

pub fn read_account_row(buf: &[u8]) -> Result<AccountRow, CodecError> {
    let mut r = ByteReader::new(buf);
    read_variant_tag(&mut r, "account")?;
    Ok(AccountRow {
        name: r.read_name()?,
        abi: r.read_bytes()?,
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PermissionRow {
    pub owner: String,
    pub name: String,
    pub parent: String,
    pub last_updated: String,
}

pub fn read_permission_row(buf: &[u8]) -> Result<PermissionRow, CodecError> {
    let mut r = ByteReader::new(buf);
    read_variant_tag(&mut r, "permission")?;
    Ok(PermissionRow {
        owner: r.read_name()?,
        name: r.read_name()?,
        parent: r.read_name()?,
        last_updated: r.read_string()?,
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PermissionLinkRow {
    pub account: String,
    pub code: String,
    pub message_type: String,
    pub required_permission: String,
}

pub fn read_permission_link_row(buf: &[u8]) -> Result<PermissionLinkRow, CodecError> {
    let mut r = ByteReader::new(buf);
    read_variant_tag(&mut r, "permission_link")?;
    Ok(PermissionLinkRow {
        account: r.read_name()?,
        code: r.read_name()?,
        message_type: r.read_name()?,
        required_permission: r.read_name()?,
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceUsageRow {
    pub owner: String,
    pub net_used: u64,
    pub cpu_used: u64,
    pub ram_used: u64,
}

pub fn read_resource_usage_row(buf: &[u8]) -> Result<ResourceUsageRow, CodecError> {
    let mut r = ByteReader::new(buf);
    read_variant_tag(&mut r, "resource_usage")?;
    Ok(ResourceUsageRow {
        owner: r.read_name()?,
        net_used: r.read_u64()?,
        cpu_used: r.read_u64()?,
        ram_used: r.read_u64()?,
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceLimitsRow {
    pub owner: String,
    pub net_weight: i64,
    pub cpu_weight: i64,
    pub ram_bytes: i64,
}

pub fn read_resource_limits_row(buf: &[u8]) -> Result<ResourceLimitsRow, CodecError> {
    let mut r = ByteReader::new(buf);
    read_variant_tag(&mut r, "resource_limits")?;
    Ok(ResourceLimitsRow {
        owner: r.read_name()?,
        net_weight: r.read_i64()?,
        cpu_weight: r.read_i64()?,
        ram_bytes: r.read_i64()?,
    })
}

/// Chain-global state; only the proposed producer schedule matters to
/// the pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlobalPropertyRow {
    pub proposed_schedule_block_num: Option<u32>,
    pub proposed_schedule: Option<ProducerSchedule>,
}

pub fn read_global_property_row(buf: &[u8]) -> Result<GlobalPropertyRow, CodecError> {
    let mut r = ByteReader::new(buf);
    read_variant_tag(&mut r, "global_property")?;
    let proposed_schedule_block_num = r.read_optional(|r| r.read_u32())?;
    let proposed_schedule = r.read_optional(|r| {
        let version = r.read_u32()?;
        let count = r.read_varuint32()? as usize;
        let mut producers = Vec::with_capacity(count);
        for _ in 0..count {
            producers.push(ProducerKey {
                producer_name: r.read_name()?,
                block_signing_key: r.read_string()?,
            });
        }
        Ok(ProducerSchedule { version, producers })
    })?;
    Ok(GlobalPropertyRow {
        proposed_schedule_block_num,
        proposed_schedule,
    })
}
