//! Binary record layouts shared by every protocol version.
//!
//! Variant-tagged records follow the node convention: a leading varuint
//! selects the record revision, and all releases in scope use revision 0.
//! Vectors are length-prefixed with a varuint; action payloads arrive as
//! length-prefixed byte blobs and are carried forward as lowercase hex.

use shared_types::codec::{ByteReader, CodecError};
use shared_types::entities::{
    Act, ActionData, ActionReceipt, ActionTrace, AuthSequence, Authorization, BlockTransaction,
    ProducerKey, ProducerSchedule, RamDelta, RawDeltaRow, SignedBlock, TableDeltaGroup,
    TransactionTrace,
};

fn read_variant_tag(r: &mut ByteReader<'_>, type_name: &'static str) -> Result<(), CodecError> {
    let tag = r.read_varuint32()?;
    if tag != 0 {
        return Err(CodecError::UnknownVariant { type_name, tag });
    }
    Ok(())
}

fn read_authorization(r: &mut ByteReader<'_>) -> Result<Authorization, CodecError> {
    Ok(Authorization {
        actor: r.read_name()?,
        permission: r.read_name()?,
    })
}

pub fn read_act(r: &mut ByteReader<'_>) -> Result<Act, CodecError> {
    let account = r.read_name()?;
    let name = r.read_name()?;
    let count = r.read_varuint32()? as usize;
    let mut authorization = Vec::with_capacity(count);
    for _ in 0..count {
        authorization.push(read_authorization(r)?);
    }
    let data = r.read_bytes()?;
    Ok(Act {
        account,
        name,
        authorization,
        data: ActionData::Hex(hex::encode(data)),
    })
}

fn read_auth_sequence(r: &mut ByteReader<'_>) -> Result<AuthSequence, CodecError> {
    Ok(AuthSequence {
        account: r.read_name()?,
        sequence: r.read_u64()?,
    })
}

fn read_receipt(r: &mut ByteReader<'_>) -> Result<ActionReceipt, CodecError> {
    read_variant_tag(r, "action_receipt")?;
    let receiver = r.read_name()?;
    let act_digest = r.read_checksum256()?;
    let global_sequence = r.read_u64()?;
    let recv_sequence = r.read_u64()?;
    let count = r.read_varuint32()? as usize;
    let mut auth_sequence = Vec::with_capacity(count);
    for _ in 0..count {
        auth_sequence.push(read_auth_sequence(r)?);
    }
    Ok(ActionReceipt {
        receiver,
        act_digest,
        global_sequence,
        recv_sequence,
        auth_sequence,
        code_sequence: r.read_varuint32()?,
        abi_sequence: r.read_varuint32()?,
    })
}

fn read_ram_delta(r: &mut ByteReader<'_>) -> Result<RamDelta, CodecError> {
    Ok(RamDelta {
        account: r.read_name()?,
        delta: r.read_i64()?,
    })
}

/// Fields common to both action-trace layouts, read in wire order after
/// the ordinals (flat) or the variant tag (nested).
fn read_trace_body(r: &mut ByteReader<'_>) -> Result<ActionTrace, CodecError> {
    let receipt = r.read_optional(read_receipt)?;
    let receiver = r.read_name()?;
    let act = read_act(r)?;
    let except = r.read_optional(|r| r.read_string())?;
    let error_code = r.read_optional(|r| r.read_u64())?;
    let count = r.read_varuint32()? as usize;
    let mut account_ram_deltas = Vec::with_capacity(count);
    for _ in 0..count {
        account_ram_deltas.push(read_ram_delta(r)?);
    }
    Ok(ActionTrace {
        action_ordinal: 0,
        creator_action_ordinal: 0,
        receipt,
        receiver,
        act: Some(act),
        except,
        error_code,
        account_ram_deltas,
        inline_traces: Vec::new(),
    })
}

/// Flat layout: ordinals on the wire, no inline tree.
pub fn read_flat_trace(r: &mut ByteReader<'_>) -> Result<ActionTrace, CodecError> {
    read_variant_tag(r, "action_trace")?;
    let action_ordinal = r.read_varuint32()?;
    let creator_action_ordinal = r.read_varuint32()?;
    let mut trace = read_trace_body(r)?;
    trace.action_ordinal = action_ordinal;
    trace.creator_action_ordinal = creator_action_ordinal;
    Ok(trace)
}

/// Nested layout: no ordinals, children follow the body recursively.
pub fn read_nested_trace(r: &mut ByteReader<'_>) -> Result<ActionTrace, CodecError> {
    read_variant_tag(r, "action_trace")?;
    let mut trace = read_trace_body(r)?;
    let count = r.read_varuint32()? as usize;
    let mut inline_traces = Vec::with_capacity(count);
    for _ in 0..count {
        inline_traces.push(read_nested_trace(r)?);
    }
    trace.inline_traces = inline_traces;
    Ok(trace)
}

/// Trace layouts a transaction can carry its actions in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceLayout {
    Nested,
    Flat,
    /// Flat, with the signature list subject to pruning.
    FlatPruned,
}

pub fn read_transaction_trace(
    r: &mut ByteReader<'_>,
    layout: TraceLayout,
) -> Result<TransactionTrace, CodecError> {
    read_variant_tag(r, "transaction_trace")?;
    let id = r.read_checksum256()?;
    let status = r.read_u8()?;
    let cpu_usage_us = r.read_u32()?;
    let net_usage_words = r.read_varuint32()?;

    let count = r.read_varuint32()? as usize;
    let mut action_traces = Vec::with_capacity(count);
    for _ in 0..count {
        action_traces.push(match layout {
            TraceLayout::Nested => read_nested_trace(r)?,
            TraceLayout::Flat | TraceLayout::FlatPruned => read_flat_trace(r)?,
        });
    }

    let signatures = match layout {
        TraceLayout::FlatPruned => r
            .read_optional(read_signatures)?
            .unwrap_or_default(),
        TraceLayout::Nested | TraceLayout::Flat => read_signatures(r)?,
    };

    Ok(TransactionTrace {
        id,
        status,
        cpu_usage_us,
        net_usage_words,
        action_traces,
        signatures,
    })
}

fn read_signatures(r: &mut ByteReader<'_>) -> Result<Vec<String>, CodecError> {
    let count = r.read_varuint32()? as usize;
    let mut signatures = Vec::with_capacity(count);
    for _ in 0..count {
        signatures.push(r.read_string()?);
    }
    Ok(signatures)
}

pub fn read_trace_list(
    buf: &[u8],
    layout: TraceLayout,
) -> Result<Vec<TransactionTrace>, CodecError> {
    let mut r = ByteReader::new(buf);
    let count = r.read_varuint32()? as usize;
    let mut traces = Vec::with_capacity(count);
    for _ in 0..count {
        traces.push(read_transaction_trace(&mut r, layout)?);
    }
    Ok(traces)
}

pub fn read_delta_groups(buf: &[u8]) -> Result<Vec<TableDeltaGroup>, CodecError> {
    let mut r = ByteReader::new(buf);
    let count = r.read_varuint32()? as usize;
    let mut groups = Vec::with_capacity(count);
    for _ in 0..count {
        read_variant_tag(&mut r, "table_delta")?;
        let name = r.read_string()?;
        let row_count = r.read_varuint32()? as usize;
        let mut rows = Vec::with_capacity(row_count);
        for _ in 0..row_count {
            rows.push(RawDeltaRow {
                present: r.read_bool()?,
                data: r.read_bytes()?,
            });
        }
        groups.push(TableDeltaGroup { name, rows });
    }
    Ok(groups)
}

fn read_producer_schedule(r: &mut ByteReader<'_>) -> Result<ProducerSchedule, CodecError> {
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
}

pub fn read_signed_block(buf: &[u8]) -> Result<SignedBlock, CodecError> {
    let mut r = ByteReader::new(buf);
    read_variant_tag(&mut r, "signed_block")?;
    let timestamp = r.read_string()?;
    let producer = r.read_name()?;
    let schedule_version = r.read_u32()?;
    let new_producers = r.read_optional(read_producer_schedule)?;

    let count = r.read_varuint32()? as usize;
    let mut transactions = Vec::with_capacity(count);
    for _ in 0..count {
        let status = r.read_u8()?;
        let cpu_usage_us = r.read_u32()?;
        let net_usage_words = r.read_varuint32()?;
        let trx_id = r.read_checksum256()?;
        let act_count = r.read_varuint32()? as usize;
        let mut packed_actions = Vec::with_capacity(act_count);
        for _ in 0..act_count {
            packed_actions.push(read_act(&mut r)?);
        }
        transactions.push(BlockTransaction {
            status,
            cpu_usage_us,
            net_usage_words,
            trx_id,
            packed_actions,
        });
    }

    Ok(SignedBlock {
        timestamp,
        producer,
        schedule_version,
        new_producers,
        transactions,
    })
}
