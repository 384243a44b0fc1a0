//! Wire-format encoders mirroring [`crate::wire`], for building binary
//! fixtures in this crate's tests and the integration suite.

use crate::wire::TraceLayout;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use shared_types::codec::ByteWriter;
use shared_types::entities::{
    Act, ActionReceipt, ActionTrace, SignedBlock, TableDeltaGroup, TransactionTrace,
};
use std::io::Write;

pub fn encode_act(w: &mut ByteWriter, act: &Act) {
    w.write_name(&act.account);
    w.write_name(&act.name);
    w.write_varuint32(act.authorization.len() as u32);
    for auth in &act.authorization {
        w.write_name(&auth.actor);
        w.write_name(&auth.permission);
    }
    let data = act
        .data
        .as_hex()
        .and_then(|h| hex::decode(h).ok())
        .unwrap_or_default();
    w.write_bytes(&data);
}

pub fn encode_receipt(w: &mut ByteWriter, receipt: &ActionReceipt) {
    w.write_varuint32(0);
    w.write_name(&receipt.receiver);
    w.write_checksum256(&receipt.act_digest);
    w.write_u64(receipt.global_sequence);
    w.write_u64(receipt.recv_sequence);
    w.write_varuint32(receipt.auth_sequence.len() as u32);
    for auth in &receipt.auth_sequence {
        w.write_name(&auth.account);
        w.write_u64(auth.sequence);
    }
    w.write_varuint32(receipt.code_sequence);
    w.write_varuint32(receipt.abi_sequence);
}

fn encode_trace_body(w: &mut ByteWriter, trace: &ActionTrace) {
    w.write_optional(trace.receipt.as_ref(), encode_receipt);
    w.write_name(&trace.receiver);
    if let Some(act) = &trace.act {
        encode_act(w, act);
    } else {
        encode_act(
            w,
            &Act {
                account: String::new(),
                name: String::new(),
                authorization: Vec::new(),
                data: shared_types::entities::ActionData::Hex(String::new()),
            },
        );
    }
    w.write_optional(trace.except.as_deref(), |w, e| {
        w.write_string(e);
    });
    w.write_optional(trace.error_code, |w, c| {
        w.write_u64(c);
    });
    w.write_varuint32(trace.account_ram_deltas.len() as u32);
    for rd in &trace.account_ram_deltas {
        w.write_name(&rd.account);
        w.write_i64(rd.delta);
    }
}

pub fn encode_flat_trace(w: &mut ByteWriter, trace: &ActionTrace) {
    w.write_varuint32(0);
    w.write_varuint32(trace.action_ordinal);
    w.write_varuint32(trace.creator_action_ordinal);
    encode_trace_body(w, trace);
}

pub fn encode_nested_trace(w: &mut ByteWriter, trace: &ActionTrace) {
    w.write_varuint32(0);
    encode_trace_body(w, trace);
    w.write_varuint32(trace.inline_traces.len() as u32);
    for inline in &trace.inline_traces {
        encode_nested_trace(w, inline);
    }
}

pub fn encode_transaction_trace(w: &mut ByteWriter, trx: &TransactionTrace, layout: TraceLayout) {
    w.write_varuint32(0);
    w.write_checksum256(&trx.id);
    w.write_u8(trx.status);
    w.write_u32(trx.cpu_usage_us);
    w.write_varuint32(trx.net_usage_words);
    w.write_varuint32(trx.action_traces.len() as u32);
    for trace in &trx.action_traces {
        match layout {
            TraceLayout::Nested => encode_nested_trace(w, trace),
            TraceLayout::Flat | TraceLayout::FlatPruned => encode_flat_trace(w, trace),
        }
    }
    match layout {
        TraceLayout::FlatPruned => {
            w.write_optional(Some(&trx.signatures), |w, sigs| {
                encode_signatures(w, sigs);
            });
        }
        TraceLayout::Nested | TraceLayout::Flat => encode_signatures(w, &trx.signatures),
    }
}

/// Encode a transaction whose signature list was pruned by the node.
pub fn encode_pruned_transaction_trace(w: &mut ByteWriter, trx: &TransactionTrace) {
    w.write_varuint32(0);
    w.write_checksum256(&trx.id);
    w.write_u8(trx.status);
    w.write_u32(trx.cpu_usage_us);
    w.write_varuint32(trx.net_usage_words);
    w.write_varuint32(trx.action_traces.len() as u32);
    for trace in &trx.action_traces {
        encode_flat_trace(w, trace);
    }
    w.write_optional(None::<&Vec<String>>, |w, sigs| {
        encode_signatures(w, sigs);
    });
}

fn encode_signatures(w: &mut ByteWriter, signatures: &[String]) {
    w.write_varuint32(signatures.len() as u32);
    for sig in signatures {
        w.write_string(sig);
    }
}

pub fn encode_trace_list(traces: &[TransactionTrace], layout: TraceLayout) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_varuint32(traces.len() as u32);
    for trx in traces {
        encode_transaction_trace(&mut w, trx, layout);
    }
    w.into_bytes()
}

pub fn encode_delta_groups(groups: &[TableDeltaGroup]) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_varuint32(groups.len() as u32);
    for group in groups {
        w.write_varuint32(0);
        w.write_string(&group.name);
        w.write_varuint32(group.rows.len() as u32);
        for row in &group.rows {
            w.write_bool(row.present);
            w.write_bytes(&row.data);
        }
    }
    w.into_bytes()
}

pub fn encode_signed_block(block: &SignedBlock) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_varuint32(0);
    w.write_string(&block.timestamp);
    w.write_name(&block.producer);
    w.write_u32(block.schedule_version);
    w.write_optional(block.new_producers.as_ref(), |w, schedule| {
        w.write_u32(schedule.version);
        w.write_varuint32(schedule.producers.len() as u32);
        for p in &schedule.producers {
            w.write_name(&p.producer_name);
            w.write_string(&p.block_signing_key);
        }
    });
    w.write_varuint32(block.transactions.len() as u32);
    for trx in &block.transactions {
        w.write_u8(trx.status);
        w.write_u32(trx.cpu_usage_us);
        w.write_varuint32(trx.net_usage_words);
        w.write_checksum256(&trx.trx_id);
        w.write_varuint32(trx.packed_actions.len() as u32);
        for act in &trx.packed_actions {
            encode_act(&mut w, act);
        }
    }
    w.into_bytes()
}

/// Compress a section the way the zlib protocol versions deliver it.
pub fn deflate(buf: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    let _ = encoder.write_all(buf);
    encoder.finish().unwrap_or_default()
}
