//! Trace-reshaping benchmarks: nested flattening, wire parsing and
//! receipt deduplication at realistic per-block action counts.

use criterion::{black_box, BenchmarkId, Criterion, Throughput};
use shared_types::codec::ByteWriter;
use shared_types::ProtocolVersion;
use shared_types::entities::{
    trx_status, Act, ActionData, ActionReceipt, ActionTrace, ProcessedAction, TransactionTrace,
};
use st_03_trace_reshaper::testing as wire;
use st_03_trace_reshaper::wire::TraceLayout;
use st_03_trace_reshaper::{deduplicate, flatten_nested, parser_for};

fn transfer_act() -> Act {
    let mut w = ByteWriter::new();
    w.write_name("alice");
    w.write_name("bob");
    Act {
        account: "eosio.token".to_string(),
        name: "transfer".to_string(),
        authorization: Vec::new(),
        data: ActionData::Hex(hex::encode(w.into_bytes())),
    }
}

fn receipt(receiver: &str, global_sequence: u64) -> ActionReceipt {
    ActionReceipt {
        receiver: receiver.to_string(),
        act_digest: format!("{global_sequence:016x}"),
        global_sequence,
        recv_sequence: 1,
        auth_sequence: Vec::new(),
        code_sequence: 1,
        abi_sequence: 1,
    }
}

/// A root trace with `width` children, each nesting `depth` levels.
fn nested_tree(width: usize, depth: usize, next: &mut u64) -> ActionTrace {
    let sequence = *next;
    *next += 1;
    let inline = if depth == 0 {
        Vec::new()
    } else {
        (0..width).map(|_| nested_tree(width, depth - 1, next)).collect()
    };
    ActionTrace {
        receipt: Some(receipt("eosio.token", sequence)),
        receiver: "eosio.token".to_string(),
        act: Some(transfer_act()),
        inline_traces: inline,
        ..ActionTrace::default()
    }
}

pub fn bench_flatten_nested(c: &mut Criterion) {
    let mut group = c.benchmark_group("trace-reshaper/flatten");
    for depth in [2usize, 4, 6] {
        let mut next = 1;
        let roots = vec![nested_tree(2, depth, &mut next)];
        let total = next - 1;
        group.throughput(Throughput::Elements(total));
        group.bench_with_input(BenchmarkId::new("nested", depth), &roots, |b, roots| {
            b.iter(|| black_box(flatten_nested(roots.clone())))
        });
    }
    group.finish();
}

pub fn bench_trace_wire_parse(c: &mut Criterion) {
    let parser = parser_for(ProtocolVersion::V1);
    let mut group = c.benchmark_group("trace-reshaper/parse");
    for count in [10usize, 100, 500] {
        let traces: Vec<TransactionTrace> = (0..count)
            .map(|i| TransactionTrace {
                id: format!("{i:064x}"),
                status: trx_status::EXECUTED,
                cpu_usage_us: 100,
                net_usage_words: 12,
                action_traces: vec![ActionTrace {
                    action_ordinal: 1,
                    receipt: Some(receipt("eosio.token", i as u64 + 1)),
                    receiver: "eosio.token".to_string(),
                    act: Some(transfer_act()),
                    ..ActionTrace::default()
                }],
                signatures: vec!["SIG_K1_a".to_string()],
            })
            .collect();
        let buf = wire::deflate(&wire::encode_trace_list(&traces, TraceLayout::Flat));

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("zlib_traces", count), &buf, |b, buf| {
            b.iter(|| black_box(parser.parse_traces(buf, 1000).unwrap()))
        });
    }
    group.finish();
}

pub fn bench_receipt_dedup(c: &mut Criterion) {
    let action = |ordinal: u32, global_sequence: u64, receiver: &str, digest: &str| ProcessedAction {
        timestamp: "2024-01-01T00:00:00.000".to_string(),
        block_num: 1000,
        block_id: "b1000".to_string(),
        producer: "prodone".to_string(),
        trx_id: "t1".to_string(),
        action_ordinal: ordinal,
        creator_action_ordinal: 0,
        global_sequence,
        act: transfer_act(),
        receipt: ActionReceipt {
            // Shared digest marks the three copies of one execution.
            act_digest: digest.to_string(),
            ..receipt(receiver, global_sequence)
        },
        account_ram_deltas: Vec::new(),
        cpu_usage_us: None,
        net_usage_words: None,
        inline_count: None,
        inline_filtered: None,
        signatures: Vec::new(),
    };

    let mut group = c.benchmark_group("trace-reshaper/dedup");
    for groups in [10usize, 100] {
        // Each logical action arrives as three notification copies.
        let actions: Vec<ProcessedAction> = (0..groups as u64)
            .flat_map(|g| {
                let base = g * 3;
                let digest = format!("d{g}");
                [
                    action(base as u32 + 1, 100 + base, "eosio.token", &digest),
                    action(base as u32 + 2, 101 + base, "alice", &digest),
                    action(base as u32 + 3, 102 + base, "bob", &digest),
                ]
            })
            .collect();

        group.throughput(Throughput::Elements(groups as u64));
        group.bench_with_input(
            BenchmarkId::new("three_notifications", groups),
            &actions,
            |b, actions| b.iter(|| black_box(deduplicate(actions.clone(), "eosio"))),
        );
    }
    group.finish();
}
