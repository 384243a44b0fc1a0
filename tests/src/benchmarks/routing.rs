//! Work-routing benchmarks: contract-affinity lookups and filter
//! matching on the per-action hot path.

use criterion::{black_box, BenchmarkId, Criterion, Throughput};
use shared_types::config::IndexerConfig;
use shared_types::entities::{Act, ActionData};
use shared_types::filters::FilterSet;
use st_05_work_router::Heatmap;
use std::collections::HashMap;

fn pool_map(contracts: usize, pool_size: usize) -> HashMap<String, Vec<usize>> {
    (0..contracts)
        .map(|i| {
            let workers: Vec<usize> = (1..=pool_size).filter(|w| w % (i % 3 + 1) == 0).collect();
            let workers = if workers.is_empty() { vec![1] } else { workers };
            (format!("contract{i}"), workers)
        })
        .collect()
}

pub fn bench_heatmap_affinity(c: &mut Criterion) {
    let mut group = c.benchmark_group("work-router/heatmap");
    for contracts in [100usize, 1000] {
        let mut heatmap = Heatmap::default();
        heatmap.update(pool_map(contracts, 8), 8);
        let names: Vec<String> = (0..contracts).map(|i| format!("contract{i}")).collect();

        group.throughput(Throughput::Elements(contracts as u64));
        group.bench_with_input(
            BenchmarkId::new("next_worker", contracts),
            &names,
            |b, names| {
                b.iter(|| {
                    for name in names {
                        black_box(heatmap.next_worker(name));
                    }
                })
            },
        );
    }
    group.finish();
}

pub fn bench_filter_matching(c: &mut Criterion) {
    let mut config = IndexerConfig::default();
    config.blacklists.actions = (0..200)
        .map(|i| format!("local::spammer{i}::*"))
        .collect();
    config.whitelists.actions = (0..200)
        .map(|i| format!("local::dapp{i}::transfer"))
        .collect();
    let filters = FilterSet::from_config(&config);

    let hit = Act {
        account: "dapp150".to_string(),
        name: "transfer".to_string(),
        authorization: Vec::new(),
        data: ActionData::Hex(String::new()),
    };
    let miss = Act {
        account: "bystander".to_string(),
        name: "vote".to_string(),
        authorization: Vec::new(),
        data: ActionData::Hex(String::new()),
    };

    let mut group = c.benchmark_group("work-router/filters");
    group.bench_function("whitelist_hit", |b| {
        b.iter(|| black_box(filters.action_whitelisted(&hit)))
    });
    group.bench_function("whitelist_miss", |b| {
        b.iter(|| black_box(filters.action_whitelisted(&miss)))
    });
    group.bench_function("blacklist_miss", |b| {
        b.iter(|| black_box(filters.action_blacklisted(&miss)))
    });
    group.finish();
}
