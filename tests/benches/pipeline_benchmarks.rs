//! # state-trail Pipeline Benchmarks
//!
//! Hot-path performance checks:
//!
//! | Path | Target |
//! |------|--------|
//! | Nested trace flattening | linear in action count |
//! | Zlib trace-section parse | < 1ms per 100 transactions |
//! | Receipt deduplication | linear in receipt count |
//! | Heatmap worker lookup | O(1) per action |
//! | Filter matching | O(1) per action |

use criterion::{criterion_group, criterion_main};

use st_tests::benchmarks::reshaping::{
    bench_flatten_nested, bench_receipt_dedup, bench_trace_wire_parse,
};
use st_tests::benchmarks::routing::{bench_filter_matching, bench_heatmap_affinity};

criterion_group!(
    reshaping,
    bench_flatten_nested,
    bench_trace_wire_parse,
    bench_receipt_dedup
);
criterion_group!(routing, bench_heatmap_affinity, bench_filter_matching);
criterion_main!(reshaping, routing);
