//! Performance benchmarks for the pipeline hot paths: trace reshaping
//! and work routing. Registered from `benches/pipeline_benchmarks.rs`.

pub mod reshaping;
pub mod routing;
