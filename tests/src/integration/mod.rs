//! Cross-crate integration tests: real components wired together over
//! the in-memory bus, fed hand-encoded state-history envelopes.

pub mod control_flows;
pub mod pipeline;
