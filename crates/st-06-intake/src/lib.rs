//! # Intake Subsystem
//!
//! The per-block state machine and the decoder worker pool.
//!
//! Intake consumes state-history envelopes one at a time and walks
//! `AwaitMessage → ParseEnvelope → ProcessDeltas → ProcessTraces →
//! Dispatch → Acknowledge` for each. Deltas run strictly before traces
//! within a block so a contract-code update lands in the ABI cache
//! before that block's (and the next block's) actions decode against
//! it. A protocol-level decode failure is fatal: the message is nacked
//! and the loop terminates, because the binary framing can no longer be
//! trusted. Failures confined to one action or row degrade instead.
//!
//! Decoder workers sit behind the work router's sharded queues. Each
//! worker owns its ABI cache, decodes routed transactions, deduplicates
//! receipts and dispatches the finalized actions.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod diagnostics;
pub mod intake;
pub mod worker;

pub use diagnostics::BusDiagnostics;
pub use intake::{AckOutcome, IntakeLoop, IntakeMessage};
pub use worker::DecoderWorker;
