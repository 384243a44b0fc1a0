//! # state-trail Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── benchmarks/       # Performance tests for the hot paths
//! │   ├── reshaping.rs
//! │   └── routing.rs
//! │
//! └── integration/      # Cross-crate pipeline choreography
//!     ├── pipeline.rs
//!     └── control_flows.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p st-tests
//!
//! # By category
//! cargo test -p st-tests integration::
//!
//! # Benchmarks
//! cargo bench -p st-tests
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod benchmarks;
pub mod integration;
