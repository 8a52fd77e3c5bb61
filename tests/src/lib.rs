//! # Block Production Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/      # Coordinator driven end to end over the event bus
//!     ├── fixtures.rs   # Shared node wiring
//!     ├── mining.rs     # Sealing, staleness, confirmation, uncles
//!     └── generation.rs # Deterministic chain generation
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p miner-tests
//!
//! # Benchmarks
//! cargo bench -p miner-tests
//! ```

#![allow(unused_variables)]
#![allow(unused_imports)]
#![allow(dead_code)]

pub mod integration;
