//! # Integration Tests
//!
//! The coordinator wired to the in-memory chain, pool and state, talking
//! over a shared event bus the same way a node would.

pub mod fixtures;

mod generation;
mod mining;
