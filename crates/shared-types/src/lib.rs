//! # Shared Types Crate
//!
//! Chain entities shared by the miner, its collaborators and the event bus.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-crate types are defined here.
//! - **Content Addressing**: Blocks, transactions and receipts are identified
//!   by the keccak-256 digest of their canonical encoding.

pub mod bloom;
pub mod entities;
pub mod hashing;

pub use bloom::Bloom;
pub use entities::*;
pub use hashing::{empty_root, keccak256, ordered_root};
