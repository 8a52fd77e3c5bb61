//! Utility modules for block production

pub mod clock;
pub mod hashing;

pub use clock::unix_now;
pub use hashing::{bytes_to_u256, meets_difficulty, seal_digest, sha256, sha256d, target_for};
