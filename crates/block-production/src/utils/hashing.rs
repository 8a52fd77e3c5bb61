//! Hashing utilities for proof-of-work sealing

use primitive_types::U256;
use sha2::{Digest, Sha256};
use shared_types::Hash;

/// Compute SHA-256 hash of data
#[inline]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Compute double SHA-256 hash (Bitcoin-style)
#[inline]
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let first_hash = sha256(data);
    sha256(&first_hash)
}

/// Convert hash bytes to U256 (big-endian)
#[inline]
pub fn bytes_to_u256(bytes: &[u8; 32]) -> U256 {
    U256::from_big_endian(bytes)
}

/// Target a digest must not exceed at `difficulty` (`2^256 / difficulty`).
///
/// Difficulty zero or one accepts every digest.
#[inline]
pub fn target_for(difficulty: U256) -> U256 {
    if difficulty <= U256::one() {
        U256::MAX
    } else {
        U256::MAX / difficulty
    }
}

/// Digest a nonce is judged by: `sha256d(seal_hash ‖ nonce)`.
#[inline]
pub fn seal_digest(seal_hash: &Hash, nonce: u64) -> [u8; 32] {
    let mut bytes = [0u8; 40];
    bytes[..32].copy_from_slice(seal_hash);
    bytes[32..].copy_from_slice(&nonce.to_be_bytes());
    sha256d(&bytes)
}

/// Check if hash meets difficulty target
///
/// Returns true if hash <= target (more leading zeros = harder)
#[inline]
pub fn meets_difficulty(hash: &[u8; 32], target: U256) -> bool {
    bytes_to_u256(hash) <= target
}
