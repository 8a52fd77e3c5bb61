//! # Hashing Helpers
//!
//! Keccak-256 helpers shared by every crate that needs to identify a block,
//! transaction or receipt.

use sha3::{Digest, Keccak256};

use crate::entities::Hash;

/// Keccak-256 digest of `data`.
#[inline]
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// Root of an empty list (also the root of an empty state).
#[must_use]
pub fn empty_root() -> Hash {
    keccak256(&[])
}

/// Commitment over an ordered list of hashes.
///
/// The position of every leaf is part of the commitment, so reordering the
/// list changes the root.
#[must_use]
pub fn ordered_root<I>(leaves: I) -> Hash
where
    I: IntoIterator<Item = Hash>,
{
    let mut buffer = Vec::new();
    for (index, leaf) in leaves.into_iter().enumerate() {
        buffer.extend_from_slice(&(index as u64).to_be_bytes());
        buffer.extend_from_slice(&leaf);
    }
    keccak256(&buffer)
}
