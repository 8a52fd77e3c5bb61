//! # Log Bloom
//!
//! 2048-bit bloom filter summarising the addresses and topics of a set of
//! logs. Each inserted item sets three bits derived from its keccak digest.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};

use crate::entities::Log;
use crate::hashing::keccak256;

/// Byte length of a bloom.
pub const BLOOM_BYTES: usize = 256;

/// A 2048-bit log bloom.
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bloom(#[serde_as(as = "Bytes")] pub [u8; BLOOM_BYTES]);

impl Default for Bloom {
    fn default() -> Self {
        Self([0u8; BLOOM_BYTES])
    }
}

impl std::fmt::Debug for Bloom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let set = self.0.iter().map(|b| b.count_ones()).sum::<u32>();
        write!(f, "Bloom({set} bits set)")
    }
}

impl Bloom {
    /// Bloom over every address and topic in `logs`.
    #[must_use]
    pub fn from_logs(logs: &[Log]) -> Self {
        let mut bloom = Self::default();
        for log in logs {
            bloom.accrue(&log.address);
            for topic in &log.topics {
                bloom.accrue(topic);
            }
        }
        bloom
    }

    /// Insert `data`.
    pub fn accrue(&mut self, data: &[u8]) {
        for (byte, mask) in bit_positions(data) {
            self.0[byte] |= mask;
        }
    }

    /// OR another bloom into this one.
    pub fn accrue_bloom(&mut self, other: &Bloom) {
        for (dst, src) in self.0.iter_mut().zip(other.0.iter()) {
            *dst |= *src;
        }
    }

    /// Whether `data` may have been inserted. False positives are possible.
    #[must_use]
    pub fn contains(&self, data: &[u8]) -> bool {
        bit_positions(data)
            .into_iter()
            .all(|(byte, mask)| self.0[byte] & mask == mask)
    }

    /// True when no bit is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

fn bit_positions(data: &[u8]) -> [(usize, u8); 3] {
    let digest = keccak256(data);
    let mut positions = [(0usize, 0u8); 3];
    for (i, slot) in positions.iter_mut().enumerate() {
        let bit = ((usize::from(digest[2 * i]) << 8) | usize::from(digest[2 * i + 1])) & 2047;
        *slot = (BLOOM_BYTES - 1 - bit / 8, 1u8 << (bit % 8));
    }
    positions
}
