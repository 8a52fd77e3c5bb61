//! Bounded record of block numbers this node sealed recently.

use parking_lot::Mutex;
use std::sync::Arc;

/// Ring buffer shared by every [`Work`](super::Work) of one producer.
pub type SharedMinedBlocks = Arc<Mutex<LocalMinedBlocks>>;

/// Fixed-capacity ring of recently sealed block numbers.
///
/// Pushing into a full ring overwrites the oldest entry. Taking a number
/// clears its slot so a confirmation is reported once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMinedBlocks {
    slots: Vec<Option<u64>>,
    next: usize,
}

impl LocalMinedBlocks {
    /// Ring with `capacity` slots (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
            next: 0,
        }
    }

    /// Shareable ring with `capacity` slots.
    pub fn shared(capacity: usize) -> SharedMinedBlocks {
        Arc::new(Mutex::new(Self::new(capacity)))
    }

    /// Record a sealed block number.
    pub fn push(&mut self, number: u64) {
        self.slots[self.next] = Some(number);
        self.next = (self.next + 1) % self.slots.len();
    }

    /// Whether `number` is recorded.
    pub fn contains(&self, number: u64) -> bool {
        self.slots.contains(&Some(number))
    }

    /// Clear `number` if recorded, reporting whether it was.
    pub fn take(&mut self, number: u64) -> bool {
        match self.slots.iter_mut().find(|slot| **slot == Some(number)) {
            Some(slot) => {
                *slot = None;
                true
            }
            None => false,
        }
    }

    /// Recorded numbers, oldest first.
    pub fn numbers(&self) -> Vec<u64> {
        let len = self.slots.len();
        (0..len)
            .filter_map(|i| self.slots[(self.next + i) % len])
            .collect()
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
