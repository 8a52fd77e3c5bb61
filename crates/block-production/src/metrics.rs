//! Metrics collection for the block producer

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Metrics collector for the block producer
#[derive(Debug, Default)]
pub struct Metrics {
    /// Work cycles that produced a candidate block
    pub work_committed: AtomicU64,

    /// Transactions included across all candidates
    pub transactions_included: AtomicU64,

    /// Uncles included across all candidates
    pub uncles_included: AtomicU64,

    /// Total assembly time (microseconds)
    pub assembly_time_us: AtomicU64,

    /// Sealed blocks written to the chain
    pub blocks_mined: AtomicU64,

    /// Sealed blocks that lost the race for their height
    pub stale_blocks: AtomicU64,

    /// Locally mined blocks still canonical at confirmation depth
    pub confirmed_blocks: AtomicU64,

    /// Results dropped: empty, invalid or unwritable
    pub discarded_results: AtomicU64,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a committed work cycle
    pub fn record_work(&self, tx_count: usize, uncle_count: usize, took: Duration) {
        self.work_committed.fetch_add(1, Ordering::Relaxed);
        self.transactions_included
            .fetch_add(tx_count as u64, Ordering::Relaxed);
        self.uncles_included
            .fetch_add(uncle_count as u64, Ordering::Relaxed);
        self.assembly_time_us
            .fetch_add(took.as_micros() as u64, Ordering::Relaxed);
    }

    /// Record a sealed block that reached the chain
    pub fn record_mined(&self, stale: bool) {
        self.blocks_mined.fetch_add(1, Ordering::Relaxed);
        if stale {
            self.stale_blocks.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a confirmation
    pub fn record_confirmed(&self) {
        self.confirmed_blocks.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a dropped result
    pub fn record_discarded(&self) {
        self.discarded_results.fetch_add(1, Ordering::Relaxed);
    }

    /// Get committed work cycles
    pub fn get_work_committed(&self) -> u64 {
        self.work_committed.load(Ordering::Relaxed)
    }

    /// Get blocks mined
    pub fn get_blocks_mined(&self) -> u64 {
        self.blocks_mined.load(Ordering::Relaxed)
    }

    /// Get stale blocks
    pub fn get_stale_blocks(&self) -> u64 {
        self.stale_blocks.load(Ordering::Relaxed)
    }

    /// Get confirmed blocks
    pub fn get_confirmed_blocks(&self) -> u64 {
        self.confirmed_blocks.load(Ordering::Relaxed)
    }

    /// Get discarded results
    pub fn get_discarded_results(&self) -> u64 {
        self.discarded_results.load(Ordering::Relaxed)
    }

    /// Get average transactions per candidate
    pub fn get_avg_transactions_per_work(&self) -> f64 {
        let work = self.work_committed.load(Ordering::Relaxed);
        if work == 0 {
            return 0.0;
        }
        let txs = self.transactions_included.load(Ordering::Relaxed);
        txs as f64 / work as f64
    }

    /// Get average assembly time (microseconds)
    pub fn get_avg_assembly_time(&self) -> f64 {
        let work = self.work_committed.load(Ordering::Relaxed);
        if work == 0 {
            return 0.0;
        }
        let time = self.assembly_time_us.load(Ordering::Relaxed);
        time as f64 / work as f64
    }
}
