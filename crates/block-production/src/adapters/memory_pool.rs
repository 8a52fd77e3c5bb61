//! In-memory transaction pool and a fixed account list.

use crate::ports::outbound::{AccountManager, TransactionPool};
use parking_lot::RwLock;
use shared_bus::{BlockchainEvent, InMemoryEventBus};
use shared_types::{Address, Hash, SignedTransaction};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Pending transactions in arrival order.
#[derive(Default)]
pub struct MemoryTxPool {
    txs: RwLock<Vec<SignedTransaction>>,
    bus: Option<Arc<InMemoryEventBus>>,
}

impl MemoryTxPool {
    /// Empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Announce every accepted transaction on `bus` as `TxPre`.
    pub fn with_bus(mut self, bus: Arc<InMemoryEventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Add a transaction. Duplicates are ignored.
    pub fn add(&self, tx: SignedTransaction) -> bool {
        let hash = tx.hash();
        {
            let mut txs = self.txs.write();
            if txs.iter().any(|known| known.hash() == hash) {
                return false;
            }
            txs.push(tx.clone());
        }
        if let Some(bus) = &self.bus {
            bus.send(BlockchainEvent::TxPre { tx });
        }
        true
    }

    /// Add several transactions, returning how many were new.
    pub fn add_all(&self, txs: impl IntoIterator<Item = SignedTransaction>) -> usize {
        txs.into_iter().filter(|tx| self.add(tx.clone())).count()
    }

    /// Whether `hash` is pending.
    pub fn contains(&self, hash: &Hash) -> bool {
        self.txs.read().iter().any(|tx| tx.hash() == *hash)
    }

    /// Number of pending transactions.
    pub fn len(&self) -> usize {
        self.txs.read().len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.txs.read().is_empty()
    }
}

impl TransactionPool for MemoryTxPool {
    fn pending(&self) -> Vec<SignedTransaction> {
        self.txs.read().clone()
    }

    fn remove_transactions(&self, hashes: &[Hash]) {
        if hashes.is_empty() {
            return;
        }
        let doomed: HashSet<&Hash> = hashes.iter().collect();
        let mut txs = self.txs.write();
        let before = txs.len();
        txs.retain(|tx| !doomed.contains(&tx.hash()));
        debug!(removed = before - txs.len(), "[miner] evicted transactions from pool");
    }
}

/// Account manager over a fixed address list.
#[derive(Clone, Debug, Default)]
pub struct StaticAccounts(Vec<Address>);

impl StaticAccounts {
    /// Manager owning `accounts`.
    pub fn new(accounts: Vec<Address>) -> Self {
        Self(accounts)
    }
}

impl AccountManager for StaticAccounts {
    fn accounts(&self) -> Vec<Address> {
        self.0.clone()
    }
}
