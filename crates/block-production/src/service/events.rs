//! Reaction to chain and pool events.

use super::Inner;
use shared_bus::{BlockchainEvent, Subscription};
use shared_types::SignedTransaction;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub(super) async fn update_loop(inner: Arc<Inner>, mut events: Subscription) {
    while let Some(event) = events.recv().await {
        match event {
            BlockchainEvent::ChainHead { block } => {
                debug!("[miner] new head #{}, reassembling", block.number());
                if let Err(err) = inner.assemble_next().await {
                    warn!("[miner] failed to assemble work on new head: {}", err);
                }
            }
            BlockchainEvent::ChainSide { block } => {
                debug!("[miner] side block #{} kept as uncle candidate", block.number());
                inner.uncles.lock().await.insert(block.hash(), block);
            }
            BlockchainEvent::TxPre { tx } => {
                if !inner.mining.load(Ordering::SeqCst) {
                    inner.apply_pending_transaction(tx).await;
                }
            }
            _ => {}
        }
    }
    info!("[miner] event bus closed, update loop exiting");
}

impl Inner {
    /// Apply a newly pooled transaction to the pending state.
    async fn apply_pending_transaction(&self, tx: SignedTransaction) {
        let gas_price = self.state.lock().await.gas_price;
        let mut current = self.current.lock().await;
        let Some(shared) = current.as_mut() else {
            return;
        };
        if Arc::get_mut(shared).is_none() {
            *shared = Arc::new(shared.detached());
        }
        let Some(work) = Arc::get_mut(shared) else {
            return;
        };

        let outcome = work.commit_transactions(self.deps.executor.as_ref(), &[tx], gas_price);
        self.post(outcome.events());
    }
}
