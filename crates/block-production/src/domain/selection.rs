//! Transaction selection policy for the current work.

use super::gas_pool::GasPool;
use super::work::Work;
use crate::error::ExecutionError;
use crate::ports::outbound::ExecutionEnvironment;
use primitive_types::U256;
use shared_bus::BlockchainEvent;
use shared_types::{Log, SignedTransaction, ZERO_HASH};
use tracing::{debug, info, trace};

/// What one selection pass did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    /// Logs of the transactions included in this pass
    pub logs: Vec<Log>,
    /// Transactions included in this pass
    pub included: usize,
    /// Transactions included in the work so far
    pub total: usize,
}

impl CommitOutcome {
    /// Notifications this pass warrants.
    pub fn events(&self) -> Vec<BlockchainEvent> {
        let mut events = Vec::new();
        if !self.logs.is_empty() {
            events.push(BlockchainEvent::PendingLogs {
                logs: self.logs.clone(),
            });
        }
        if self.total > 0 {
            events.push(BlockchainEvent::PendingState);
        }
        events
    }
}

impl Work {
    /// Try every candidate in order against the remaining block gas.
    ///
    /// - Replay-protected transactions are skipped until the protecting
    ///   fork is active.
    /// - An unowned sender whose transaction pays below `gas_price` is
    ///   marked low-price; all its transactions in this pass are skipped
    ///   and queued for eviction.
    /// - A sender whose transaction hits the block gas limit is skipped for
    ///   the rest of the pass but stays in the pool.
    /// - Any other failure queues the transaction for eviction.
    #[tracing::instrument(skip_all, fields(block = self.header.number, candidates = txs.len()))]
    pub fn commit_transactions(
        &mut self,
        env: &dyn ExecutionEnvironment,
        txs: &[SignedTransaction],
        gas_price: U256,
    ) -> CommitOutcome {
        let mut gas_pool = GasPool::new(self.header.gas_limit.saturating_sub(self.header.gas_used));
        let mut outcome = CommitOutcome::default();

        for tx in txs {
            let from = tx.sender();
            let hash = tx.hash();

            if tx.is_protected() && !self.config.is_replay_protected(self.header.number) {
                trace!(
                    tx = %hex::encode(&hash[..4]),
                    "[miner] Replay protected transaction ignored until the fork activates"
                );
                continue;
            }

            let owned = self.owned_accounts.contains(&from);
            if tx.gas_price < gas_price && !owned {
                self.low_gas_transactors.insert(from);
                info!(
                    "[miner] transaction({}) below gas price (tx={} ask={}). All sequential txs from this address({}) will be ignored",
                    hex::encode(&hash[..4]),
                    tx.gas_price,
                    gas_price,
                    hex::encode(&from[..4])
                );
            }

            if self.low_gas_transactors.contains(&from) {
                if !owned {
                    self.low_gas_txs.push(hash);
                }
                continue;
            }

            if self.ignored_transactors.contains(&from) {
                continue;
            }

            self.state.lock().start_record(hash, ZERO_HASH, self.txs.len());

            match self.commit_transaction(env, tx, &mut gas_pool) {
                Err(err) if err.is_gas_limit() => {
                    self.ignored_transactors.insert(from);
                    debug!(
                        "[miner] Gas limit reached for ({}) in this block. Continue to try smaller txs",
                        hex::encode(&from[..4])
                    );
                }
                Err(err) => {
                    self.remove.insert(hash);
                    debug!(
                        "[miner] TX ({}) failed, will be removed: {}",
                        hex::encode(&hash[..4]),
                        err
                    );
                }
                Ok(logs) => {
                    self.tcount += 1;
                    outcome.included += 1;
                    outcome.logs.extend(logs);
                }
            }
        }

        outcome.total = self.tcount;
        outcome
    }

    /// Apply one transaction, reverting state if it fails.
    pub fn commit_transaction(
        &mut self,
        env: &dyn ExecutionEnvironment,
        tx: &SignedTransaction,
        gas_pool: &mut GasPool,
    ) -> Result<Vec<Log>, ExecutionError> {
        let mut state = self.state.lock();
        let snapshot = state.snapshot();

        match env.apply_transaction(&self.config, &mut self.header, &mut **state, gas_pool, tx) {
            Ok((receipt, logs)) => {
                self.txs.push(tx.clone());
                self.receipts.push(receipt);
                Ok(logs)
            }
            Err(err) => {
                state.revert_to_snapshot(snapshot);
                Err(err)
            }
        }
    }
}
