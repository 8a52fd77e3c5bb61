//! Result drain: write sealed blocks and start the next cycle.

use super::Inner;
use crate::domain::MiningResult;
use crate::error::{BlockProductionError, ChainError, Result};
use crate::ports::WriteStatus;
use crate::utils::unix_now;
use shared_bus::BlockchainEvent;
use shared_types::{Block, Log};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub(super) async fn drain_loop(inner: Arc<Inner>, mut results: mpsc::Receiver<Option<MiningResult>>) {
    while let Some(result) = results.recv().await {
        let _ = inner
            .at_work
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some((n - 1).max(0)));

        let Some(result) = result else {
            continue;
        };

        match inner.handle_result(&result) {
            Ok(stale) => {
                let block = &result.block;
                let label = if stale { "stale " } else { "" };
                info!(
                    "[miner] 🔨  Mined {}block (#{} / {})",
                    label,
                    block.number(),
                    hex::encode(&block.hash()[..4])
                );
                inner.metrics.record_mined(stale);
            }
            Err(err) => {
                inner.metrics.record_discarded();
                if err.is_critical() {
                    error!("[miner] sealed block discarded: {}", err);
                } else {
                    warn!("[miner] sealed block discarded: {}", err);
                }
            }
        }

        if let Err(err) = inner.assemble_next().await {
            warn!("[miner] failed to assemble next work: {}", err);
        }
    }
    info!("[miner] result channel closed, drain loop exiting");
}

impl Inner {
    /// Write one sealed block. Returns whether another block holds its
    /// height on the canonical chain.
    #[tracing::instrument(skip_all, fields(number = result.block.number()))]
    fn handle_result(&self, result: &MiningResult) -> Result<bool> {
        let block = &result.block;

        if self.config.full_validation {
            self.deps.chain.insert_chain(vec![block.clone()])?;
            self.post(vec![BlockchainEvent::NewMinedBlock {
                block: block.clone(),
            }]);
        } else {
            self.write_sealed(result)?;
        }

        let stale = self
            .deps
            .chain
            .get_block_by_number(block.number())
            .is_some_and(|canonical| canonical.hash() != block.hash());
        if !stale {
            result.work.local_mined().lock().push(block.number());
        }
        Ok(stale)
    }

    /// Commit the already-executed state and store the block without
    /// re-running its transactions.
    fn write_sealed(&self, result: &MiningResult) -> Result<()> {
        let block = &result.block;
        let work = &result.work;
        let chain = &self.deps.chain;

        work.state().lock().commit(false)?;

        let parent = chain
            .get_block(&block.parent_hash())
            .ok_or(ChainError::UnknownParent(block.parent_hash()))?;
        if let Err(err) =
            self.deps
                .rules
                .validate_header(&self.chain_config, &block.header, &parent.header, unix_now())
        {
            if !err.is_future_block() {
                return Err(BlockProductionError::Chain(err.into()));
            }
        }

        let status = chain.write_block(block)?;

        let hash = block.hash();
        let mut receipts = work.receipts().to_vec();
        for receipt in &mut receipts {
            for log in &mut receipt.logs {
                log.block_hash = hash;
            }
        }
        let logs: Vec<Log> = work
            .state()
            .lock()
            .logs()
            .into_iter()
            .map(|mut log| {
                log.block_hash = hash;
                log
            })
            .collect();

        if status == WriteStatus::Canonical {
            let number = block.number();
            if let Err(err) = chain.write_transactions(block) {
                warn!("[miner] could not index transactions of block #{}: {}", number, err);
            }
            if let Err(err) = chain.write_receipts(&receipts) {
                warn!("[miner] could not index receipts of block #{}: {}", number, err);
            }
            if let Err(err) = chain.write_mipmap_bloom(number, &receipts) {
                warn!("[miner] could not store bloom of block #{}: {}", number, err);
            }
        }

        if let Err(err) = chain.write_block_receipts(&hash, &receipts) {
            warn!("[miner] could not store receipts of block #{}: {}", block.number(), err);
        }
        self.post(announcements(block, status, logs));
        Ok(())
    }
}

fn announcements(block: &Block, status: WriteStatus, logs: Vec<Log>) -> Vec<BlockchainEvent> {
    let mut events = vec![
        BlockchainEvent::NewMinedBlock {
            block: block.clone(),
        },
        BlockchainEvent::ChainUpdated {
            block: block.clone(),
            hash: block.hash(),
            logs: logs.clone(),
        },
    ];
    if status == WriteStatus::Canonical {
        events.push(BlockchainEvent::ChainHead {
            block: block.clone(),
        });
        events.push(BlockchainEvent::MinedLogs { logs });
    }
    events
}
