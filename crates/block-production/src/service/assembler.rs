//! One assembly cycle: draft header, fresh work, transactions, uncles,
//! rewards, dispatch.

use super::{ControlState, Inner};
use crate::domain::{sort_by_price_and_nonce, LocalMinedBlocks, Work};
use crate::error::Result;
use crate::utils::unix_now;
use shared_types::{Address, Block, BlockHeader, Hash};
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, trace};

impl Inner {
    /// Build the next candidate on top of the canonical head and hand it to
    /// the agents.
    #[tracing::instrument(skip_all)]
    pub(super) async fn assemble_next(&self) -> Result<()> {
        let state = self.state.lock().await;
        let mut uncles = self.uncles.lock().await;
        let mut current = self.current.lock().await;

        let started = Instant::now();
        let parent = self.deps.chain.current_block();

        let now = unix_now();
        let timestamp = now.max(parent.timestamp() + 1);
        if timestamp > now + self.config.max_future_secs {
            let wait = Duration::from_secs(timestamp - now);
            info!("[miner] We are too far in the future. Waiting for {:?}", wait);
            tokio::time::sleep(wait).await;
        }

        let header = self.draft_header(&state, &parent, timestamp);
        let previous = current.take();
        let mut work = match self.make_current(&parent, header, previous.as_deref()) {
            Ok(work) => work,
            Err(err) => {
                *current = previous;
                return Err(err);
            }
        };

        let pending = sort_by_price_and_nonce(self.deps.pool.pending());
        let outcome =
            work.commit_transactions(self.deps.executor.as_ref(), &pending, state.gas_price);
        self.deps.pool.remove_transactions(&work.evictions());
        self.post(outcome.events());

        let accepted = self.select_uncles(&mut work, &mut uncles);

        let mining = self.mining.load(Ordering::SeqCst);
        if mining {
            let mut view = work.state.lock();
            self.deps
                .rules
                .accumulate_rewards(&self.chain_config, &mut **view, &work.header, &accepted);
            work.header.state_root = view.intermediate_root(false);
        }

        let block = Block::new(
            work.header.clone(),
            work.txs.clone(),
            accepted.clone(),
            &work.receipts,
        );
        let number = block.number();
        work.block = Some(block);

        let took = started.elapsed();
        self.metrics.record_work(work.tcount, accepted.len(), took);
        if mining {
            info!(
                "[miner] commit new work on block {} with {} txs & {} uncles. Took {:?}",
                number,
                work.tcount,
                accepted.len(),
                took
            );
            if let Some(previous) = previous.as_deref() {
                self.log_local_mined_blocks(&state, &work, previous);
            }
        }

        let work = Arc::new(work);
        *current = Some(work.clone());
        self.push(&state, work);
        Ok(())
    }

    fn draft_header(&self, state: &ControlState, parent: &Block, timestamp: u64) -> BlockHeader {
        BlockHeader {
            parent_hash: parent.hash(),
            number: parent.number() + 1,
            difficulty: self.deps.rules.calc_difficulty(
                &self.chain_config,
                timestamp,
                parent.timestamp(),
                parent.number(),
                parent.difficulty(),
            ),
            gas_limit: self.deps.rules.calc_gas_limit(parent),
            gas_used: 0,
            coinbase: state.coinbase,
            extra_data: state.extra.clone(),
            timestamp,
            ..BlockHeader::default()
        }
    }

    /// Fresh work on the parent's committed state.
    fn make_current(
        &self,
        parent: &Block,
        header: BlockHeader,
        previous: Option<&Work>,
    ) -> Result<Work> {
        let view = self.deps.chain.state_at(parent.header.state_root)?;
        let local_mined = match previous {
            Some(previous) => previous.local_mined().clone(),
            None => LocalMinedBlocks::shared(self.config.confirmation_depth as usize + 1),
        };

        let mut work = Work::new(self.chain_config.clone(), header, view, local_mined);
        for ancestor in self
            .deps
            .chain
            .get_blocks_from_hash(&parent.hash(), self.config.ancestor_depth)
        {
            work.add_ancestor(&ancestor);
        }
        work.set_owned_accounts(self.deps.accounts.accounts());
        Ok(work)
    }

    /// Accept up to the configured number of uncles, dropping every
    /// candidate that fails.
    fn select_uncles(&self, work: &mut Work, pool: &mut HashMap<Hash, Block>) -> Vec<BlockHeader> {
        let mut accepted = Vec::new();
        let mut bad = Vec::new();

        for (hash, uncle) in pool.iter() {
            if accepted.len() == self.config.max_uncles {
                break;
            }
            match work.commit_uncle(&uncle.header) {
                Ok(()) => accepted.push(uncle.header.clone()),
                Err(err) => {
                    trace!("[miner] Bad uncle found and will be removed ({}): {}", hex::encode(&hash[..4]), err);
                    bad.push(*hash);
                }
            }
        }
        for hash in bad {
            pool.remove(&hash);
        }
        accepted
    }

    /// Report blocks that crossed the confirmation depth since the previous
    /// cycle.
    fn log_local_mined_blocks(&self, state: &ControlState, current: &Work, previous: &Work) {
        let depth = self.config.confirmation_depth;
        let from = previous
            .block()
            .map(Block::number)
            .unwrap_or(previous.header.number);
        let to = current.header.number;

        for check in from..to {
            let Some(inspect) = check.checked_sub(depth) else {
                continue;
            };
            if self.is_block_locally_mined(current, state.coinbase, inspect) {
                info!("[miner] 🔨 🔗  Mined {} blocks back: block #{}", depth, inspect);
                self.metrics.record_confirmed();
            }
        }
    }

    /// Whether `number` was sealed here and still pays `coinbase`. A hit is
    /// cleared from the ring so it is reported once.
    fn is_block_locally_mined(&self, current: &Work, coinbase: Address, number: u64) -> bool {
        if !current.local_mined().lock().take(number) {
            return false;
        }
        self.coinbase_of_canonical(number) == Some(coinbase)
    }

    /// Offer `work` to every agent that is accepting work.
    fn push(&self, state: &ControlState, work: Arc<Work>) {
        if !self.mining.load(Ordering::SeqCst) {
            return;
        }
        for agent in &state.agents {
            let Some(channel) = agent.work_channel() else {
                continue;
            };
            match channel.try_send(work.clone()) {
                Ok(()) => {
                    self.at_work.fetch_add(1, Ordering::SeqCst);
                }
                Err(TrySendError::Full(_)) => debug!("[miner] agent busy, work skipped"),
                Err(TrySendError::Closed(_)) => debug!("[miner] agent stopped, work skipped"),
            }
        }
    }
}
