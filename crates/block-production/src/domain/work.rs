//! Per-cycle construction context for one candidate block.

use super::chain_config::ChainConfig;
use super::local_mined::SharedMinedBlocks;
use crate::error::UncleError;
use crate::ports::outbound::{SharedState, StateView};
use parking_lot::Mutex;
use shared_types::{Address, Block, BlockHeader, Hash, Receipt, SignedTransaction};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Everything needed to build, seal and commit one block.
///
/// Exactly one `Work` is current per producer. Agents receive shared
/// snapshots of it and hand them back inside a [`MiningResult`].
pub struct Work {
    pub(crate) config: Arc<ChainConfig>,
    pub(crate) state: SharedState,
    pub(crate) header: BlockHeader,
    pub(crate) block: Option<Block>,
    pub(crate) txs: Vec<SignedTransaction>,
    pub(crate) receipts: Vec<Receipt>,

    /// Hashes of the recent ancestors eligible as uncle parents
    pub(crate) ancestors: HashSet<Hash>,
    /// Ancestors plus the uncles they already reference
    pub(crate) family: HashSet<Hash>,
    /// Uncles accepted into this block
    pub(crate) uncles: HashSet<Hash>,

    /// Transactions that failed and should leave the pool
    pub(crate) remove: HashSet<Hash>,
    /// Underpriced transactions that should leave the pool
    pub(crate) low_gas_txs: Vec<Hash>,
    pub(crate) low_gas_transactors: HashSet<Address>,
    /// Senders whose next transaction hit the block gas limit
    pub(crate) ignored_transactors: HashSet<Address>,
    pub(crate) owned_accounts: HashSet<Address>,
    /// Transactions included so far
    pub(crate) tcount: usize,

    pub(crate) local_mined: SharedMinedBlocks,
    pub(crate) created_at: Instant,
}

impl Work {
    /// Fresh work for `header` on top of `state`.
    pub fn new(
        config: Arc<ChainConfig>,
        header: BlockHeader,
        state: Box<dyn StateView>,
        local_mined: SharedMinedBlocks,
    ) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(state)),
            header,
            block: None,
            txs: Vec::new(),
            receipts: Vec::new(),
            ancestors: HashSet::new(),
            family: HashSet::new(),
            uncles: HashSet::new(),
            remove: HashSet::new(),
            low_gas_txs: Vec::new(),
            low_gas_transactors: HashSet::new(),
            ignored_transactors: HashSet::new(),
            owned_accounts: HashSet::new(),
            tcount: 0,
            local_mined,
            created_at: Instant::now(),
        }
    }

    /// Copy with its own state, so changes to one never reach the other.
    pub fn detached(&self) -> Self {
        Self {
            config: self.config.clone(),
            state: Arc::new(Mutex::new(self.state.lock().copy())),
            header: self.header.clone(),
            block: self.block.clone(),
            txs: self.txs.clone(),
            receipts: self.receipts.clone(),
            ancestors: self.ancestors.clone(),
            family: self.family.clone(),
            uncles: self.uncles.clone(),
            remove: self.remove.clone(),
            low_gas_txs: self.low_gas_txs.clone(),
            low_gas_transactors: self.low_gas_transactors.clone(),
            ignored_transactors: self.ignored_transactors.clone(),
            owned_accounts: self.owned_accounts.clone(),
            tcount: self.tcount,
            local_mined: self.local_mined.clone(),
            created_at: self.created_at,
        }
    }

    /// Record a recent ancestor and the uncles it references.
    pub fn add_ancestor(&mut self, ancestor: &Block) {
        for uncle in &ancestor.uncles {
            self.family.insert(uncle.hash());
        }
        let hash = ancestor.hash();
        self.family.insert(hash);
        self.ancestors.insert(hash);
    }

    /// Replace the owned-account set.
    pub fn set_owned_accounts(&mut self, accounts: impl IntoIterator<Item = Address>) {
        self.owned_accounts = accounts.into_iter().collect();
    }

    /// Accept `uncle` if it is unique, hangs off a recent ancestor and is
    /// not already part of the family.
    pub fn commit_uncle(&mut self, uncle: &BlockHeader) -> Result<(), UncleError> {
        let hash = uncle.hash();
        if self.uncles.contains(&hash) {
            return Err(UncleError::NotUnique);
        }
        if !self.ancestors.contains(&uncle.parent_hash) {
            return Err(UncleError::UnknownAncestor(uncle.parent_hash));
        }
        if self.family.contains(&hash) {
            return Err(UncleError::AlreadyInFamily(hash));
        }
        self.uncles.insert(hash);
        Ok(())
    }

    /// Block to seal, once assembled.
    pub fn block(&self) -> Option<&Block> {
        self.block.as_ref()
    }

    /// Draft header.
    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    /// Included transactions.
    pub fn transactions(&self) -> &[SignedTransaction] {
        &self.txs
    }

    /// Receipts of the included transactions.
    pub fn receipts(&self) -> &[Receipt] {
        &self.receipts
    }

    /// Number of transactions included.
    pub fn tcount(&self) -> usize {
        self.tcount
    }

    /// State the block executes on.
    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Hashes scheduled for pool eviction: failed transactions followed by
    /// underpriced ones.
    pub fn evictions(&self) -> Vec<Hash> {
        let mut hashes: Vec<Hash> = self.remove.iter().copied().collect();
        hashes.extend(self.low_gas_txs.iter().copied());
        hashes
    }

    /// Block numbers this producer sealed recently.
    pub fn local_mined(&self) -> &SharedMinedBlocks {
        &self.local_mined
    }

    /// When assembly of this work started.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }
}

impl std::fmt::Debug for Work {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Work")
            .field("number", &self.header.number)
            .field("tcount", &self.tcount)
            .field("uncles", &self.uncles.len())
            .field("sealable", &self.block.is_some())
            .finish()
    }
}

/// A sealed block handed back by an agent together with its work.
#[derive(Clone, Debug)]
pub struct MiningResult {
    /// The work the block was built from
    pub work: Arc<Work>,
    /// The sealed block
    pub block: Block,
}
