//! In-memory chain store.
//!
//! Keeps every block it has seen, a canonical number index chosen by total
//! difficulty, and the lookup indices the producer writes after sealing:
//! transaction positions, receipts by transaction, receipts by block and
//! per-block bloom summaries.
//!
//! `insert_chain` is the full-validation path: headers are checked against
//! the consensus rules and every transaction is re-executed on the parent
//! state before the block is written. With an event bus attached, imports
//! announce `ChainHead`/`ChainUpdated` for canonical blocks and `ChainSide`
//! for the rest.

use super::memory_state::MemoryStateDb;
use crate::domain::{make_block_chain, ChainConfig, ChainContext, GasPool};
use crate::error::{ChainError, StateError};
use crate::ports::outbound::{
    ChainStore, ConsensusRules, ExecutionEnvironment, StateDatabase, StateView, WriteStatus,
};
use crate::utils::unix_now;
use parking_lot::RwLock;
use primitive_types::U256;
use shared_bus::{BlockchainEvent, InMemoryEventBus};
use shared_types::{Block, Bloom, Hash, Receipt};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a transaction was included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxLookup {
    /// Including block
    pub block_hash: Hash,
    /// Including block number
    pub number: u64,
    /// Position in the block
    pub index: usize,
}

#[derive(Default)]
struct ChainIndex {
    blocks: HashMap<Hash, Block>,
    total_difficulty: HashMap<Hash, U256>,
    canonical: BTreeMap<u64, Hash>,
    head: Hash,

    tx_lookup: HashMap<Hash, TxLookup>,
    receipts: HashMap<Hash, Receipt>,
    block_receipts: HashMap<Hash, Vec<Receipt>>,
    mipmap: BTreeMap<u64, Bloom>,
}

impl ChainIndex {
    /// Make `hash` the head, rewriting the canonical index back to the
    /// common ancestor.
    fn set_head(&mut self, hash: Hash) {
        let Some(head) = self.blocks.get(&hash) else {
            return;
        };
        let head_number = head.number();
        self.canonical.retain(|number, _| *number <= head_number);

        let mut cursor = Some(hash);
        while let Some(current) = cursor {
            let Some(block) = self.blocks.get(&current) else {
                break;
            };
            if self.canonical.get(&block.number()) == Some(&current) {
                break;
            }
            self.canonical.insert(block.number(), current);
            cursor = (block.number() > 0).then(|| block.parent_hash());
        }
        self.head = hash;
    }
}

/// Chain store kept entirely in memory.
pub struct MemoryChain {
    config: Arc<ChainConfig>,
    rules: Arc<dyn ConsensusRules>,
    executor: Arc<dyn ExecutionEnvironment>,
    states: MemoryStateDb,
    bus: Option<Arc<InMemoryEventBus>>,
    index: RwLock<ChainIndex>,
    fail_writes: AtomicBool,
}

impl MemoryChain {
    /// Chain holding only `genesis`, whose state must already be in
    /// `states`.
    pub fn new(
        config: Arc<ChainConfig>,
        rules: Arc<dyn ConsensusRules>,
        executor: Arc<dyn ExecutionEnvironment>,
        states: MemoryStateDb,
        genesis: Block,
    ) -> Self {
        let hash = genesis.hash();
        let mut index = ChainIndex::default();
        index.total_difficulty.insert(hash, genesis.difficulty());
        index.canonical.insert(genesis.number(), hash);
        index.blocks.insert(hash, genesis);
        index.head = hash;

        Self {
            config,
            rules,
            executor,
            states,
            bus: None,
            index: RwLock::new(index),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Announce imports on `bus`.
    pub fn with_bus(mut self, bus: Arc<InMemoryEventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Import `n` generated empty blocks on top of the head. `seed` makes
    /// competing extensions distinct.
    pub fn extend_canonical(&self, n: usize, seed: u8) -> Result<Vec<Block>, ChainError> {
        let head = self.current_block();
        let ctx = ChainContext {
            config: &self.config,
            rules: self.rules.as_ref(),
            executor: self.executor.as_ref(),
            states: &self.states,
        };
        let blocks = make_block_chain(&ctx, &head, n, seed)?;
        self.insert_chain(blocks.clone())?;
        Ok(blocks)
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Fork schedule the chain validates with.
    pub fn config(&self) -> &Arc<ChainConfig> {
        &self.config
    }

    /// State database backing the chain.
    pub fn states(&self) -> &MemoryStateDb {
        &self.states
    }

    /// Total difficulty up to and including `hash`.
    pub fn total_difficulty(&self, hash: &Hash) -> Option<U256> {
        self.index.read().total_difficulty.get(hash).copied()
    }

    /// Inclusion position of a canonical transaction.
    pub fn transaction_lookup(&self, tx_hash: &Hash) -> Option<TxLookup> {
        self.index.read().tx_lookup.get(tx_hash).copied()
    }

    /// Receipt of a canonical transaction.
    pub fn receipt(&self, tx_hash: &Hash) -> Option<Receipt> {
        self.index.read().receipts.get(tx_hash).cloned()
    }

    /// Receipts stored under a block hash.
    pub fn block_receipts(&self, hash: &Hash) -> Option<Vec<Receipt>> {
        self.index.read().block_receipts.get(hash).cloned()
    }

    /// Bloom summary written for block `number`.
    pub fn mipmap_bloom(&self, number: u64) -> Option<Bloom> {
        self.index.read().mipmap.get(&number).cloned()
    }

    fn check_writable(&self) -> Result<(), ChainError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ChainError::Write("chain store rejected the write".into()));
        }
        Ok(())
    }

    fn post(&self, event: BlockchainEvent) {
        if let Some(bus) = &self.bus {
            bus.send(event);
        }
    }

    /// Re-execute `block` on its parent state and commit the result.
    fn process(&self, block: &Block, parent: &Block) -> Result<Vec<Receipt>, ChainError> {
        let mut state = self.states.open(parent.header.state_root)?;
        let mut header = block.header.clone();
        header.gas_used = 0;
        let mut gas_pool = GasPool::new(header.gas_limit);
        let hash = block.hash();

        let mut receipts = Vec::with_capacity(block.transactions.len());
        for (index, tx) in block.transactions.iter().enumerate() {
            state.start_record(tx.hash(), hash, index);
            let (receipt, _) = self
                .executor
                .apply_transaction(&self.config, &mut header, state.as_mut(), &mut gas_pool, tx)
                .map_err(|source| ChainError::Execution { index, source })?;
            receipts.push(receipt);
        }
        if header.gas_used != block.header.gas_used {
            return Err(ChainError::GasUsedMismatch {
                header: block.header.gas_used,
                computed: header.gas_used,
            });
        }

        self.rules
            .accumulate_rewards(&self.config, state.as_mut(), &block.header, &block.uncles);
        let computed = state.intermediate_root(false);
        if computed != block.header.state_root {
            return Err(ChainError::StateRootMismatch {
                header: block.header.state_root,
                computed,
            });
        }
        state.commit(false)?;
        Ok(receipts)
    }
}

impl std::fmt::Debug for MemoryChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let index = self.index.read();
        f.debug_struct("MemoryChain")
            .field("blocks", &index.blocks.len())
            .field("head", &hex::encode(&index.head[..4]))
            .finish()
    }
}

impl ChainStore for MemoryChain {
    fn current_block(&self) -> Block {
        let index = self.index.read();
        index.blocks.get(&index.head).cloned().unwrap_or_default()
    }

    fn get_block(&self, hash: &Hash) -> Option<Block> {
        self.index.read().blocks.get(hash).cloned()
    }

    fn get_block_by_number(&self, number: u64) -> Option<Block> {
        let index = self.index.read();
        index
            .canonical
            .get(&number)
            .and_then(|hash| index.blocks.get(hash))
            .cloned()
    }

    fn get_blocks_from_hash(&self, hash: &Hash, count: usize) -> Vec<Block> {
        let index = self.index.read();
        let mut blocks = Vec::with_capacity(count);
        let mut cursor = *hash;
        while blocks.len() < count {
            let Some(block) = index.blocks.get(&cursor) else {
                break;
            };
            blocks.push(block.clone());
            if block.number() == 0 {
                break;
            }
            cursor = block.parent_hash();
        }
        blocks
    }

    fn state_at(&self, root: Hash) -> Result<Box<dyn StateView>, StateError> {
        self.states.open(root)
    }

    fn insert_chain(&self, blocks: Vec<Block>) -> Result<usize, ChainError> {
        let mut imported = 0;
        for block in blocks {
            let hash = block.hash();
            if self.get_block(&hash).is_some() {
                debug!(number = block.number(), "[miner] block already known, skipping import");
                continue;
            }
            let parent = self
                .get_block(&block.parent_hash())
                .ok_or(ChainError::UnknownParent(block.parent_hash()))?;

            self.rules
                .validate_header(&self.config, &block.header, &parent.header, unix_now())?;
            let receipts = self.process(&block, &parent)?;

            match self.write_block(&block)? {
                WriteStatus::Canonical => {
                    self.write_transactions(&block)?;
                    self.write_receipts(&receipts)?;
                    self.write_mipmap_bloom(block.number(), &receipts)?;
                    let logs = receipts.iter().flat_map(|r| r.logs.clone()).collect();
                    self.post(BlockchainEvent::ChainUpdated {
                        block: block.clone(),
                        hash,
                        logs,
                    });
                    self.post(BlockchainEvent::ChainHead {
                        block: block.clone(),
                    });
                }
                WriteStatus::Side => {
                    self.post(BlockchainEvent::ChainSide {
                        block: block.clone(),
                    });
                }
            }
            self.write_block_receipts(&hash, &receipts)?;
            imported += 1;
        }
        Ok(imported)
    }

    fn write_block(&self, block: &Block) -> Result<WriteStatus, ChainError> {
        self.check_writable()?;
        let hash = block.hash();
        let mut index = self.index.write();

        let parent_td = index
            .total_difficulty
            .get(&block.parent_hash())
            .copied()
            .ok_or(ChainError::UnknownParent(block.parent_hash()))?;
        let local_td = index
            .total_difficulty
            .get(&index.head)
            .copied()
            .unwrap_or_default();
        let extern_td = parent_td.saturating_add(block.difficulty());

        index.total_difficulty.insert(hash, extern_td);
        index.blocks.insert(hash, block.clone());

        if extern_td > local_td {
            if block.parent_hash() != index.head {
                info!(
                    "[miner] Chain reorg to #{} ({})",
                    block.number(),
                    hex::encode(&hash[..4])
                );
            }
            index.set_head(hash);
            Ok(WriteStatus::Canonical)
        } else {
            Ok(WriteStatus::Side)
        }
    }

    fn write_transactions(&self, block: &Block) -> Result<(), ChainError> {
        self.check_writable()?;
        let block_hash = block.hash();
        let mut index = self.index.write();
        for (position, tx) in block.transactions.iter().enumerate() {
            index.tx_lookup.insert(
                tx.hash(),
                TxLookup {
                    block_hash,
                    number: block.number(),
                    index: position,
                },
            );
        }
        Ok(())
    }

    fn write_receipts(&self, receipts: &[Receipt]) -> Result<(), ChainError> {
        self.check_writable()?;
        let mut index = self.index.write();
        for receipt in receipts {
            index.receipts.insert(receipt.tx_hash, receipt.clone());
        }
        Ok(())
    }

    fn write_mipmap_bloom(&self, number: u64, receipts: &[Receipt]) -> Result<(), ChainError> {
        self.check_writable()?;
        let mut bloom = Bloom::default();
        for receipt in receipts {
            bloom.accrue_bloom(&receipt.bloom);
        }
        self.index.write().mipmap.insert(number, bloom);
        Ok(())
    }

    fn write_block_receipts(&self, hash: &Hash, receipts: &[Receipt]) -> Result<(), ChainError> {
        if let Err(err) = self.check_writable() {
            warn!("[miner] failed writing block receipts: {}", err);
            return Err(err);
        }
        self.index
            .write()
            .block_receipts
            .insert(*hash, receipts.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::TransferExecutor;
    use crate::domain::{generate_chain, DefaultRules, GenesisSpec};
    use crate::test_utils::{transfer, ALICE};
    use shared_bus::EventFilter;

    fn chain() -> MemoryChain {
        let states = MemoryStateDb::new();
        let genesis = GenesisSpec {
            alloc: vec![(ALICE, U256::from(10u64).pow(U256::from(18)))],
            ..GenesisSpec::default()
        }
        .commit(&states)
        .unwrap();
        MemoryChain::new(
            Arc::new(ChainConfig::default()),
            Arc::new(DefaultRules::default()),
            Arc::new(TransferExecutor),
            states,
            genesis,
        )
    }

    fn ctx(chain: &MemoryChain) -> ChainContext<'_> {
        ChainContext {
            config: &chain.config,
            rules: chain.rules.as_ref(),
            executor: chain.executor.as_ref(),
            states: &chain.states,
        }
    }

    #[test]
    fn test_extend_canonical_moves_head() {
        let chain = chain();
        let blocks = chain.extend_canonical(3, 0).unwrap();
        assert_eq!(chain.current_block().hash(), blocks[2].hash());
        assert_eq!(chain.get_block_by_number(2).unwrap().hash(), blocks[1].hash());
        assert_eq!(chain.get_blocks_from_hash(&blocks[2].hash(), 10).len(), 4);
    }

    #[test]
    fn test_heavier_fork_reorgs() {
        let chain = chain();
        let genesis = chain.current_block();
        let short = chain.extend_canonical(1, 1).unwrap();

        let long = make_block_chain(&ctx(&chain), &genesis, 2, 2).unwrap();
        assert_eq!(chain.insert_chain(long.clone()).unwrap(), 2);

        assert_eq!(chain.current_block().hash(), long[1].hash());
        assert_eq!(chain.get_block_by_number(1).unwrap().hash(), long[0].hash());
        assert!(chain.get_block(&short[0].hash()).is_some());
    }

    #[test]
    fn test_side_block_is_announced() {
        let bus = Arc::new(InMemoryEventBus::new());
        let chain = chain().with_bus(bus.clone());
        let mut sub = bus.subscribe(EventFilter::all());
        let genesis = chain.current_block();
        chain.extend_canonical(2, 1).unwrap();

        let side = make_block_chain(&ctx(&chain), &genesis, 1, 9).unwrap();
        chain.insert_chain(side.clone()).unwrap();

        let mut side_seen = false;
        while let Ok(Some(event)) = sub.try_recv() {
            if let BlockchainEvent::ChainSide { block } = event {
                side_seen = block.hash() == side[0].hash();
            }
        }
        assert!(side_seen);
    }

    #[test]
    fn test_import_reexecutes_and_indexes() {
        let chain = chain();
        let genesis = chain.current_block();
        let (blocks, _) = generate_chain(&ctx(&chain), &genesis, 1, |_, block| {
            block.add_tx(transfer(ALICE, 0, 1))
        })
        .unwrap();
        chain.insert_chain(blocks.clone()).unwrap();

        let tx_hash = blocks[0].transactions[0].hash();
        let lookup = chain.transaction_lookup(&tx_hash).unwrap();
        assert_eq!(lookup.number, 1);
        assert_eq!(lookup.index, 0);
        assert!(chain.receipt(&tx_hash).is_some());
        assert_eq!(chain.block_receipts(&blocks[0].hash()).unwrap().len(), 1);
        assert!(chain.mipmap_bloom(1).is_some());
    }

    #[test]
    fn test_tampered_root_is_rejected() {
        let chain = chain();
        let genesis = chain.current_block();
        let mut blocks = make_block_chain(&ctx(&chain), &genesis, 1, 0).unwrap();
        blocks[0].header.state_root = [0xAA; 32];

        assert!(matches!(
            chain.insert_chain(blocks),
            Err(ChainError::StateRootMismatch { .. })
        ));
        assert_eq!(chain.current_block().hash(), genesis.hash());
    }

    #[test]
    fn test_unknown_parent() {
        let chain = chain();
        let orphan = Block::with_header(shared_types::BlockHeader {
            parent_hash: [0x42; 32],
            number: 7,
            ..Default::default()
        });
        assert!(matches!(
            chain.write_block(&orphan),
            Err(ChainError::UnknownParent(_))
        ));
        assert!(matches!(
            chain.insert_chain(vec![orphan]),
            Err(ChainError::UnknownParent(_))
        ));
    }

    #[test]
    fn test_failing_writes() {
        let chain = chain();
        chain.fail_writes(true);
        assert!(matches!(chain.extend_canonical(1, 0), Err(ChainError::Write(_))));
    }
}
