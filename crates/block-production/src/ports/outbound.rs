//! Outbound ports (driven side - SPI)
//!
//! Everything the block producer relies on but does not own: state storage,
//! transaction execution, the chain store, the transaction pool, the
//! account manager, the consensus rules and the sealing agents.

use crate::domain::{ChainConfig, GasPool, MiningResult, Work};
use crate::error::{ChainError, ExecutionError, HeaderError, StateError};
use parking_lot::Mutex;
use primitive_types::U256;
use shared_types::{Address, Block, BlockHeader, Hash, Log, Receipt, SignedTransaction};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Port: mutable view over account state
///
/// Snapshots nest: reverting to a snapshot discards every change made after
/// it was taken, including later snapshots.
pub trait StateView: Send {
    /// Take a snapshot and return its id
    fn snapshot(&mut self) -> usize;

    /// Discard all changes made since snapshot `id`
    fn revert_to_snapshot(&mut self, id: usize);

    /// Attribute subsequent logs to this transaction
    fn start_record(&mut self, tx_hash: Hash, block_hash: Hash, tx_index: usize);

    /// Record a log for the current transaction, returning it with its
    /// placement fields filled in
    fn add_log(&mut self, log: Log) -> Log;

    /// All logs recorded in this view
    fn logs(&self) -> Vec<Log>;

    /// Logs recorded for one transaction
    fn tx_logs(&self, tx_hash: &Hash) -> Vec<Log>;

    /// Whether the account exists
    fn exists(&self, address: &Address) -> bool;

    /// Account balance
    fn balance(&self, address: &Address) -> U256;

    /// Credit an account
    fn add_balance(&mut self, address: &Address, amount: U256);

    /// Debit an account (saturating at zero)
    fn sub_balance(&mut self, address: &Address, amount: U256);

    /// Account nonce
    fn nonce(&self, address: &Address) -> u64;

    /// Set an account nonce
    fn set_nonce(&mut self, address: &Address, nonce: u64);

    /// Root over the current contents without persisting them
    fn intermediate_root(&mut self, delete_empty: bool) -> Hash;

    /// Persist the contents and return the root
    fn commit(&mut self, delete_empty: bool) -> Result<Hash, StateError>;

    /// Independent deep copy
    fn copy(&self) -> Box<dyn StateView>;
}

/// A state view shared between the current work and sealing agents.
pub type SharedState = Arc<Mutex<Box<dyn StateView>>>;

/// Port: opens state views by root
pub trait StateDatabase: Send + Sync {
    /// Open a view over the state committed under `root`
    fn open(&self, root: Hash) -> Result<Box<dyn StateView>, StateError>;
}

/// Port: applies one transaction
pub trait ExecutionEnvironment: Send + Sync {
    /// Apply `tx` on top of `state`.
    ///
    /// On success `header.gas_used` includes the gas consumed, the gas pool
    /// has been charged, and the receipt plus the transaction's logs are
    /// returned. On failure the caller reverts `state`.
    fn apply_transaction(
        &self,
        config: &ChainConfig,
        header: &mut BlockHeader,
        state: &mut dyn StateView,
        gas_pool: &mut GasPool,
        tx: &SignedTransaction,
    ) -> Result<(Receipt, Vec<Log>), ExecutionError>;
}

/// Where a written block landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// Became (part of) the canonical chain
    Canonical,
    /// Stored on a side fork
    Side,
}

/// Port: block persistence and lookup
pub trait ChainStore: Send + Sync {
    /// Current canonical head
    fn current_block(&self) -> Block;

    /// Block by hash
    fn get_block(&self, hash: &Hash) -> Option<Block>;

    /// Canonical block at `number`
    fn get_block_by_number(&self, number: u64) -> Option<Block>;

    /// The block at `hash` followed by up to `count - 1` of its ancestors
    fn get_blocks_from_hash(&self, hash: &Hash, count: usize) -> Vec<Block>;

    /// State committed under `root`
    fn state_at(&self, root: Hash) -> Result<Box<dyn StateView>, StateError>;

    /// Import blocks through full validation, returning how many were
    /// imported
    fn insert_chain(&self, blocks: Vec<Block>) -> Result<usize, ChainError>;

    /// Store a block without re-executing it
    fn write_block(&self, block: &Block) -> Result<WriteStatus, ChainError>;

    /// Index a canonical block's transactions
    fn write_transactions(&self, block: &Block) -> Result<(), ChainError>;

    /// Index receipts by transaction hash
    fn write_receipts(&self, receipts: &[Receipt]) -> Result<(), ChainError>;

    /// Record the block's bloom for range log queries
    fn write_mipmap_bloom(&self, number: u64, receipts: &[Receipt]) -> Result<(), ChainError>;

    /// Store receipts under their block hash
    fn write_block_receipts(&self, hash: &Hash, receipts: &[Receipt]) -> Result<(), ChainError>;
}

/// Port: pending transactions
pub trait TransactionPool: Send + Sync {
    /// All executable transactions
    fn pending(&self) -> Vec<SignedTransaction>;

    /// Evict transactions
    fn remove_transactions(&self, hashes: &[Hash]);
}

/// Port: locally held accounts
pub trait AccountManager: Send + Sync {
    /// Addresses the node owns
    fn accounts(&self) -> Vec<Address>;
}

/// Port: consensus rules
pub trait ConsensusRules: Send + Sync {
    /// Difficulty of a block at `time` on top of the given parent
    fn calc_difficulty(
        &self,
        config: &ChainConfig,
        time: u64,
        parent_time: u64,
        parent_number: u64,
        parent_difficulty: U256,
    ) -> U256;

    /// Gas limit of a child of `parent`
    fn calc_gas_limit(&self, parent: &Block) -> u64;

    /// Credit block and uncle rewards
    fn accumulate_rewards(
        &self,
        config: &ChainConfig,
        state: &mut dyn StateView,
        header: &BlockHeader,
        uncles: &[BlockHeader],
    );

    /// Check a header against its parent at local time `now`.
    ///
    /// [`HeaderError::FutureBlock`] is reported only when every other check
    /// passed.
    fn validate_header(
        &self,
        config: &ChainConfig,
        header: &BlockHeader,
        parent: &BlockHeader,
        now: u64,
    ) -> Result<(), HeaderError>;
}

/// Proof-of-work seal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seal {
    /// Winning nonce
    pub nonce: u64,
    /// Mix digest
    pub mix_digest: Hash,
}

/// Port: proof-of-work engine
pub trait PowEngine: Send + Sync {
    /// Search for a seal until found or `stop` is raised
    fn search(&self, block: &Block, stop: &AtomicBool) -> Option<Seal>;

    /// Whether the header carries a valid seal
    fn verify(&self, header: &BlockHeader) -> bool;

    /// Recent hashes per second
    fn hash_rate(&self) -> u64;
}

/// Port: a sealing agent
///
/// Agents receive [`Work`] over their work channel and report back on the
/// return channel. `None` reports an abandoned or failed attempt.
pub trait Agent: Send + Sync {
    /// Channel to deliver work on; `None` while the agent is not accepting
    fn work_channel(&self) -> Option<mpsc::Sender<Arc<Work>>>;

    /// Channel to report results on
    fn set_return_channel(&self, tx: mpsc::Sender<Option<MiningResult>>);

    /// Begin accepting work
    fn start(&self);

    /// Abandon current work and stop accepting more
    fn stop(&self);

    /// Recent hashes per second
    fn hash_rate(&self) -> u64;

    /// Ephemeral agents are dropped when mining stops
    fn is_ephemeral(&self) -> bool {
        false
    }
}
