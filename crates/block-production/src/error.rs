//! Error types for block production

use shared_types::{Address, Hash, U256};
use thiserror::Error;

fn short(hash: &Hash) -> String {
    hex::encode(&hash[..4])
}

/// Result type alias for block production operations
pub type Result<T> = std::result::Result<T, BlockProductionError>;

/// The block gas pool cannot cover a transaction's gas ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("gas limit reached: have {have}, want {want}")]
pub struct GasPoolError {
    /// Gas remaining in the pool
    pub have: u64,
    /// Gas requested
    pub want: u64,
}

/// Failure to apply one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// The block has no room left for this transaction's gas ceiling
    #[error(transparent)]
    GasLimitReached(#[from] GasPoolError),

    /// Nonce already used
    #[error("nonce too low: account has {state}, tx has {tx}")]
    NonceTooLow {
        /// Nonce recorded in state
        state: u64,
        /// Nonce carried by the transaction
        tx: u64,
    },

    /// Nonce gap
    #[error("nonce too high: account has {state}, tx has {tx}")]
    NonceTooHigh {
        /// Nonce recorded in state
        state: u64,
        /// Nonce carried by the transaction
        tx: u64,
    },

    /// Sender cannot pay `value + gas_price * gas_limit`
    #[error("insufficient funds: balance {balance}, cost {cost}")]
    InsufficientFunds {
        /// Sender balance
        balance: U256,
        /// Upfront cost
        cost: U256,
    },

    /// Gas ceiling below the intrinsic cost
    #[error("intrinsic gas too low: need {need}, limit {limit}")]
    IntrinsicGas {
        /// Intrinsic gas of the transaction
        need: u64,
        /// Gas ceiling of the transaction
        limit: u64,
    },

    /// Replay-protected signature for a different chain
    #[error("invalid chain id: expected {expected}, got {got}")]
    InvalidChainId {
        /// Chain id of this network
        expected: u64,
        /// Chain id in the signature
        got: u64,
    },

    /// Execution aborted
    #[error("execution reverted: {0}")]
    Reverted(String),

    /// State access failed
    #[error("state error: {0}")]
    State(String),
}

impl ExecutionError {
    /// Whether this is the block-level gas exhaustion signal. Every other
    /// variant condemns the transaction itself.
    pub fn is_gas_limit(&self) -> bool {
        matches!(self, Self::GasLimitReached(_))
    }
}

/// Rejection of an uncle candidate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UncleError {
    /// Already included in this block
    #[error("uncle not unique")]
    NotUnique,

    /// Its parent is not one of the recent ancestors
    #[error("uncle's parent unknown ({})", short(.0))]
    UnknownAncestor(Hash),

    /// Already an ancestor or already referenced as an uncle by one
    #[error("uncle already in family ({})", short(.0))]
    AlreadyInFamily(Hash),
}

/// Header consensus-rule violation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    /// Parent header not available
    #[error("unknown parent {}", short(.0))]
    UnknownParent(Hash),

    /// Number is not parent + 1
    #[error("invalid block number: have {have}, want {want}")]
    InvalidNumber {
        /// Header number
        have: u64,
        /// Expected number
        want: u64,
    },

    /// Timestamp not after the parent's
    #[error("timestamp {time} not after parent timestamp {parent_time}")]
    InvalidTimestamp {
        /// Header timestamp
        time: u64,
        /// Parent timestamp
        parent_time: u64,
    },

    /// Timestamp beyond the local clock allowance. Informational for
    /// self-mined blocks.
    #[error("future block: timestamp {time} > now {now}")]
    FutureBlock {
        /// Header timestamp
        time: u64,
        /// Local clock
        now: u64,
    },

    /// Extra data too long
    #[error("extra data too long: {len} > {max}")]
    ExtraDataTooLong {
        /// Length of the extra data
        len: usize,
        /// Maximum length
        max: usize,
    },

    /// Gas used above the gas limit
    #[error("gas used {used} exceeds gas limit {limit}")]
    GasUsedExceedsLimit {
        /// Gas used
        used: u64,
        /// Gas limit
        limit: u64,
    },

    /// Gas limit outside the allowed step from the parent
    #[error("invalid gas limit {have} (parent {parent})")]
    InvalidGasLimit {
        /// Header gas limit
        have: u64,
        /// Parent gas limit
        parent: u64,
    },

    /// Difficulty differs from the computed value
    #[error("invalid difficulty: have {have}, want {want}")]
    InvalidDifficulty {
        /// Header difficulty
        have: U256,
        /// Expected difficulty
        want: U256,
    },

    /// Seal does not satisfy the difficulty
    #[error("invalid proof-of-work seal")]
    InvalidSeal,
}

impl HeaderError {
    /// Whether the only objection is a timestamp ahead of the local clock.
    pub fn is_future_block(&self) -> bool {
        matches!(self, Self::FutureBlock { .. })
    }
}

/// State database failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// No state stored under this root
    #[error("missing state root {}", short(.0))]
    MissingRoot(Hash),

    /// Persisting the state failed
    #[error("state commit failed: {0}")]
    Commit(String),
}

/// Chain store failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// Parent block unknown
    #[error("unknown parent {}", short(.0))]
    UnknownParent(Hash),

    /// Header check failed during import
    #[error("invalid header: {0}")]
    Header(#[from] HeaderError),

    /// Transaction failed during re-execution
    #[error("invalid transaction {index}: {source}")]
    Execution {
        /// Position in the block
        index: usize,
        /// Execution failure
        source: ExecutionError,
    },

    /// Re-execution produced a different post-state
    #[error("state root mismatch: header {}, computed {}", short(.header), short(.computed))]
    StateRootMismatch {
        /// Root in the header
        header: Hash,
        /// Root after re-execution
        computed: Hash,
    },

    /// Re-execution consumed a different amount of gas
    #[error("gas used mismatch: header {header}, computed {computed}")]
    GasUsedMismatch {
        /// Gas used in the header
        header: u64,
        /// Gas used after re-execution
        computed: u64,
    },

    /// State access failed
    #[error(transparent)]
    State(#[from] StateError),

    /// Persisting failed
    #[error("write failed: {0}")]
    Write(String),

    /// Generating blocks to import failed
    #[error(transparent)]
    Generate(#[from] ChainMakerError),
}

/// Failure while generating a synthetic chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainMakerError {
    /// Coinbase set twice
    #[error("coinbase can only be set once")]
    CoinbaseAlreadySet,

    /// Coinbase set after transactions were added
    #[error("coinbase must be set before adding transactions")]
    CoinbaseAfterTransactions,

    /// Referenced block out of range
    #[error("block index {index} out of range ({len} blocks generated)")]
    BlockIndexOutOfRange {
        /// Requested index
        index: isize,
        /// Blocks generated so far
        len: usize,
    },

    /// Time offset would not advance past the parent
    #[error("block time out of range")]
    TimeOutOfRange,

    /// Account not present in the generated state
    #[error("account {} does not exist", hex::encode(.0))]
    MissingAccount(Address),

    /// Transaction failed to apply
    #[error("transaction failed: {0}")]
    Execution(#[from] ExecutionError),

    /// Parent state unavailable
    #[error("parent state unavailable: {0}")]
    MissingState(StateError),

    /// Committing generated state failed
    #[error("state commit failed: {0}")]
    StateCommit(StateError),
}

/// Errors surfaced by the block producer itself
#[derive(Debug, Error)]
pub enum BlockProductionError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Chain config could not be parsed
    #[error("Chain config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// Chain config file could not be read
    #[error("Chain config read error: {0}")]
    ConfigRead(#[from] std::io::Error),

    /// Parent state for the next block unavailable
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Chain store rejected an operation
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),
}

impl BlockProductionError {
    /// Check if error is recoverable (the next cycle may succeed)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::State(StateError::MissingRoot(_)) | Self::Chain(_))
    }

    /// Check if error is critical (the producer cannot continue)
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig(_)
                | Self::ConfigParse(_)
                | Self::ConfigRead(_)
                | Self::State(StateError::Commit(_))
        )
    }
}
