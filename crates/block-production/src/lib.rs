//! # Block Production Engine
//!
//! Assembles candidate blocks on top of the canonical head, hands them to
//! sealing agents, and writes the sealed results back to the chain.
//!
//! ## Purpose
//!
//! One assembly cycle:
//! - drafts a header (timestamp, difficulty, gas limit, coinbase, extra)
//! - opens a fresh [`Work`] on the parent's committed state
//! - selects pending transactions by price and nonce against a gas pool
//! - accepts up to two uncles from recent side blocks
//! - credits rewards and freezes the block
//! - dispatches it to every running [`Agent`]
//!
//! Sealed results are written directly (fast path) or imported through
//! full chain validation, announced on the event bus, checked for
//! staleness, and tracked until they are buried deep enough to count as
//! confirmed.
//!
//! ## Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  Adapters (Outer)                                   │
//! │  - CPU agent, PoW engines                           │
//! │  - In-memory chain, state, pool, accounts           │
//! │  - Transfer execution environment                   │
//! └─────────────────────────────────────────────────────┘
//!                         │
//! ┌─────────────────────────────────────────────────────┐
//! │  Service                                            │
//! │  - MiningCoordinator: assembly, dispatch, drain,    │
//! │    event reaction                                   │
//! └─────────────────────────────────────────────────────┘
//!                         │
//! ┌─────────────────────────────────────────────────────┐
//! │  Ports (Middle)                                     │
//! │  - Inbound: BlockProducerService                    │
//! │  - Outbound: ChainStore, TransactionPool, Agent ... │
//! └─────────────────────────────────────────────────────┘
//!                         │
//! ┌─────────────────────────────────────────────────────┐
//! │  Domain (Inner - Pure Logic)                        │
//! │  - Work, selection, uncle checks, gas pool          │
//! │  - Consensus rules, chain config, chain generation  │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Critical Invariants
//!
//! 1. **Gas Limit**: a block never uses more gas than its limit
//! 2. **Uncles**: at most two per block, each hanging off a recent ancestor
//!    and never claimed twice within the family
//! 3. **Lock Order**: control state, then uncle pool, then current work
//! 4. **Single Writer**: exactly one current work per coordinator
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! let miner = MiningCoordinator::spawn(config, chain_config, deps).await?;
//! miner.register(Arc::new(CpuAgent::new(Arc::new(Sha256dPow::new(4)), 1))).await;
//! miner.start().await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

/// Agents, engines and in-memory collaborators
pub mod adapters;
/// Domain models and block construction logic
pub mod domain;
pub mod ports;
pub mod service;
pub mod utils;

mod config;
mod error;
mod metrics;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::{MinerConfig, RulesConfig, MAX_EXTRA_DATA};
pub use error::{
    BlockProductionError, ChainError, ChainMakerError, ExecutionError, GasPoolError, HeaderError,
    Result, StateError, UncleError,
};
pub use metrics::Metrics;

// Re-export commonly used types
pub use domain::{
    generate_chain, make_block_chain, make_header_chain, sort_by_price_and_nonce, BlockGen,
    ChainConfig, ChainContext, CommitOutcome, DefaultRules, Fork, ForkFeature, GasPool,
    GenesisSpec, LocalMinedBlocks, MiningResult, Work,
};

pub use ports::{
    AccountManager, Agent, BlockProducerService, ChainStore, ConsensusRules, ExecutionEnvironment,
    PowEngine, Seal, SharedState, StateDatabase, StateView, TransactionPool, WriteStatus,
};

pub use adapters::{
    CpuAgent, FakePow, MemoryChain, MemoryState, MemoryStateDb, MemoryTxPool, Sha256dPow,
    StaticAccounts, TransferExecutor,
};

pub use service::{MinerDependencies, MiningCoordinator};
