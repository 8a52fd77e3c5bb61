//! Domain layer - block construction logic
//!
//! Everything here is synchronous. Collaborators are reached through the
//! traits in [`crate::ports`].
//!
//! - [`Work`]: the per-cycle construction context
//! - [`GasPool`]: block-level gas accounting
//! - [`ChainConfig`]: fork schedule
//! - [`DefaultRules`]: difficulty, gas limit, rewards, header checks
//! - [`sort_by_price_and_nonce`]: candidate ordering
//! - [`generate_chain`]: deterministic chain generation

pub mod chain_config;
pub mod chain_maker;
mod gas_pool;
pub mod genesis;
mod local_mined;
mod ordering;
pub mod rules;
mod selection;
mod work;

pub use chain_config::{ChainConfig, Fork, ForkFeature, REPLAY_PROTECTION_FEATURE};
pub use chain_maker::{
    generate_chain, make_block_chain, make_header, make_header_chain, BlockGen, ChainContext,
};
pub use gas_pool::GasPool;
pub use genesis::GenesisSpec;
pub use local_mined::{LocalMinedBlocks, SharedMinedBlocks};
pub use ordering::sort_by_price_and_nonce;
pub use rules::DefaultRules;
pub use selection::CommitOutcome;
pub use work::{MiningResult, Work};
