//! Configuration types for block production

use crate::error::{BlockProductionError, Result};
use primitive_types::{U256, U512};
use serde::Deserialize;
use shared_types::Address;

/// Maximum extra-data length accepted in a header.
pub const MAX_EXTRA_DATA: usize = 32;

/// Runtime configuration for the block producer
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// Initial reward beneficiary
    pub coinbase: Address,

    /// Initial minimum gas price (before the tolerance is applied)
    pub min_gas_price: U256,

    /// Initial header extra data
    pub extra_data: Vec<u8>,

    /// Blocks behind the head at which a locally mined block is reported
    /// as confirmed
    pub confirmation_depth: u64,

    /// Capacity of the result channel agents report on
    pub result_queue_size: usize,

    /// Capacity of each CPU agent's work channel
    pub work_queue_size: usize,

    /// Maximum uncles per block
    pub max_uncles: usize,

    /// Recent ancestors eligible as uncle parents
    pub ancestor_depth: usize,

    /// How far ahead of the local clock a draft timestamp may run before
    /// assembly waits
    pub max_future_secs: u64,

    /// Percentage of the requested minimum gas price that becomes the
    /// effective floor
    pub gas_price_tolerance_pct: u64,

    /// Import sealed blocks through the chain's full validation path
    /// instead of the direct write path
    pub full_validation: bool,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            coinbase: [0u8; 20],
            min_gas_price: U256::zero(),
            extra_data: Vec::new(),
            confirmation_depth: 5,
            result_queue_size: 10,
            work_queue_size: 1,
            max_uncles: 2,
            ancestor_depth: 7,
            max_future_secs: 4,
            gas_price_tolerance_pct: 90,
            full_validation: false,
        }
    }
}

impl MinerConfig {
    /// Reject configurations the producer cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.result_queue_size == 0 {
            return Err(BlockProductionError::InvalidConfig(
                "result_queue_size must be non-zero".into(),
            ));
        }
        if self.work_queue_size == 0 {
            return Err(BlockProductionError::InvalidConfig(
                "work_queue_size must be non-zero".into(),
            ));
        }
        if self.extra_data.len() > MAX_EXTRA_DATA {
            return Err(BlockProductionError::InvalidConfig(format!(
                "extra_data is {} bytes, max {}",
                self.extra_data.len(),
                MAX_EXTRA_DATA
            )));
        }
        if self.gas_price_tolerance_pct > 100 {
            return Err(BlockProductionError::InvalidConfig(format!(
                "gas_price_tolerance_pct {} above 100",
                self.gas_price_tolerance_pct
            )));
        }
        Ok(())
    }

    /// Effective floor for a requested minimum gas price.
    pub fn price_floor(&self, requested: U256) -> U256 {
        let scaled = requested.full_mul(U256::from(self.gas_price_tolerance_pct)) / U512::from(100u64);
        U256::try_from(scaled).unwrap_or(U256::MAX)
    }
}

/// Consensus parameters used by the default rules
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Difficulty floor
    pub minimum_difficulty: U256,

    /// Parent difficulty divisor for each adjustment step
    pub difficulty_bound_divisor: u64,

    /// Block time below which difficulty rises
    pub duration_limit: u64,

    /// Gas limit floor
    pub min_gas_limit: u64,

    /// Gas limit the chain drifts towards while under it
    pub target_gas_limit: u64,

    /// Parent gas limit divisor bounding each change
    pub gas_limit_bound_divisor: u64,

    /// Reward for sealing a block
    pub block_reward: U256,

    /// Seconds a header timestamp may run ahead of the local clock
    pub allowed_future_secs: u64,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            minimum_difficulty: U256::from(131_072u64),
            difficulty_bound_divisor: 2048,
            duration_limit: 13,
            min_gas_limit: 5000,
            target_gas_limit: 4_712_388,
            gas_limit_bound_divisor: 1024,
            // 5 ether
            block_reward: U256::from(5_000_000_000_000_000_000u128),
            allowed_future_secs: 15,
        }
    }
}

impl RulesConfig {
    /// Reject parameters the rules would divide by zero with.
    pub fn validate(&self) -> Result<()> {
        if self.difficulty_bound_divisor == 0 {
            return Err(BlockProductionError::InvalidConfig(
                "difficulty_bound_divisor must be non-zero".into(),
            ));
        }
        if self.gas_limit_bound_divisor == 0 {
            return Err(BlockProductionError::InvalidConfig(
                "gas_limit_bound_divisor must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
