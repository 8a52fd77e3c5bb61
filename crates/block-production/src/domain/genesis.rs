//! Genesis block construction.

use crate::error::StateError;
use crate::ports::outbound::StateDatabase;
use primitive_types::U256;
use serde::Deserialize;
use shared_types::{empty_root, Address, Block, BlockHeader};

/// Parameters of block zero and its pre-funded accounts.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GenesisSpec {
    /// Reward beneficiary recorded in the genesis header
    pub coinbase: Address,
    /// Starting difficulty
    pub difficulty: U256,
    /// Starting gas limit
    pub gas_limit: u64,
    /// Genesis timestamp
    pub timestamp: u64,
    /// Header extra data
    pub extra_data: Vec<u8>,
    /// Initial balances
    pub alloc: Vec<(Address, U256)>,
}

impl Default for GenesisSpec {
    fn default() -> Self {
        Self {
            coinbase: [0u8; 20],
            difficulty: U256::from(131_072u64),
            gas_limit: 4_712_388,
            timestamp: 0,
            extra_data: Vec::new(),
            alloc: Vec::new(),
        }
    }
}

impl GenesisSpec {
    /// Commit the allocation to `states` and return the genesis block.
    pub fn commit(&self, states: &dyn StateDatabase) -> Result<Block, StateError> {
        let mut state = states.open(empty_root())?;
        for (address, balance) in &self.alloc {
            state.add_balance(address, *balance);
        }
        let state_root = state.commit(false)?;

        let header = BlockHeader {
            coinbase: self.coinbase,
            state_root,
            difficulty: self.difficulty,
            number: 0,
            gas_limit: self.gas_limit,
            timestamp: self.timestamp,
            extra_data: self.extra_data.clone(),
            ..BlockHeader::default()
        };
        Ok(Block::new(header, Vec::new(), Vec::new(), &[]))
    }
}
