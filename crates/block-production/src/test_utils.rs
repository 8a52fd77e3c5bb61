//! Shared fixtures for unit tests.

use crate::adapters::MemoryStateDb;
use crate::domain::{ChainConfig, LocalMinedBlocks, Work};
use crate::ports::StateDatabase;
use primitive_types::U256;
use shared_types::{empty_root, Address, BlockHeader, SignedTransaction};
use std::sync::Arc;

pub const ALICE: Address = [0xA1; 20];
pub const BOB: Address = [0xB0; 20];
pub const CAROL: Address = [0xC4; 20];
pub const SINK: Address = [0xEE; 20];

/// Work for block 1 with the given gas limit over an empty state.
pub fn work_with_gas_limit(gas_limit: u64) -> Work {
    let state = MemoryStateDb::new()
        .open(empty_root())
        .expect("empty root always opens");
    let header = BlockHeader {
        number: 1,
        gas_limit,
        ..BlockHeader::default()
    };
    Work::new(
        Arc::new(ChainConfig::default()),
        header,
        state,
        LocalMinedBlocks::shared(6),
    )
}

/// Work for block `number` with a roomy gas limit.
pub fn empty_work(number: u64) -> Work {
    let mut work = work_with_gas_limit(1_000_000);
    work.header.number = number;
    work
}

/// Give every account plenty of balance.
pub fn fund(work: &Work, accounts: &[Address]) {
    let mut state = work.state.lock();
    for account in accounts {
        state.add_balance(account, U256::from(10u64).pow(U256::from(18)));
    }
}

/// Plain value transfer to [`SINK`].
pub fn transfer(from: Address, nonce: u64, gas_price: u64) -> SignedTransaction {
    SignedTransaction {
        from,
        to: Some(SINK),
        value: U256::from(1),
        nonce,
        gas_price: U256::from(gas_price),
        gas_limit: 21_000,
        ..SignedTransaction::default()
    }
}
