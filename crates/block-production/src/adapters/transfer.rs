//! Value-transfer execution environment.
//!
//! Executes plain transfers: nonce, intrinsic gas and balance checks, gas
//! purchase against the block pool, refund of unused gas and fee payment
//! to the coinbase. A transaction with call data emits one log carrying
//! the data, topic `keccak(data)`.

use crate::domain::{ChainConfig, GasPool};
use crate::error::ExecutionError;
use crate::ports::outbound::{ExecutionEnvironment, StateView};
use primitive_types::U256;
use shared_types::{keccak256, Address, BlockHeader, Log, Receipt, ReceiptStatus, SignedTransaction};

/// Base cost of any transaction.
pub const TX_GAS: u64 = 21_000;
/// Cost per non-zero data byte.
pub const TX_DATA_NON_ZERO_GAS: u64 = 68;
/// Cost per zero data byte.
pub const TX_DATA_ZERO_GAS: u64 = 4;

/// Gas charged before execution starts.
pub fn intrinsic_gas(data: &[u8]) -> u64 {
    let non_zero = data.iter().filter(|byte| **byte != 0).count() as u64;
    let zero = data.len() as u64 - non_zero;
    TX_GAS + non_zero * TX_DATA_NON_ZERO_GAS + zero * TX_DATA_ZERO_GAS
}

/// Address of a contract created by `sender` at `nonce`.
pub fn create_address(sender: &Address, nonce: u64) -> Address {
    let mut bytes = [0u8; 28];
    bytes[..20].copy_from_slice(sender);
    bytes[20..].copy_from_slice(&nonce.to_be_bytes());
    let hash = keccak256(&bytes);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}

/// Executes value transfers. Stateless.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransferExecutor;

impl TransferExecutor {
    /// New executor.
    pub fn new() -> Self {
        Self
    }

    fn check(
        &self,
        config: &ChainConfig,
        header: &BlockHeader,
        state: &dyn StateView,
        tx: &SignedTransaction,
    ) -> Result<u64, ExecutionError> {
        if tx.is_protected() {
            let expected = config.chain_id_at(header.number);
            let got = tx.chain_id().unwrap_or_default();
            if got != expected {
                return Err(ExecutionError::InvalidChainId { expected, got });
            }
        }

        let from = tx.sender();
        let nonce = state.nonce(&from);
        if tx.nonce < nonce {
            return Err(ExecutionError::NonceTooLow { state: nonce, tx: tx.nonce });
        }
        if tx.nonce > nonce {
            return Err(ExecutionError::NonceTooHigh { state: nonce, tx: tx.nonce });
        }

        let need = intrinsic_gas(&tx.data);
        if tx.gas_limit < need {
            return Err(ExecutionError::IntrinsicGas {
                need,
                limit: tx.gas_limit,
            });
        }

        let balance = state.balance(&from);
        let cost = tx.cost();
        if balance < cost {
            return Err(ExecutionError::InsufficientFunds { balance, cost });
        }
        Ok(need)
    }
}

impl ExecutionEnvironment for TransferExecutor {
    fn apply_transaction(
        &self,
        config: &ChainConfig,
        header: &mut BlockHeader,
        state: &mut dyn StateView,
        gas_pool: &mut GasPool,
        tx: &SignedTransaction,
    ) -> Result<(Receipt, Vec<Log>), ExecutionError> {
        let gas_used = self.check(config, header, state, tx)?;
        gas_pool.sub_gas(tx.gas_limit)?;

        let from = tx.sender();
        let nonce = state.nonce(&from);
        state.sub_balance(&from, tx.gas_price.saturating_mul(U256::from(tx.gas_limit)));
        state.set_nonce(&from, nonce + 1);

        let recipient = tx.to.unwrap_or_else(|| create_address(&from, nonce));
        state.sub_balance(&from, tx.value);
        state.add_balance(&recipient, tx.value);

        let refund = tx.gas_limit - gas_used;
        state.add_balance(&from, tx.gas_price.saturating_mul(U256::from(refund)));
        gas_pool.add_gas(refund);
        state.add_balance(
            &header.coinbase,
            tx.gas_price.saturating_mul(U256::from(gas_used)),
        );

        let mut logs = Vec::new();
        if !tx.data.is_empty() {
            logs.push(state.add_log(Log {
                address: recipient,
                topics: vec![keccak256(&tx.data)],
                data: tx.data.clone(),
                block_number: header.number,
                ..Log::default()
            }));
        }

        header.gas_used += gas_used;
        let receipt = Receipt::new(
            tx.hash(),
            ReceiptStatus::Success,
            header.gas_used,
            gas_used,
            logs.clone(),
        );
        Ok((receipt, logs))
    }
}
