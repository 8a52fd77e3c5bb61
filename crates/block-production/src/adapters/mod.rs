//! Adapters layer - in-memory collaborators and sealing back-ends
//!
//! Every outbound port has an implementation here so the producer runs
//! standalone: state, execution, chain store, transaction pool, accounts,
//! proof-of-work engines and the CPU agent.

mod cpu_agent;
mod memory_chain;
mod memory_pool;
mod memory_state;
mod pow;
mod transfer;

pub use cpu_agent::CpuAgent;
pub use memory_chain::{MemoryChain, TxLookup};
pub use memory_pool::{MemoryTxPool, StaticAccounts};
pub use memory_state::{MemoryState, MemoryStateDb};
pub use pow::{FakePow, Sha256dPow};
pub use transfer::{create_address, intrinsic_gas, TransferExecutor};
