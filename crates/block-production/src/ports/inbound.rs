//! Inbound ports (driving side - API)

use super::outbound::{Agent, SharedState};
use async_trait::async_trait;
use primitive_types::U256;
use shared_types::{Address, Block};
use std::sync::Arc;

/// Primary port: block production control surface
#[async_trait]
pub trait BlockProducerService: Send + Sync {
    /// Start mining: registered agents begin sealing and a fresh cycle is
    /// assembled
    async fn start(&self);

    /// Stop mining: agents abandon their work and ephemeral agents are
    /// dropped
    async fn stop(&self);

    /// Add a sealing agent
    async fn register(&self, agent: Arc<dyn Agent>);

    /// Stop and remove a sealing agent
    async fn unregister(&self, agent: &Arc<dyn Agent>);

    /// Set the reward beneficiary for future blocks
    async fn set_coinbase(&self, coinbase: Address);

    /// Set the minimum gas price; the stored floor is 90% of it
    async fn set_minimum_gas_price(&self, price: U256);

    /// The pending block and its state
    async fn pending(&self) -> Option<(Block, SharedState)>;

    /// Whether mining is on
    fn is_mining(&self) -> bool;

    /// Combined hash rate of all agents
    async fn hash_rate(&self) -> u64;
}
