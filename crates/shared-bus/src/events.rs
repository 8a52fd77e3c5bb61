//! # Blockchain Events
//!
//! Defines all event types that flow through the shared bus.
//!
//! The chain store and transaction pool publish on [`EventTopic::Chain`] and
//! [`EventTopic::TxPool`]; the block producer consumes those and publishes on
//! [`EventTopic::Miner`].

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use shared_types::entities::{Block, Hash, Log, SignedTransaction};

/// All events that can be published to the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BlockchainEvent {
    // =========================================================================
    // CHAIN STORE
    // =========================================================================
    /// A new canonical head was adopted.
    ChainHead {
        /// The new head.
        block: Block,
    },

    /// A block was stored on a side fork. Candidate uncle material.
    ChainSide {
        /// The side block.
        block: Block,
    },

    /// A block was written together with its logs.
    ChainUpdated {
        /// The written block.
        block: Block,
        /// Its hash.
        hash: Hash,
        /// Logs emitted by its transactions.
        logs: Vec<Log>,
    },

    // =========================================================================
    // TRANSACTION POOL
    // =========================================================================
    /// A transaction entered the pool.
    TxPre {
        /// The admitted transaction.
        tx: SignedTransaction,
    },

    // =========================================================================
    // MINER
    // =========================================================================
    /// A locally sealed block was accepted into the chain.
    NewMinedBlock {
        /// The sealed block.
        block: Block,
    },

    /// Logs of a locally mined block that became canonical.
    MinedLogs {
        /// The logs, stamped with the block hash.
        logs: Vec<Log>,
    },

    /// Logs produced while speculatively applying pending transactions.
    PendingLogs {
        /// The speculative logs.
        logs: Vec<Log>,
    },

    /// The pending block changed.
    PendingState,

    /// The effective gas-price floor changed.
    GasPriceChanged {
        /// The new floor.
        price: U256,
    },
}

impl BlockchainEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::ChainHead { .. } | Self::ChainSide { .. } | Self::ChainUpdated { .. } => {
                EventTopic::Chain
            }
            Self::TxPre { .. } => EventTopic::TxPool,
            Self::NewMinedBlock { .. }
            | Self::MinedLogs { .. }
            | Self::PendingLogs { .. }
            | Self::PendingState
            | Self::GasPriceChanged { .. } => EventTopic::Miner,
        }
    }

    /// Short name for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ChainHead { .. } => "chain_head",
            Self::ChainSide { .. } => "chain_side",
            Self::ChainUpdated { .. } => "chain_updated",
            Self::TxPre { .. } => "tx_pre",
            Self::NewMinedBlock { .. } => "new_mined_block",
            Self::MinedLogs { .. } => "mined_logs",
            Self::PendingLogs { .. } => "pending_logs",
            Self::PendingState => "pending_state",
            Self::GasPriceChanged { .. } => "gas_price_changed",
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Chain store events.
    Chain,
    /// Transaction pool events.
    TxPool,
    /// Block producer events.
    Miner,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self { topics }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &BlockchainEvent) -> bool {
        self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_topic_mapping() {
        let head = BlockchainEvent::ChainHead {
            block: Block::default(),
        };
        assert_eq!(head.topic(), EventTopic::Chain);
        assert_eq!(head.name(), "chain_head");

        let tx = BlockchainEvent::TxPre {
            tx: SignedTransaction::default(),
        };
        assert_eq!(tx.topic(), EventTopic::TxPool);

        assert_eq!(BlockchainEvent::PendingState.topic(), EventTopic::Miner);
    }

    #[test]
    fn test_filter_all() {
        let filter = EventFilter::all();
        assert!(filter.matches(&BlockchainEvent::PendingState));
    }

    #[test]
    fn test_filter_by_topic() {
        let filter = EventFilter::topics(vec![EventTopic::Chain, EventTopic::TxPool]);

        let side = BlockchainEvent::ChainSide {
            block: Block::default(),
        };
        assert!(filter.matches(&side));

        let price = BlockchainEvent::GasPriceChanged {
            price: U256::from(1),
        };
        assert!(!filter.matches(&price));
    }

    #[test]
    fn test_all_topic_matches_everything() {
        let filter = EventFilter::topics(vec![EventTopic::All]);
        assert!(filter.matches(&BlockchainEvent::MinedLogs { logs: vec![] }));
    }
}
