//! Shared node wiring for integration tests.

use block_production::{
    ChainConfig, ChainContext, ChainStore, DefaultRules, GenesisSpec, MemoryChain, MemoryStateDb,
    MemoryTxPool, MinerConfig, MinerDependencies, MiningCoordinator, RulesConfig, StaticAccounts,
    TransferExecutor,
};
use primitive_types::U256;
use shared_bus::{BlockchainEvent, InMemoryEventBus, Subscription};
use shared_types::{Address, SignedTransaction};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

/// Upper bound for anything the background loops do.
pub const WAIT: Duration = Duration::from_secs(10);
const TICK: Duration = Duration::from_millis(10);

/// Reward beneficiary of the node under test.
pub const MINER: Address = [0x4D; 20];
/// Account the node owns.
pub const OWNER: Address = [0x0A; 20];
/// Funded account the node does not own.
pub const USER: Address = [0x05; 20];
/// Recipient of test transfers.
pub const SINK: Address = [0xEE; 20];

/// Route logs to the test harness once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A chain, a pool and the shared bus, ready for a coordinator.
pub struct Node {
    pub bus: Arc<InMemoryEventBus>,
    pub chain: Arc<MemoryChain>,
    pub pool: Arc<MemoryTxPool>,
    pub rules: DefaultRules,
    pub executor: TransferExecutor,
}

impl Node {
    /// Genesis funding [`OWNER`] and [`USER`].
    pub fn new() -> Self {
        Self::with_rules(RulesConfig::default())
    }

    /// Node whose genesis starts at the rules' minimum difficulty.
    pub fn with_rules(config: RulesConfig) -> Self {
        init_tracing();
        let bus = Arc::new(InMemoryEventBus::new());
        let states = MemoryStateDb::new();
        let funded = U256::from(10u64).pow(U256::from(20));
        let genesis = GenesisSpec {
            difficulty: config.minimum_difficulty,
            alloc: vec![(OWNER, funded), (USER, funded)],
            ..GenesisSpec::default()
        }
        .commit(&states)
        .expect("genesis commits");
        let rules = DefaultRules::new(config).expect("rules config is valid");

        let chain = MemoryChain::new(
            Arc::new(ChainConfig::default()),
            Arc::new(rules.clone()),
            Arc::new(TransferExecutor::new()),
            states,
            genesis,
        )
        .with_bus(bus.clone());

        Self {
            pool: Arc::new(MemoryTxPool::new().with_bus(bus.clone())),
            chain: Arc::new(chain),
            bus,
            rules,
            executor: TransferExecutor::new(),
        }
    }

    /// Collaborators for a coordinator on this node.
    pub fn deps(&self) -> MinerDependencies {
        MinerDependencies {
            chain: self.chain.clone(),
            pool: self.pool.clone(),
            accounts: Arc::new(StaticAccounts::new(vec![OWNER])),
            rules: Arc::new(self.rules.clone()),
            executor: Arc::new(self.executor),
            bus: self.bus.clone(),
        }
    }

    /// Coordinator paying [`MINER`].
    pub async fn miner(&self, config: MinerConfig) -> MiningCoordinator {
        let config = MinerConfig {
            coinbase: MINER,
            ..config
        };
        MiningCoordinator::spawn(config, Arc::new(ChainConfig::default()), self.deps())
            .await
            .expect("coordinator starts")
    }

    /// Generation context over this node's state.
    pub fn context(&self) -> ChainContext<'_> {
        ChainContext {
            config: self.chain.config().as_ref(),
            rules: &self.rules,
            executor: &self.executor,
            states: self.chain.states(),
        }
    }

    /// Wait until the canonical head reaches `number`.
    pub async fn wait_for_head(&self, number: u64) {
        timeout(WAIT, async {
            while self.chain.current_block().number() < number {
                sleep(TICK).await;
            }
        })
        .await
        .expect("head advanced");
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

/// Transfer of one unit to [`SINK`].
pub fn transfer(from: Address, nonce: u64, gas_price: u64) -> SignedTransaction {
    SignedTransaction {
        from,
        to: Some(SINK),
        value: U256::one(),
        nonce,
        gas_price: U256::from(gas_price),
        gas_limit: 21_000,
        ..SignedTransaction::default()
    }
}

/// Next event accepted by `pick`.
pub async fn wait_for_event(
    sub: &mut Subscription,
    pick: impl Fn(&BlockchainEvent) -> bool,
) -> BlockchainEvent {
    timeout(WAIT, async {
        loop {
            let event = sub.recv().await.expect("bus open");
            if pick(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event published")
}
