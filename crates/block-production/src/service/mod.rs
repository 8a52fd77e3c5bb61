//! Mining coordinator
//!
//! Owns the sealing agents, assembles one candidate block per cycle,
//! dispatches it, drains sealed results and reacts to chain events.
//!
//! Two background tasks run for the lifetime of the coordinator:
//!
//! - the **update loop** reacts to `ChainHead` (reassemble), `ChainSide`
//!   (remember as uncle candidate) and `TxPre` (apply to the pending state
//!   while not mining);
//! - the **drain loop** writes sealed blocks, tracks staleness and
//!   confirmations and always starts the next cycle.
//!
//! Shared state sits behind three locks, always taken in the same order:
//! control state, then the uncle pool, then the current work.

mod assembler;
mod events;
mod results;


use crate::config::{MinerConfig, MAX_EXTRA_DATA};
use crate::domain::{ChainConfig, MiningResult, Work};
use crate::error::{BlockProductionError, Result};
use crate::metrics::Metrics;
use crate::ports::{
    AccountManager, Agent, BlockProducerService, ChainStore, ConsensusRules, ExecutionEnvironment,
    SharedState, TransactionPool,
};
use async_trait::async_trait;
use primitive_types::U256;
use shared_bus::{BlockchainEvent, EventFilter, EventPublisher, EventTopic, InMemoryEventBus};
use shared_types::{Address, Block, Hash};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// External collaborators of the coordinator.
#[derive(Clone)]
pub struct MinerDependencies {
    /// Chain store
    pub chain: Arc<dyn ChainStore>,
    /// Pending transactions
    pub pool: Arc<dyn TransactionPool>,
    /// Node-owned accounts
    pub accounts: Arc<dyn AccountManager>,
    /// Difficulty, gas limit, rewards and header checks
    pub rules: Arc<dyn ConsensusRules>,
    /// Transaction execution
    pub executor: Arc<dyn ExecutionEnvironment>,
    /// Where chain and pool events arrive and miner events leave
    pub bus: Arc<InMemoryEventBus>,
}

/// Control state guarded by the first lock.
struct ControlState {
    agents: Vec<Arc<dyn Agent>>,
    coinbase: Address,
    gas_price: U256,
    extra: Vec<u8>,
}

struct Inner {
    config: MinerConfig,
    chain_config: Arc<ChainConfig>,
    deps: MinerDependencies,

    state: Mutex<ControlState>,
    uncles: Mutex<HashMap<Hash, Block>>,
    current: Mutex<Option<Arc<Work>>>,

    mining: AtomicBool,
    at_work: AtomicI64,
    result_tx: mpsc::Sender<Option<MiningResult>>,
    metrics: Metrics,
}

impl Inner {
    /// Publish without waiting for delivery.
    fn post(&self, events: Vec<BlockchainEvent>) {
        if events.is_empty() {
            return;
        }
        let bus = self.deps.bus.clone();
        tokio::spawn(async move {
            for event in events {
                bus.publish(event).await;
            }
        });
    }

    fn coinbase_of_canonical(&self, number: u64) -> Option<Address> {
        self.deps
            .chain
            .get_block_by_number(number)
            .map(|block| block.coinbase())
    }
}

fn same_agent(a: &Arc<dyn Agent>, b: &Arc<dyn Agent>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Block producer driving a set of sealing agents.
pub struct MiningCoordinator {
    inner: Arc<Inner>,
    tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl MiningCoordinator {
    /// Start the background loops and assemble the first candidate.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn spawn(
        config: MinerConfig,
        chain_config: Arc<ChainConfig>,
        deps: MinerDependencies,
    ) -> Result<Self> {
        config.validate()?;

        info!("[miner] Initializing mining coordinator");
        info!("  Coinbase: {}", hex::encode(config.coinbase));
        info!("  Confirmation depth: {}", config.confirmation_depth);
        info!("  Full validation: {}", config.full_validation);

        let (result_tx, result_rx) = mpsc::channel(config.result_queue_size);
        let subscription = deps
            .bus
            .subscribe(EventFilter::topics(vec![EventTopic::Chain, EventTopic::TxPool]));

        let control = ControlState {
            agents: Vec::new(),
            coinbase: config.coinbase,
            gas_price: config.price_floor(config.min_gas_price),
            extra: config.extra_data.clone(),
        };
        let inner = Arc::new(Inner {
            config,
            chain_config,
            deps,
            state: Mutex::new(control),
            uncles: Mutex::new(HashMap::new()),
            current: Mutex::new(None),
            mining: AtomicBool::new(false),
            at_work: AtomicI64::new(0),
            result_tx,
            metrics: Metrics::new(),
        });

        let tasks = vec![
            tokio::spawn(events::update_loop(inner.clone(), subscription)),
            tokio::spawn(results::drain_loop(inner.clone(), result_rx)),
        ];

        if let Err(err) = inner.assemble_next().await {
            warn!("[miner] initial work not assembled: {}", err);
        }

        Ok(Self {
            inner,
            tasks: parking_lot::Mutex::new(tasks),
        })
    }

    /// Rebuild the current work now.
    pub async fn commit_new_work(&self) -> Result<()> {
        self.inner.assemble_next().await
    }

    /// Set the header extra data for future blocks.
    pub async fn set_extra(&self, extra: Vec<u8>) -> Result<()> {
        if extra.len() > MAX_EXTRA_DATA {
            return Err(BlockProductionError::InvalidConfig(format!(
                "extra data is {} bytes, max {}",
                extra.len(),
                MAX_EXTRA_DATA
            )));
        }
        self.inner.state.lock().await.extra = extra;
        Ok(())
    }

    /// Current reward beneficiary.
    pub async fn coinbase(&self) -> Address {
        self.inner.state.lock().await.coinbase
    }

    /// Effective gas price floor.
    pub async fn gas_price(&self) -> U256 {
        self.inner.state.lock().await.gas_price
    }

    /// Results dispatched but not yet drained.
    pub fn in_flight(&self) -> i64 {
        self.inner.at_work.load(Ordering::SeqCst)
    }

    /// Number of registered agents.
    pub async fn agent_count(&self) -> usize {
        self.inner.state.lock().await.agents.len()
    }

    /// Number of uncle candidates held.
    pub async fn uncle_candidates(&self) -> usize {
        self.inner.uncles.lock().await.len()
    }

    /// The current work, if any was assembled.
    pub async fn current_work(&self) -> Option<Arc<Work>> {
        self.inner.current.lock().await.clone()
    }

    /// Recently sealed block numbers, oldest first.
    pub async fn local_mined_blocks(&self) -> Vec<u64> {
        match self.inner.current.lock().await.as_ref() {
            Some(work) => work.local_mined().lock().numbers(),
            None => Vec::new(),
        }
    }

    /// Whether this node sealed canonical block `number` and it still pays
    /// the current coinbase.
    pub async fn is_locally_mined(&self, number: u64) -> bool {
        let coinbase = self.coinbase().await;
        let recorded = match self.inner.current.lock().await.as_ref() {
            Some(work) => work.local_mined().lock().contains(number),
            None => false,
        };
        recorded && self.inner.coinbase_of_canonical(number) == Some(coinbase)
    }

    /// Production counters.
    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    /// Stop mining and end both background loops.
    pub async fn shutdown(&self) {
        self.stop().await;
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        info!("[miner] Mining coordinator shut down");
    }
}

#[async_trait]
impl BlockProducerService for MiningCoordinator {
    async fn start(&self) {
        {
            let state = self.inner.state.lock().await;
            self.inner.mining.store(true, Ordering::SeqCst);
            for agent in &state.agents {
                agent.start();
            }
        }
        info!("[miner] Starting mining operation");
        if let Err(err) = self.inner.assemble_next().await {
            warn!("[miner] failed to assemble work on start: {}", err);
        }
    }

    async fn stop(&self) {
        let mut state = self.inner.state.lock().await;
        if self.inner.mining.load(Ordering::SeqCst) {
            for agent in &state.agents {
                agent.stop();
            }
            state.agents.retain(|agent| !agent.is_ephemeral());
            info!("[miner] Mining stopped");
        }
        self.inner.mining.store(false, Ordering::SeqCst);
        self.inner.at_work.store(0, Ordering::SeqCst);
    }

    async fn register(&self, agent: Arc<dyn Agent>) {
        let mut state = self.inner.state.lock().await;
        agent.set_return_channel(self.inner.result_tx.clone());
        if self.inner.mining.load(Ordering::SeqCst) {
            agent.start();
        }
        state.agents.push(agent);
    }

    async fn unregister(&self, agent: &Arc<dyn Agent>) {
        let mut state = self.inner.state.lock().await;
        state.agents.retain(|known| !same_agent(known, agent));
        agent.stop();
    }

    async fn set_coinbase(&self, coinbase: Address) {
        self.inner.state.lock().await.coinbase = coinbase;
    }

    async fn set_minimum_gas_price(&self, price: U256) {
        let floor = self.inner.config.price_floor(price);
        self.inner.state.lock().await.gas_price = floor;
        info!("[miner] Minimum gas price set to {} (floor {})", price, floor);
        self.inner
            .post(vec![BlockchainEvent::GasPriceChanged { price: floor }]);
    }

    async fn pending(&self) -> Option<(Block, SharedState)> {
        let current = self.inner.current.lock().await;
        let work = current.as_ref()?;
        let state: SharedState = Arc::new(parking_lot::Mutex::new(work.state().lock().copy()));

        if self.inner.mining.load(Ordering::SeqCst) {
            if let Some(block) = work.block() {
                return Some((block.clone(), state));
            }
        }
        let block = Block::new(
            work.header().clone(),
            work.transactions().to_vec(),
            Vec::new(),
            work.receipts(),
        );
        Some((block, state))
    }

    fn is_mining(&self) -> bool {
        self.inner.mining.load(Ordering::SeqCst)
    }

    async fn hash_rate(&self) -> u64 {
        self.inner
            .state
            .lock()
            .await
            .agents
            .iter()
            .map(|agent| agent.hash_rate())
            .sum()
    }
}

impl Drop for MiningCoordinator {
    fn drop(&mut self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}
