//! CPU sealing agent.
//!
//! Receives work over a bounded channel and runs the proof-of-work search
//! on a blocking thread. New work, or a stop, abandons the search in
//! progress. Every search reports back exactly once: the sealed block, or
//! `None` when it was abandoned.

use crate::domain::{MiningResult, Work};
use crate::ports::outbound::{Agent, PowEngine};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

type AbortFlag = Arc<Mutex<Option<Arc<AtomicBool>>>>;

#[derive(Default)]
struct AgentState {
    work_tx: Option<mpsc::Sender<Arc<Work>>>,
    return_tx: Option<mpsc::Sender<Option<MiningResult>>>,
}

/// Agent searching with a [`PowEngine`] on the local CPU.
pub struct CpuAgent {
    engine: Arc<dyn PowEngine>,
    work_queue_size: usize,
    state: Mutex<AgentState>,
    current: AbortFlag,
}

impl CpuAgent {
    /// Agent over `engine` with a work channel of `work_queue_size`.
    pub fn new(engine: Arc<dyn PowEngine>, work_queue_size: usize) -> Self {
        Self {
            engine,
            work_queue_size: work_queue_size.max(1),
            state: Mutex::new(AgentState::default()),
            current: Arc::new(Mutex::new(None)),
        }
    }

    /// Whether the agent is accepting work.
    pub fn is_running(&self) -> bool {
        self.state.lock().work_tx.is_some()
    }

    fn abort_current(current: &AbortFlag) {
        if let Some(flag) = current.lock().take() {
            flag.store(true, Ordering::SeqCst);
        }
    }
}

async fn update_loop(
    engine: Arc<dyn PowEngine>,
    mut work_rx: mpsc::Receiver<Arc<Work>>,
    return_tx: mpsc::Sender<Option<MiningResult>>,
    current: AbortFlag,
) {
    while let Some(work) = work_rx.recv().await {
        let abort = Arc::new(AtomicBool::new(false));
        if let Some(previous) = current.lock().replace(abort.clone()) {
            previous.store(true, Ordering::SeqCst);
        }

        let engine = engine.clone();
        let return_tx = return_tx.clone();
        tokio::task::spawn_blocking(move || mine(engine.as_ref(), work, &abort, &return_tx));
    }
    CpuAgent::abort_current(&current);
    debug!("[miner] CPU agent work channel closed");
}

fn mine(
    engine: &dyn PowEngine,
    work: Arc<Work>,
    abort: &AtomicBool,
    return_tx: &mpsc::Sender<Option<MiningResult>>,
) {
    let result = work.block().and_then(|block| {
        engine.search(block, abort).map(|seal| {
            let sealed = block.with_seal(seal.nonce, seal.mix_digest);
            info!(
                "[miner] 🔨 Successfully sealed new block number={} hash={}",
                sealed.number(),
                hex::encode(&sealed.hash()[..4])
            );
            sealed
        })
    });
    let report = result.map(|block| MiningResult { work, block });
    if return_tx.blocking_send(report).is_err() {
        debug!("[miner] result channel closed, dropping search outcome");
    }
}

impl Agent for CpuAgent {
    fn work_channel(&self) -> Option<mpsc::Sender<Arc<Work>>> {
        self.state.lock().work_tx.clone()
    }

    fn set_return_channel(&self, tx: mpsc::Sender<Option<MiningResult>>) {
        self.state.lock().return_tx = Some(tx);
    }

    fn start(&self) {
        let mut state = self.state.lock();
        if state.work_tx.is_some() {
            return;
        }
        let Some(return_tx) = state.return_tx.clone() else {
            warn!("[miner] CPU agent started without a result channel");
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("[miner] CPU agent started outside a runtime");
            return;
        };

        let (work_tx, work_rx) = mpsc::channel(self.work_queue_size);
        state.work_tx = Some(work_tx);
        runtime.spawn(update_loop(
            self.engine.clone(),
            work_rx,
            return_tx,
            self.current.clone(),
        ));
    }

    fn stop(&self) {
        self.state.lock().work_tx = None;
        Self::abort_current(&self.current);
    }

    fn hash_rate(&self) -> u64 {
        self.engine.hash_rate()
    }

    fn is_ephemeral(&self) -> bool {
        true
    }
}
