//! Proof-of-work engines.
//!
//! [`FakePow`] seals immediately and accepts every seal. [`Sha256dPow`]
//! searches for a nonce whose `sha256d(seal_hash ‖ nonce)` digest is at
//! most `2^256 / difficulty`, spreading the nonce space across threads.

use crate::ports::outbound::{PowEngine, Seal};
use crate::utils::hashing::{meets_difficulty, seal_digest, target_for};
use parking_lot::Mutex;
use shared_types::{Block, BlockHeader, ZERO_HASH};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Iterations between checks of the stop flag.
const STOP_CHECK_INTERVAL: u64 = 1024;

/// Engine that seals instantly.
#[derive(Debug, Default)]
pub struct FakePow {
    delay: Option<Duration>,
}

impl FakePow {
    /// Seal immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take `delay` per search, abandoning it early when stopped.
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay: Some(delay) }
    }
}

impl PowEngine for FakePow {
    fn search(&self, _block: &Block, stop: &AtomicBool) -> Option<Seal> {
        if let Some(delay) = self.delay {
            let deadline = Instant::now() + delay;
            while Instant::now() < deadline {
                if stop.load(Ordering::SeqCst) {
                    return None;
                }
                std::thread::sleep(Duration::from_millis(5));
            }
        }
        if stop.load(Ordering::SeqCst) {
            return None;
        }
        Some(Seal {
            nonce: 0,
            mix_digest: ZERO_HASH,
        })
    }

    fn verify(&self, _header: &BlockHeader) -> bool {
        true
    }

    fn hash_rate(&self) -> u64 {
        0
    }
}

/// Double-SHA-256 nonce search.
#[derive(Debug)]
pub struct Sha256dPow {
    threads: u64,
    hash_rate: AtomicU64,
}

impl Default for Sha256dPow {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Sha256dPow {
    /// Search with `threads` workers (at least one).
    pub fn new(threads: u8) -> Self {
        Self {
            threads: u64::from(threads.max(1)),
            hash_rate: AtomicU64::new(0),
        }
    }
}

impl PowEngine for Sha256dPow {
    #[tracing::instrument(skip_all, fields(number = block.number(), threads = self.threads))]
    fn search(&self, block: &Block, stop: &AtomicBool) -> Option<Seal> {
        let seal_hash = block.header.seal_hash();
        let target = target_for(block.header.difficulty);
        let start = rand::random::<u64>();
        let stride = u64::MAX / self.threads;

        let found = AtomicBool::new(false);
        let result: Mutex<Option<Seal>> = Mutex::new(None);
        let attempts = AtomicU64::new(0);
        let began = Instant::now();

        std::thread::scope(|scope| {
            for worker in 0..self.threads {
                let (found, result, attempts) = (&found, &result, &attempts);
                scope.spawn(move || {
                    let mut nonce = start.wrapping_add(worker.wrapping_mul(stride));
                    let mut tries = 0u64;
                    loop {
                        if tries % STOP_CHECK_INTERVAL == 0
                            && (stop.load(Ordering::Relaxed) || found.load(Ordering::Relaxed))
                        {
                            break;
                        }
                        let digest = seal_digest(&seal_hash, nonce);
                        tries += 1;
                        if meets_difficulty(&digest, target) {
                            if !found.swap(true, Ordering::SeqCst) {
                                *result.lock() = Some(Seal {
                                    nonce,
                                    mix_digest: digest,
                                });
                            }
                            break;
                        }
                        nonce = nonce.wrapping_add(1);
                    }
                    attempts.fetch_add(tries, Ordering::Relaxed);
                });
            }
        });

        let elapsed = began.elapsed().as_secs_f64().max(f64::EPSILON);
        let rate = attempts.load(Ordering::Relaxed) as f64 / elapsed;
        self.hash_rate.store(rate as u64, Ordering::Relaxed);

        let seal = result.into_inner();
        match &seal {
            Some(seal) => tracing::debug!("[miner] PoW search successful: nonce={}", seal.nonce),
            None => tracing::debug!("[miner] PoW search abandoned"),
        }
        seal
    }

    fn verify(&self, header: &BlockHeader) -> bool {
        let digest = seal_digest(&header.seal_hash(), header.nonce);
        digest == header.mix_digest && meets_difficulty(&digest, target_for(header.difficulty))
    }

    fn hash_rate(&self) -> u64 {
        self.hash_rate.load(Ordering::Relaxed)
    }
}
