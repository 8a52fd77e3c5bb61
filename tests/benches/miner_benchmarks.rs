//! # Block Production Benchmarks
//!
//! | Area | Operation | Target |
//! |------|-----------|--------|
//! | Ordering | price-and-nonce sort of 1000 txs | < 1ms |
//! | Sealing | one double-SHA-256 seal digest | < 1µs |
//! | Generation | 10 blocks with 20 transfers each | < 50ms |

use block_production::utils::seal_digest;
use block_production::{
    generate_chain, sort_by_price_and_nonce, ChainConfig, ChainContext, DefaultRules,
    GenesisSpec, MemoryStateDb, TransferExecutor,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use primitive_types::U256;
use rand::Rng;
use shared_types::{Address, SignedTransaction};
use std::time::Duration;

fn random_transactions(count: usize, senders: u8) -> Vec<SignedTransaction> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| {
            let mut from = [0u8; 20];
            from[0] = (i % senders as usize) as u8;
            SignedTransaction {
                from,
                to: Some([0xEE; 20]),
                value: U256::one(),
                nonce: (i / senders as usize) as u64,
                gas_price: U256::from(rng.gen_range(1u64..1_000)),
                gas_limit: 21_000,
                ..SignedTransaction::default()
            }
        })
        .collect()
}

fn bench_ordering(c: &mut Criterion) {
    let mut group = c.benchmark_group("ordering");

    for size in [100usize, 1_000, 5_000] {
        let txs = random_transactions(size, 50);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("price_and_nonce", size), &txs, |b, txs| {
            b.iter(|| black_box(sort_by_price_and_nonce(txs.clone())))
        });
    }
    group.finish();
}

fn bench_seal_digest(c: &mut Criterion) {
    let seal_hash = [0x5Au8; 32];
    c.bench_function("sealing/sha256d_digest", |b| {
        let mut nonce = 0u64;
        b.iter(|| {
            nonce = nonce.wrapping_add(1);
            black_box(seal_digest(&seal_hash, nonce))
        })
    });
}

fn bench_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("generation");
    group.measurement_time(Duration::from_secs(10));

    let senders: Vec<Address> = (1..=20u8).map(|i| [i; 20]).collect();
    let config = ChainConfig::default();
    let rules = DefaultRules::default();
    let executor = TransferExecutor::new();

    group.bench_function("10_blocks_20_transfers", |b| {
        b.iter(|| {
            let states = MemoryStateDb::new();
            let genesis = GenesisSpec {
                alloc: senders
                    .iter()
                    .map(|a| (*a, U256::from(10u64).pow(U256::from(18))))
                    .collect(),
                ..GenesisSpec::default()
            }
            .commit(&states)
            .expect("genesis commits");
            let ctx = ChainContext {
                config: &config,
                rules: &rules,
                executor: &executor,
                states: &states,
            };

            let generated = generate_chain(&ctx, &genesis, 10, |_, block| {
                for sender in &senders {
                    let nonce = block.tx_nonce(sender)?;
                    block.add_tx(SignedTransaction {
                        from: *sender,
                        to: Some([0xEE; 20]),
                        value: U256::one(),
                        nonce,
                        gas_price: U256::one(),
                        gas_limit: 21_000,
                        ..SignedTransaction::default()
                    })?;
                }
                Ok(())
            });
            black_box(generated.expect("generation succeeds"))
        })
    });
    group.finish();
}

criterion_group!(benches, bench_ordering, bench_seal_digest, bench_generation);
criterion_main!(benches);
