//! # Mining Flows
//!
//! A CPU agent seals what the coordinator assembles; the chain store and
//! pool react over the bus.
//!
//! 1. **Pool → block**: pending transactions are mined, underpriced ones
//!    from unowned senders are evicted
//! 2. **Fork → uncle**: side blocks announced by the chain are referenced
//!    and rewarded
//! 3. **Depth → confirmation**: blocks buried deep enough are counted
//! 4. **Full validation**: sealed blocks re-executed on import

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{
        transfer, wait_for_event, Node, MINER, OWNER, USER, WAIT,
    };
    use block_production::{
        make_block_chain, Agent, BlockProducerService, ChainStore, CpuAgent, FakePow, MinerConfig,
        PowEngine, RulesConfig, Sha256dPow, StateDatabase, StateView,
    };
    use primitive_types::U256;
    use shared_bus::{BlockchainEvent, EventFilter, EventTopic};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    /// Slow enough that block timestamps stay near the wall clock.
    fn paced_agent() -> Arc<dyn Agent> {
        Arc::new(CpuAgent::new(
            Arc::new(FakePow::with_delay(Duration::from_millis(300))),
            1,
        ))
    }

    #[tokio::test]
    async fn test_cpu_agent_extends_chain() {
        let node = Node::new();
        let miner = node.miner(MinerConfig::default()).await;
        let mut sub = node.bus.subscribe(EventFilter::topics(vec![EventTopic::Miner]));

        miner.register(paced_agent()).await;
        miner.start().await;
        node.wait_for_head(3).await;
        miner.shutdown().await;

        for number in 1..=3 {
            let block = node.chain.get_block_by_number(number).unwrap();
            assert_eq!(block.coinbase(), MINER);
        }
        let event = wait_for_event(&mut sub, |e| matches!(e, BlockchainEvent::NewMinedBlock { .. })).await;
        assert!(matches!(event, BlockchainEvent::NewMinedBlock { block } if block.number() == 1));
        assert!(miner.metrics().get_blocks_mined() >= 3);
        assert!(miner.metrics().get_avg_assembly_time() > 0.0);
    }

    #[tokio::test]
    async fn test_pool_transactions_are_mined() {
        let node = Node::new();
        let tx = transfer(USER, 0, 10);
        node.pool.add(tx.clone());
        let miner = node.miner(MinerConfig::default()).await;

        miner.register(paced_agent()).await;
        miner.start().await;
        node.wait_for_head(1).await;
        miner.shutdown().await;

        let head = node.chain.get_block_by_number(1).unwrap();
        assert_eq!(head.transactions, vec![tx.clone()]);
        assert!(node.chain.receipt(&tx.hash()).is_some());
        assert!(node.chain.mipmap_bloom(1).is_some());

        let state = node.chain.states().open(head.header.state_root).unwrap();
        assert_eq!(state.nonce(&USER), 1);
        assert!(state.balance(&MINER) > U256::zero());
    }

    #[tokio::test]
    async fn test_underpriced_user_evicted_owner_kept() {
        let node = Node::new();
        let cheap_user = transfer(USER, 0, 50);
        let cheap_owner = transfer(OWNER, 0, 50);
        node.pool.add_all(vec![cheap_user.clone(), cheap_owner.clone()]);

        let miner = node
            .miner(MinerConfig {
                min_gas_price: U256::from(100),
                ..MinerConfig::default()
            })
            .await;
        miner.register(paced_agent()).await;
        miner.start().await;
        node.wait_for_head(1).await;
        miner.shutdown().await;

        let head = node.chain.get_block_by_number(1).unwrap();
        assert_eq!(head.transactions, vec![cheap_owner]);
        assert!(!node.pool.contains(&cheap_user.hash()));
    }

    #[tokio::test]
    async fn test_mined_logs_carry_block_hash() {
        let node = Node::new();
        let miner = node.miner(MinerConfig::default()).await;
        let mut sub = node.bus.subscribe(EventFilter::topics(vec![EventTopic::Miner]));
        let tx = shared_types::SignedTransaction {
            data: vec![1, 2, 3],
            gas_limit: 30_000,
            ..transfer(USER, 0, 10)
        };
        node.pool.add(tx);

        miner.register(paced_agent()).await;
        miner.start().await;

        let event = wait_for_event(&mut sub, |e| {
            matches!(e, BlockchainEvent::MinedLogs { logs } if !logs.is_empty())
        })
        .await;
        miner.shutdown().await;

        let BlockchainEvent::MinedLogs { logs } = event else {
            unreachable!()
        };
        let head = node.chain.get_block_by_number(1).unwrap();
        assert!(logs.iter().all(|log| log.block_hash == head.hash()));
    }

    #[tokio::test]
    async fn test_side_block_rewarded_as_uncle() {
        let node = Node::new();
        node.chain.extend_canonical(2, 1).unwrap();
        let miner = node.miner(MinerConfig::default()).await;

        let genesis = node.chain.get_block_by_number(0).unwrap();
        let side = make_block_chain(&node.context(), &genesis, 1, 2).unwrap();
        let uncle_miner = side[0].coinbase();
        node.chain.insert_chain(side).unwrap();
        timeout(WAIT, async {
            while miner.uncle_candidates().await == 0 {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        miner.register(paced_agent()).await;
        miner.start().await;
        node.wait_for_head(3).await;
        miner.shutdown().await;

        let head = node.chain.get_block_by_number(3).unwrap();
        assert_eq!(head.uncles.len(), 1);
        assert_eq!(head.uncles[0].coinbase, uncle_miner);
        let state = node.chain.states().open(head.header.state_root).unwrap();
        assert!(state.balance(&uncle_miner) > U256::zero());
    }

    #[tokio::test]
    async fn test_buried_blocks_are_confirmed() {
        let node = Node::new();
        let miner = node
            .miner(MinerConfig {
                confirmation_depth: 2,
                ..MinerConfig::default()
            })
            .await;

        miner.register(paced_agent()).await;
        miner.start().await;
        timeout(WAIT, async {
            while miner.metrics().get_confirmed_blocks() == 0 {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        miner.shutdown().await;

        assert!(node.chain.current_block().number() >= 3);
    }

    #[tokio::test]
    async fn test_full_validation_mining() {
        let node = Node::new();
        node.pool.add(transfer(USER, 0, 10));
        let miner = node
            .miner(MinerConfig {
                full_validation: true,
                ..MinerConfig::default()
            })
            .await;

        miner.register(paced_agent()).await;
        miner.start().await;
        node.wait_for_head(2).await;
        miner.shutdown().await;

        assert_eq!(node.chain.get_block_by_number(1).unwrap().transactions.len(), 1);
        assert_eq!(miner.metrics().get_discarded_results(), 0);
    }

    #[tokio::test]
    async fn test_sha256d_seals_verify() {
        let node = Node::with_rules(RulesConfig {
            minimum_difficulty: U256::from(16),
            ..RulesConfig::default()
        });
        let miner = node.miner(MinerConfig::default()).await;
        let pow = Arc::new(Sha256dPow::new(2));

        miner.register(Arc::new(CpuAgent::new(pow.clone(), 1))).await;
        miner.start().await;
        node.wait_for_head(2).await;
        miner.shutdown().await;

        for number in 1..=2 {
            let block = node.chain.get_block_by_number(number).unwrap();
            assert!(pow.verify(&block.header));
        }
    }

    #[tokio::test]
    async fn test_stop_halts_sealing() {
        let node = Node::new();
        let miner = node.miner(MinerConfig::default()).await;
        miner.register(paced_agent()).await;
        miner.start().await;
        node.wait_for_head(1).await;

        miner.stop().await;
        assert!(!miner.is_mining());
        assert_eq!(miner.agent_count().await, 0);

        let height = node.chain.current_block().number();
        sleep(Duration::from_millis(700)).await;
        assert!(node.chain.current_block().number() <= height + 1);
    }
}
