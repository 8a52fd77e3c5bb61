//! # Chain Generation
//!
//! Deterministically generated chains must import cleanly through full
//! validation and serve as a base for the coordinator.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{transfer, Node, MINER, USER};
    use block_production::{
        generate_chain, make_header_chain, ChainMakerError, ChainStore, MinerConfig,
        StateDatabase, StateView,
    };
    use primitive_types::U256;

    #[test]
    fn test_three_empty_blocks_link_up() {
        let node = Node::new();
        let genesis = node.chain.current_block();

        let (blocks, receipts) =
            generate_chain(&node.context(), &genesis, 3, |_, _| Ok(())).unwrap();

        assert_eq!(blocks.len(), 3);
        assert_eq!(receipts.len(), 3);
        assert_eq!(blocks[0].parent_hash(), genesis.hash());
        for i in 0..2 {
            assert_eq!(blocks[i + 1].parent_hash(), blocks[i].hash());
        }
        let numbers: Vec<u64> = blocks.iter().map(|b| b.number()).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_generated_chain_imports_with_full_validation() {
        let node = Node::new();
        let genesis = node.chain.current_block();
        let uncle = make_header_chain(&node.context(), &genesis, 1, 7).unwrap().remove(0);

        let (blocks, _) = generate_chain(&node.context(), &genesis, 3, |i, block| {
            match i {
                0 => {
                    let nonce = block.tx_nonce(&USER)?;
                    block.add_tx(transfer(USER, nonce, 1))?;
                }
                1 => block.add_uncle(uncle.clone()),
                _ => {
                    block.set_coinbase(MINER)?;
                    let nonce = block.tx_nonce(&USER)?;
                    block.add_tx(transfer(USER, nonce, 1))?;
                }
            }
            Ok(())
        })
        .unwrap();

        assert_eq!(node.chain.insert_chain(blocks.clone()).unwrap(), 3);
        assert_eq!(node.chain.current_block().hash(), blocks[2].hash());

        let state = node.chain.states().open(blocks[2].header.state_root).unwrap();
        assert_eq!(state.nonce(&USER), 2);
        assert!(state.balance(&uncle.coinbase) > U256::zero());
        assert!(state.balance(&MINER) > U256::zero());
    }

    #[test]
    fn test_unfunded_sender_aborts_generation() {
        let node = Node::new();
        let genesis = node.chain.current_block();

        let result = generate_chain(&node.context(), &genesis, 2, |_, block| {
            block.tx_nonce(&MINER).map(|_| ())
        });
        assert!(matches!(result, Err(ChainMakerError::MissingAccount(a)) if a == MINER));
    }

    #[tokio::test]
    async fn test_coordinator_builds_on_generated_chain() {
        let node = Node::new();
        let blocks = node.chain.extend_canonical(3, 1).unwrap();
        let miner = node.miner(MinerConfig::default()).await;

        let work = miner.current_work().await.unwrap();
        assert_eq!(work.header().number, 4);
        assert_eq!(work.header().parent_hash, blocks[2].hash());
    }
}
