//! # Pipeline and Node Flows
//!
//! Pool → builder → chain → replay, and the node context on top of them.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use evm_block::{run_block, BlockBuilder, BlockError, BuildBlockOptions, RunBlockOptions};
    use evm_chain::Blockchain;
    use evm_node::{
        BlockTag, CallParams, EvmNode, MiningConfig, MiningMode, NodeConfig, TransactionRequest,
        DEV_PRIVATE_KEYS,
    };
    use evm_state::StateManager;
    use evm_txpool::{InMemoryStateProvider, TxPool};
    use shared_types::{Address, Block, Header, Transaction, U256};

    fn build_block(
        state: &mut StateManager,
        chain: &Blockchain,
        parent: &Header,
        timestamp: u64,
        txs: Vec<Transaction>,
    ) -> Block {
        let options = BuildBlockOptions {
            timestamp,
            chain_id: CHAIN_ID,
            ..BuildBlockOptions::default()
        };
        let registry = precompiles();
        let mut builder = BlockBuilder::new(state, chain, &registry, parent, options);
        for tx in txs {
            builder.add_transaction(tx).unwrap();
        }
        builder.build().unwrap().block
    }

    // =============================================================================
    // POOL → BUILDER → REPLAY
    // =============================================================================

    #[test]
    fn test_pool_selection_builds_a_replayable_block() {
        let alice = key(21);
        let bob = key(22);
        let senders = [address_of(&alice), address_of(&bob)];

        let mut provider = InMemoryStateProvider::new();
        for sender in senders {
            provider.set_balance(sender, U256::from(ETHER));
        }
        let mut pool = TxPool::with_defaults();
        let to = Some(Address::from_low_u64(0x4444));
        pool.add(dynamic_tx(0, to, 1).sign(&alice).unwrap(), &provider).unwrap();
        pool.add(dynamic_tx(1, to, 1).sign(&alice).unwrap(), &provider).unwrap();
        pool.add(dynamic_tx(0, to, 3).sign(&bob).unwrap(), &provider).unwrap();

        let chain = chain();
        let genesis = chain.head_header().clone();
        let selected = pool.txs_by_price_and_nonce(genesis.calc_next_base_fee(), None);
        assert_eq!(selected[0].sender().unwrap(), senders[1]);

        let mut producer = funded(&senders, 1);
        let block = build_block(&mut producer, &chain, &genesis, 12, selected);
        assert_eq!(block.transactions.len(), 3);
        assert_eq!(block.header.gas_used, 63_000);

        let mut replica = funded(&senders, 1);
        let options = RunBlockOptions {
            chain_id: CHAIN_ID,
            ..RunBlockOptions::default()
        };
        let replay = run_block(&mut replica, &chain, &precompiles(), &block, options).unwrap();
        assert_eq!(replay.state_root, block.header.state_root);
        assert_eq!(replay.receipts_root, block.header.receipts_root);
        assert_eq!(replica.state_root(), producer.state_root());

        pool.on_block_added(&block);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_tampered_block_is_rejected_atomically() {
        let alice = key(23);
        let sender = address_of(&alice);
        let chain = chain();
        let genesis = chain.head_header().clone();

        let mut producer = funded(&[sender], 1);
        let tx = dynamic_tx(0, Some(Address::from_low_u64(0x4545)), 1)
            .sign(&alice)
            .unwrap();
        let mut block = build_block(&mut producer, &chain, &genesis, 12, vec![tx]);
        block.header.gas_used += 1;

        let mut replica = funded(&[sender], 1);
        let root = replica.state_root();
        let options = RunBlockOptions {
            chain_id: CHAIN_ID,
            ..RunBlockOptions::default()
        };
        let err = run_block(&mut replica, &chain, &precompiles(), &block, options).unwrap_err();
        assert!(matches!(err, BlockError::InvalidBlock(_) | BlockError::RootMismatch { .. }));
        assert_eq!(replica.state_root(), root);
        assert_eq!(replica.get_account(&sender).unwrap().nonce, 0);
        assert_eq!(replica.checkpoint_depth(), 0);
    }

    // =============================================================================
    // CHAIN REORG → POOL
    // =============================================================================

    #[test]
    fn test_reorg_returns_mined_transactions_to_pool() {
        let alice = key(24);
        let sender = address_of(&alice);
        let provider = InMemoryStateProvider::new().with_account(sender, 0, U256::from(ETHER));
        let mut pool = TxPool::with_defaults();
        let tx = dynamic_tx(0, Some(Address::from_low_u64(0x4646)), 1)
            .sign(&alice)
            .unwrap();
        let hash = pool.add(tx.clone(), &provider).unwrap();

        let mut chain = chain();
        let genesis = chain.head_header().clone();

        let mut state_a = funded(&[sender], 1);
        let block_a1 = build_block(&mut state_a, &chain, &genesis, 12, vec![tx]);
        chain.put_block(block_a1.clone()).unwrap();
        pool.on_block_added(&block_a1);
        assert!(!pool.contains(&hash));

        let mut state_b = funded(&[sender], 1);
        let block_b1 = build_block(&mut state_b, &chain, &genesis, 13, Vec::new());
        let tie = chain.put_block(block_b1.clone()).unwrap();
        assert!(tie.is_empty());
        let block_b2 = build_block(&mut state_b, &chain, &block_b1.header, 14, Vec::new());
        let update = chain.put_block(block_b2).unwrap();

        assert!(update.is_reorg());
        assert_eq!(update.removed.len(), 1);
        assert_eq!(update.added.len(), 2);
        pool.on_chain_reorganization(&update.removed, &update.added);

        assert!(pool.contains(&hash));
        assert_eq!(pool.pending_count(), 1);
        assert_eq!(chain.head_number(), 2);
        assert!(chain.get_transaction(&hash).is_none());
    }

    // =============================================================================
    // NODE
    // =============================================================================

    fn node(mode: MiningMode) -> EvmNode {
        EvmNode::new(NodeConfig {
            mining: MiningConfig { mode },
            ..NodeConfig::default()
        })
    }

    fn dev(i: usize) -> Address {
        let bytes = hex::decode(DEV_PRIVATE_KEYS[i]).unwrap();
        let pair = shared_crypto::Secp256k1KeyPair::from_slice(&bytes).unwrap();
        Address(pair.address())
    }

    #[test]
    fn test_read_only_call_is_idempotent() {
        let node = node(MiningMode::Manual);
        let target = Address::from_low_u64(0x5151);
        // PUSH1 0 SLOAD PUSH1 0 MSTORE PUSH1 32 PUSH1 0 RETURN
        node.set_code(target, vec![0x60, 0x00, 0x54, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3])
            .unwrap();
        node.set_storage_at(target, U256::zero(), U256::from(99u64)).unwrap();

        let params = CallParams {
            to: Some(target),
            ..CallParams::default()
        };
        let first = node.call(params.clone()).unwrap();
        let second = node.call(params).unwrap();
        assert_eq!(first, second);
        assert_eq!(U256::from_big_endian(&first.return_data), U256::from(99u64));
    }

    #[test]
    fn test_sequential_sends_share_one_block() {
        let node = node(MiningMode::Manual);
        let target = Address::from_low_u64(0x5252);
        let hashes: Vec<_> = (0..4)
            .map(|i| {
                node.send_transaction(TransactionRequest {
                    from: dev(1),
                    to: Some(target),
                    value: Some(U256::from(i + 1)),
                    ..TransactionRequest::default()
                })
                .unwrap()
            })
            .collect();
        node.mine(1).unwrap();

        let mut cumulative = 0;
        for (index, hash) in hashes.iter().enumerate() {
            let receipt = node.get_transaction_receipt(hash).unwrap();
            assert_eq!(receipt.transaction_index, index as u64);
            cumulative += receipt.gas_used;
            assert_eq!(receipt.cumulative_gas_used, cumulative);
        }
        assert_eq!(node.get_balance(&target).unwrap(), U256::from(10u64));
        assert_eq!(node.get_transaction_count(&dev(1), BlockTag::Latest).unwrap(), 4);
    }

    #[test]
    fn test_state_file_roundtrip() {
        let path = std::env::temp_dir().join(format!("evm-state-{}.json", std::process::id()));
        let source = node(MiningMode::Manual);
        let address = Address::from_low_u64(0x5353);
        source.set_balance(address, U256::from(12u64)).unwrap();
        source.set_code(address, vec![0x60, 0x01]).unwrap();
        source.save_state_file(&path).unwrap();

        let target = node(MiningMode::Manual);
        target.load_state_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(target.get_balance(&address).unwrap(), U256::from(12u64));
        assert_eq!(target.get_code(&address).unwrap(), vec![0x60, 0x01]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_interval_miner_picks_up_submitted_transaction() {
        let node = std::sync::Arc::new(node(MiningMode::Manual));
        let miner = evm_node::spawn_interval_miner(node.clone(), std::time::Duration::from_millis(20));

        let target = Address::from_low_u64(0x5454);
        let hash = node
            .send_transaction(TransactionRequest {
                from: dev(2),
                to: Some(target),
                value: Some(U256::from(5u64)),
                ..TransactionRequest::default()
            })
            .unwrap();

        let mut receipt = None;
        for _ in 0..100 {
            receipt = node.get_transaction_receipt(&hash);
            if receipt.is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        miner.abort();

        let receipt = receipt.expect("mined within two seconds");
        assert!(receipt.status);
        assert_eq!(node.get_balance(&target).unwrap(), U256::from(5u64));
        assert!(node.txpool_status().pending == 0);
    }
}
