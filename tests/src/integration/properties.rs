//! # Property Tests
//!
//! - **Checkpoint law**: a revert restores exactly the pre-checkpoint view
//! - **Nonce monotonicity**: selection never reorders one sender's nonces
//! - **Reorg arrival order**: re-queued transactions keep their first
//!   arrival sequence against later arrivals

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use evm_state::{AccountFields, StateManager};
    use evm_txpool::{InMemoryStateProvider, TxPool};
    use proptest::prelude::*;
    use shared_types::{Account, Address, Block, Bytes, Hash, Transaction, U256};
    use std::collections::HashMap;

    // =============================================================================
    // CHECKPOINT LAW
    // =============================================================================

    const ADDRESSES: u64 = 4;
    const SLOTS: u64 = 4;

    #[derive(Debug, Clone)]
    enum Op {
        Balance(u64, u64),
        Nonce(u64, u64),
        Storage(u64, u64, u64),
        Code(u64, Bytes),
        Delete(u64),
        ClearStorage(u64),
    }

    fn op() -> impl Strategy<Value = Op> {
        let addr = 0..ADDRESSES;
        prop_oneof![
            (addr.clone(), any::<u64>()).prop_map(|(a, v)| Op::Balance(a, v)),
            (addr.clone(), 0..1_000u64).prop_map(|(a, n)| Op::Nonce(a, n)),
            (addr.clone(), 0..SLOTS, 0..3u64).prop_map(|(a, k, v)| Op::Storage(a, k, v)),
            (addr.clone(), prop::collection::vec(any::<u8>(), 0..8)).prop_map(|(a, c)| Op::Code(a, c)),
            addr.clone().prop_map(Op::Delete),
            addr.prop_map(Op::ClearStorage),
        ]
    }

    fn address(i: u64) -> Address {
        Address::from_low_u64(0x1000 + i)
    }

    fn apply(state: &mut StateManager, op: &Op) {
        match op {
            Op::Balance(a, v) => {
                let fields = AccountFields {
                    balance: Some(U256::from(*v)),
                    ..AccountFields::default()
                };
                state.modify_account_fields(address(*a), fields).unwrap();
            }
            Op::Nonce(a, n) => {
                let fields = AccountFields {
                    nonce: Some(*n),
                    ..AccountFields::default()
                };
                state.modify_account_fields(address(*a), fields).unwrap();
            }
            Op::Storage(a, k, v) => state.put_storage(address(*a), U256::from(*k), U256::from(*v)),
            Op::Code(a, code) => state.put_code(address(*a), code.clone()).unwrap(),
            Op::Delete(a) => state.delete_account(address(*a)),
            Op::ClearStorage(a) => state.clear_contract_storage(address(*a)),
        }
    }

    type View = Vec<(Account, Bytes, Vec<U256>)>;

    fn view(state: &StateManager) -> View {
        (0..ADDRESSES)
            .map(|i| {
                let a = address(i);
                let storage = (0..SLOTS)
                    .map(|k| state.get_storage(&a, &U256::from(k)).unwrap())
                    .collect();
                (state.get_account(&a).unwrap(), state.get_code(&a).unwrap(), storage)
            })
            .collect()
    }

    fn base_state(ops: &[Op]) -> StateManager {
        let mut state = StateManager::new();
        state.put_account(address(0), Account::new(1, U256::from(5u64)));
        for op in ops {
            apply(&mut state, op);
        }
        state
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_revert_restores_pre_checkpoint_view(
            base in prop::collection::vec(op(), 0..8),
            outer in prop::collection::vec(op(), 0..8),
            inner in prop::collection::vec(op(), 0..8),
            commit_inner in any::<bool>(),
            commit_base in any::<bool>(),
        ) {
            let mut state = base_state(&base);
            if commit_base {
                state.checkpoint();
                state.commit().unwrap();
            }
            let before = view(&state);

            state.checkpoint();
            for op in &outer {
                apply(&mut state, op);
            }
            state.checkpoint();
            for op in &inner {
                apply(&mut state, op);
            }
            if commit_inner {
                state.commit().unwrap();
            } else {
                state.revert().unwrap();
            }
            state.revert().unwrap();

            prop_assert_eq!(view(&state), before);
            prop_assert_eq!(state.checkpoint_depth(), 0);
        }

        #[test]
        fn prop_commit_matches_direct_application(
            base in prop::collection::vec(op(), 0..8),
            ops in prop::collection::vec(op(), 0..12),
        ) {
            let mut direct = base_state(&base);
            for op in &ops {
                apply(&mut direct, op);
            }

            let mut layered = base_state(&base);
            layered.checkpoint();
            for op in &ops {
                apply(&mut layered, op);
            }
            layered.commit().unwrap();

            prop_assert_eq!(view(&layered), view(&direct));
            prop_assert_eq!(layered.state_root(), direct.state_root());
        }

        #[test]
        fn prop_unbalanced_revert_is_an_error(depth in 0usize..4) {
            let mut state = StateManager::new();
            for _ in 0..depth {
                state.checkpoint();
            }
            for _ in 0..depth {
                prop_assert!(state.revert().is_ok());
            }
            prop_assert!(state.revert().is_err());
            prop_assert!(state.commit().is_err());
        }
    }

    // =============================================================================
    // NONCE MONOTONICITY
    // =============================================================================

    /// `(sender seed, nonce, tip in gwei)` in insertion order.
    fn submissions() -> impl Strategy<Value = Vec<(u8, u64, u64)>> {
        prop::collection::vec((1u8..=4, 1usize..=5), 1..=4)
            .prop_flat_map(|senders| {
                let mut seen = HashMap::new();
                let txs: Vec<(u8, u64)> = senders
                    .into_iter()
                    .filter(|(seed, _)| seen.insert(*seed, ()).is_none())
                    .flat_map(|(seed, count)| (0..count as u64).map(move |nonce| (seed, nonce)))
                    .collect();
                let len = txs.len();
                (Just(txs), prop::collection::vec(1u64..=5, len))
            })
            .prop_map(|(txs, tips)| {
                txs.into_iter()
                    .zip(tips)
                    .map(|((seed, nonce), tip)| (seed, nonce, tip))
                    .collect::<Vec<_>>()
            })
            .prop_shuffle()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_selection_keeps_sender_nonces_ascending(subs in submissions()) {
            let mut state = InMemoryStateProvider::new();
            let mut pool = TxPool::with_defaults();
            for seed in 1u8..=4 {
                state.set_balance(address_of(&key(seed)), U256::from(ETHER) * U256::from(100u64));
            }
            for (seed, nonce, tip) in &subs {
                let tx = dynamic_tx(*nonce, Some(Address::from_low_u64(0x99)), *tip)
                    .sign(&key(*seed))
                    .unwrap();
                pool.add(tx, &state).unwrap();
            }

            let selected = pool.txs_by_price_and_nonce(U256::from(GWEI), None);
            prop_assert_eq!(selected.len(), subs.len());

            let mut last: HashMap<Address, u64> = HashMap::new();
            for tx in &selected {
                let sender = tx.sender().unwrap();
                if let Some(previous) = last.insert(sender, tx.nonce) {
                    prop_assert!(tx.nonce == previous + 1, "sender {} went {} -> {}", sender, previous, tx.nonce);
                } else {
                    prop_assert_eq!(tx.nonce, 0);
                }
            }
        }
    }

    // =============================================================================
    // REORG ARRIVAL ORDER
    // =============================================================================

    fn one_tx(seed: u8) -> Transaction {
        dynamic_tx(0, Some(Address::from_low_u64(0x55)), 2)
            .sign(&key(seed))
            .unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_requeued_txs_keep_arrival_order(
            reorged in Just((10u8..16).collect::<Vec<_>>()).prop_shuffle(),
            reorged_len in 1usize..=6,
            later in Just((30u8..36).collect::<Vec<_>>()).prop_shuffle(),
            later_len in 0usize..=6,
        ) {
            let mut state = InMemoryStateProvider::new();
            for seed in reorged.iter().chain(later.iter()) {
                state.set_balance(address_of(&key(*seed)), U256::from(ETHER));
            }
            let mut pool = TxPool::with_defaults();

            // First arrivals, then mined.
            let first: Vec<Transaction> = reorged[..reorged_len].iter().map(|s| one_tx(*s)).collect();
            for tx in &first {
                pool.add(tx.clone(), &state).unwrap();
            }
            let mined = Block {
                transactions: first.clone(),
                ..Block::default()
            };
            pool.on_block_added(&mined);
            prop_assert!(pool.is_empty());

            // Arrivals after the block.
            let second: Vec<Transaction> = later[..later_len].iter().map(|s| one_tx(*s)).collect();
            for tx in &second {
                pool.add(tx.clone(), &state).unwrap();
            }

            pool.on_chain_reorganization(&[mined], &[]);

            let order: Vec<Hash> = pool
                .txs_by_price_and_nonce(U256::from(GWEI), None)
                .iter()
                .map(Transaction::hash)
                .collect();
            let expected: Vec<Hash> = first.iter().chain(second.iter()).map(Transaction::hash).collect();
            prop_assert_eq!(order, expected);
        }
    }
}
