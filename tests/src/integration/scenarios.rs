//! # End-to-End Scenarios
//!
//! Transactions driven through `run_tx` and the pool, observed through the
//! state manager:
//!
//! 1. **Deploy**: a constructor's storage write is visible afterwards
//! 2. **Intrinsic gas**: a gas limit below 21000 is refused with no mutation
//! 3. **Nonce gaps**: filling a gap promotes the queued tail atomically
//! 4. **Reverted selfdestruct**: a parent revert undoes a child selfdestruct
//! 5. **CREATE2**: the opcode lands on the derived address

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use evm_block::{run_tx, BlockError, InvalidTransaction, RunTxOptions};
    use evm_interpreter::{create2_address, create_address, ExceptionError};
    use evm_txpool::{InMemoryStateProvider, TxPool};
    use shared_types::{Account, Address, Hash, Transaction, U256};

    // =============================================================================
    // DEPLOY
    // =============================================================================

    #[test]
    fn test_constructor_storage_is_readable_after_deploy() {
        let key = key(1);
        let sender = address_of(&key);
        let mut state = funded(&[sender], 1);

        let tx = Transaction {
            gas_limit: 100_000,
            data: store_42_init_code(),
            ..dynamic_tx(0, None, 1)
        }
        .sign(&key)
        .unwrap();
        let result = run_tx(&mut state, &chain(), &precompiles(), &env(), &tx, RunTxOptions::default())
            .unwrap();

        assert!(result.is_success());
        let contract = result.created_address.unwrap();
        assert_eq!(contract, create_address(&sender, 0));
        assert_eq!(state.get_storage(&contract, &U256::zero()).unwrap(), U256::from(42u64));
        assert_eq!(state.get_account(&sender).unwrap().nonce, 1);
        assert_eq!(state.get_account(&contract).unwrap().nonce, 1);
    }

    // =============================================================================
    // INTRINSIC GAS
    // =============================================================================

    #[test]
    fn test_gas_limit_below_intrinsic_is_rejected_without_mutation() {
        let key = key(2);
        let sender = address_of(&key);
        let mut state = funded(&[sender], 1);
        let before = state.get_account(&sender).unwrap();
        let root = state.state_root();

        let tx = Transaction {
            gas_limit: 20_000,
            ..dynamic_tx(0, Some(Address::from_low_u64(0x1234)), 1)
        }
        .sign(&key)
        .unwrap();
        let err = run_tx(&mut state, &chain(), &precompiles(), &env(), &tx, RunTxOptions::default())
            .unwrap_err();

        assert!(matches!(
            err,
            BlockError::InvalidTransaction(InvalidTransaction::IntrinsicGasTooLow {
                gas_limit: 20_000,
                intrinsic: 21_000,
            })
        ));
        assert_eq!(state.get_account(&sender).unwrap(), before);
        assert_eq!(state.checkpoint_depth(), 0);
        assert_eq!(state.state_root(), root);
    }

    // =============================================================================
    // NONCE GAPS
    // =============================================================================

    fn pooled_nonces(pool: &TxPool, sender: &Address) -> (Vec<u64>, Vec<u64>) {
        let content = pool.content();
        let nonces = |txs: Option<&Vec<Transaction>>| {
            txs.map(|txs| txs.iter().map(|tx| tx.nonce).collect())
                .unwrap_or_default()
        };
        (nonces(content.pending.get(sender)), nonces(content.queued.get(sender)))
    }

    /// Last mined nonce 3, so the account's next nonce is 4.
    fn gap_pool() -> (TxPool, InMemoryStateProvider, shared_crypto::Secp256k1KeyPair) {
        let key = key(3);
        let state = InMemoryStateProvider::new().with_account(
            address_of(&key),
            4,
            U256::from(ETHER),
        );
        (TxPool::with_defaults(), state, key)
    }

    #[test]
    fn test_filling_gap_promotes_queued_run() {
        let (mut pool, state, key) = gap_pool();
        let sender = address_of(&key);
        let tx = |nonce| {
            dynamic_tx(nonce, Some(Address::from_low_u64(0x77)), 2)
                .sign(&key)
                .unwrap()
        };

        pool.add(tx(4), &state).unwrap();
        assert_eq!(pooled_nonces(&pool, &sender), (vec![4], vec![]));

        pool.add(tx(6), &state).unwrap();
        assert_eq!(pooled_nonces(&pool, &sender), (vec![4], vec![6]));

        pool.add(tx(5), &state).unwrap();
        assert_eq!(pooled_nonces(&pool, &sender), (vec![4, 5, 6], vec![]));

        let ordered: Vec<u64> = pool
            .txs_by_price_and_nonce(U256::from(GWEI), None)
            .iter()
            .map(|tx| tx.nonce)
            .collect();
        assert_eq!(ordered, vec![4, 5, 6]);
    }

    #[test]
    fn test_selection_order_ignores_insertion_order() {
        let orders: [[u64; 3]; 6] = [
            [4, 5, 6],
            [4, 6, 5],
            [5, 4, 6],
            [5, 6, 4],
            [6, 4, 5],
            [6, 5, 4],
        ];
        for order in orders {
            let (mut pool, state, key) = gap_pool();
            for nonce in order {
                let tx = dynamic_tx(nonce, Some(Address::from_low_u64(0x77)), 2)
                    .sign(&key)
                    .unwrap();
                pool.add(tx, &state).unwrap();
            }
            let ordered: Vec<u64> = pool
                .txs_by_price_and_nonce(U256::from(GWEI), None)
                .iter()
                .map(|tx| tx.nonce)
                .collect();
            assert_eq!(ordered, vec![4, 5, 6], "insertion order {order:?}");
        }
    }

    #[test]
    fn test_stale_nonce_is_refused() {
        let (mut pool, state, key) = gap_pool();
        let tx = dynamic_tx(3, Some(Address::from_low_u64(0x77)), 2)
            .sign(&key)
            .unwrap();
        assert!(pool.add(tx, &state).is_err());
        assert!(pool.is_empty());
    }

    // =============================================================================
    // REVERTED SELFDESTRUCT
    // =============================================================================

    #[test]
    fn test_parent_revert_undoes_child_selfdestruct() {
        let key = key(4);
        let sender = address_of(&key);
        let parent = Address::from_low_u64(0xa000);
        let victim = Address::from_low_u64(0xb000);
        let beneficiary = Address::from_low_u64(0xc000);

        let mut state = funded(&[sender], 1);
        state.put_account(victim, Account::new(0, U256::from(1_000u64)));
        state.put_code(victim, selfdestruct_code(beneficiary)).unwrap();
        state.put_code(parent, call_then_revert_code(victim)).unwrap();
        let victim_code = state.get_code(&victim).unwrap();

        let tx = Transaction {
            gas_limit: 200_000,
            ..dynamic_tx(0, Some(parent), 1)
        }
        .sign(&key)
        .unwrap();
        let result = run_tx(&mut state, &chain(), &precompiles(), &env(), &tx, RunTxOptions::default())
            .unwrap();

        assert_eq!(result.exec.exception, Some(ExceptionError::Revert));
        assert!(!result.receipt.status);
        assert_eq!(state.get_code(&victim).unwrap(), victim_code);
        assert_eq!(state.get_account(&victim).unwrap().balance, U256::from(1_000u64));
        assert_eq!(state.get_account(&beneficiary).unwrap().balance, U256::zero());
        // The transaction itself still counts.
        assert_eq!(state.get_account(&sender).unwrap().nonce, 1);
    }

    // =============================================================================
    // CREATE2
    // =============================================================================

    #[test]
    fn test_create2_lands_on_derived_address() {
        let key = key(5);
        let sender = address_of(&key);
        let factory = Address::from_low_u64(0xf000);
        let init = store_42_init_code();
        let salt = 7u8;

        let mut state = funded(&[sender], 1);
        state.put_code(factory, create2_factory_code(&init, salt)).unwrap();

        let tx = Transaction {
            gas_limit: 200_000,
            ..dynamic_tx(0, Some(factory), 1)
        }
        .sign(&key)
        .unwrap();
        let result = run_tx(&mut state, &chain(), &precompiles(), &env(), &tx, RunTxOptions::default())
            .unwrap();
        assert!(result.is_success());

        let init_hash = Hash::keccak(&init);
        let expected = create2_address(&factory, U256::from(salt), &init_hash);
        assert_eq!(expected, create2_address(&factory, U256::from(salt), &init_hash));

        let stored = state.get_storage(&factory, &U256::zero()).unwrap();
        assert_eq!(Address::from_word(stored), expected);
        assert_eq!(state.get_storage(&expected, &U256::zero()).unwrap(), U256::from(42u64));
    }
}
