//! # EVM Runtime Benchmarks
//!
//! | Area | Measured |
//! |------|----------|
//! | evm-state | State root over N dirty accounts |
//! | evm-interpreter | Tight JUMP loop until gas runs out |
//! | evm-block | Signed transfer through `run_tx` |
//! | evm-txpool | Add N transactions, then select |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use evm_block::{run_tx, RunTxOptions};
use evm_chain::Blockchain;
use evm_interpreter::{BlockEnv, Evm, Message, NoBlockHashes, PrecompileRegistry, TxEnv};
use evm_state::StateManager;
use evm_txpool::{InMemoryStateProvider, TxPool};
use shared_crypto::Secp256k1KeyPair;
use shared_types::{Account, Address, Block, Transaction, TxType, U256};
use std::time::Duration;

const GWEI: u64 = 1_000_000_000;

fn transfer(nonce: u64, tip: u64) -> Transaction {
    Transaction {
        tx_type: TxType::DynamicFee,
        chain_id: Some(1),
        nonce,
        max_priority_fee_per_gas: U256::from(tip * GWEI),
        max_fee_per_gas: U256::from((tip + 10) * GWEI),
        gas_limit: 21_000,
        to: Some(Address::from_low_u64(0xbeef)),
        value: U256::one(),
        ..Transaction::default()
    }
}

// ============================================================================
// evm-state: state root
// ============================================================================

fn bench_state_root(c: &mut Criterion) {
    let mut group = c.benchmark_group("evm-state");
    for accounts in [100u64, 1_000] {
        group.throughput(Throughput::Elements(accounts));
        group.bench_with_input(BenchmarkId::new("state_root", accounts), &accounts, |b, &n| {
            b.iter(|| {
                let mut state = StateManager::new();
                for i in 0..n {
                    let address = Address::from_low_u64(i + 1);
                    state.put_account(address, Account::new(i, U256::from(i)));
                    state.put_storage(address, U256::from(i), U256::from(i + 1));
                }
                black_box(state.state_root())
            })
        });
    }
    group.finish();
}

// ============================================================================
// evm-interpreter: opcode loop
// ============================================================================

fn bench_interpreter_loop(c: &mut Criterion) {
    let mut group = c.benchmark_group("evm-interpreter");
    group.measurement_time(Duration::from_secs(10));

    let target = Address::from_low_u64(0x1000);
    let mut state = StateManager::new();
    // JUMPDEST PUSH1 0 JUMP
    state.put_code(target, vec![0x5b, 0x60, 0x00, 0x56]).unwrap();
    let precompiles = PrecompileRegistry::standard();
    let block = BlockEnv::default();

    for gas in [100_000u64, 1_000_000] {
        group.bench_with_input(BenchmarkId::new("jump_loop", gas), &gas, |b, &gas| {
            b.iter(|| {
                state.checkpoint();
                let mut evm = Evm::new(&mut state, &NoBlockHashes, &precompiles, &block, TxEnv::default());
                let result = evm.run_call(Message::call(Address::ZERO, target, Vec::new(), gas));
                let _ = state.revert();
                black_box(result.is_ok())
            })
        });
    }
    group.finish();
}

// ============================================================================
// evm-block: run_tx
// ============================================================================

fn bench_run_tx(c: &mut Criterion) {
    let mut group = c.benchmark_group("evm-block");
    let key = Secp256k1KeyPair::from_bytes([7; 32]).unwrap();
    let sender = Address(key.address());
    let chain = Blockchain::new(Block::default());
    let precompiles = PrecompileRegistry::standard();
    let env = BlockEnv {
        number: 1,
        gas_limit: 30_000_000,
        base_fee: U256::from(GWEI),
        chain_id: 1,
        ..BlockEnv::default()
    };
    let tx = transfer(0, 1).sign(&key).unwrap();

    group.bench_function("run_tx_transfer", |b| {
        b.iter(|| {
            let mut state = StateManager::new();
            state.put_account(sender, Account::new(0, U256::from(10u64).pow(U256::from(18))));
            black_box(run_tx(&mut state, &chain, &precompiles, &env, &tx, RunTxOptions::default()).is_ok())
        })
    });
    group.finish();
}

// ============================================================================
// evm-txpool: add and select
// ============================================================================

fn bench_pool_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("evm-txpool");
    let keys: Vec<Secp256k1KeyPair> = (1u8..=10)
        .map(|seed| Secp256k1KeyPair::from_bytes([seed; 32]).unwrap())
        .collect();
    let mut provider = InMemoryStateProvider::new();
    for key in &keys {
        provider.set_balance(Address(key.address()), U256::from(10u64).pow(U256::from(20)));
    }
    let txs: Vec<Transaction> = keys
        .iter()
        .flat_map(|key| (0..20u64).map(move |nonce| transfer(nonce, 1 + nonce % 5).sign(key).unwrap()))
        .collect();

    group.throughput(Throughput::Elements(txs.len() as u64));
    group.bench_function("add_and_select_200", |b| {
        b.iter(|| {
            let mut pool = TxPool::with_defaults();
            for tx in &txs {
                let _ = pool.add(tx.clone(), &provider);
            }
            black_box(pool.txs_by_price_and_nonce(U256::from(GWEI), None).len())
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_state_root,
    bench_interpreter_loop,
    bench_run_tx,
    bench_pool_selection
);
criterion_main!(benches);
