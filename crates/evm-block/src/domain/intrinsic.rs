//! Gas charged before the first opcode runs.

use evm_interpreter::costs;
use shared_types::Transaction;

/// Intrinsic gas of `tx`: base cost, calldata, create surcharge with
/// EIP-3860 init code words, access list entries and EIP-7702
/// authorizations.
pub fn intrinsic_gas(tx: &Transaction) -> u64 {
    let zeros = tx.data.iter().filter(|b| **b == 0).count() as u64;
    let non_zeros = tx.data.len() as u64 - zeros;

    let mut gas = costs::TX_BASE
        .saturating_add(zeros.saturating_mul(costs::TX_DATA_ZERO))
        .saturating_add(non_zeros.saturating_mul(costs::TX_DATA_NON_ZERO));

    if tx.is_create() {
        let words = (tx.data.len() as u64).div_ceil(32);
        gas = gas
            .saturating_add(costs::TX_CREATE)
            .saturating_add(words.saturating_mul(costs::INITCODE_WORD));
    }

    for item in &tx.access_list {
        gas = gas
            .saturating_add(costs::TX_ACCESS_LIST_ADDRESS)
            .saturating_add((item.storage_keys.len() as u64).saturating_mul(costs::TX_ACCESS_LIST_STORAGE_KEY));
    }

    gas.saturating_add((tx.authorization_list.len() as u64).saturating_mul(costs::PER_EMPTY_ACCOUNT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{AccessListItem, Address, Hash, TxType};

    fn transfer() -> Transaction {
        Transaction {
            to: Some(Address::from_low_u64(1)),
            gas_limit: 21_000,
            ..Default::default()
        }
    }

    #[test]
    fn test_plain_transfer_costs_base() {
        assert_eq!(intrinsic_gas(&transfer()), 21_000);
    }

    #[test]
    fn test_calldata_priced_per_byte() {
        let tx = Transaction {
            data: vec![0, 0, 1, 2],
            ..transfer()
        };
        assert_eq!(intrinsic_gas(&tx), 21_000 + 2 * 4 + 2 * 16);
    }

    #[test]
    fn test_create_adds_surcharge_and_initcode_words() {
        let tx = Transaction {
            to: None,
            data: vec![0xff; 33],
            ..transfer()
        };
        // 33 non-zero bytes, two init code words
        assert_eq!(intrinsic_gas(&tx), 21_000 + 33 * 16 + 32_000 + 2 * 2);
    }

    #[test]
    fn test_access_list_entries() {
        let tx = Transaction {
            tx_type: TxType::AccessList,
            access_list: vec![AccessListItem {
                address: Address::from_low_u64(2),
                storage_keys: vec![Hash::ZERO, Hash::keccak(b"k")],
            }],
            ..transfer()
        };
        assert_eq!(intrinsic_gas(&tx), 21_000 + 2_400 + 2 * 1_900);
    }
}
