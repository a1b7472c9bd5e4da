use crate::config::ChainConfig;
use evm_state::StateManager;
use shared_types::{Account, Block, Hash, Header, EMPTY_ROOT};

/// Fund the configured accounts and return the genesis block over them.
pub fn genesis_block(config: &ChainConfig, state: &mut StateManager) -> Block {
    for account in &config.prefunded {
        state.put_account(account.address, Account::new(0, account.balance));
    }
    let header = Header {
        coinbase: config.coinbase,
        state_root: state.state_root(),
        number: 0,
        gas_limit: config.gas_limit,
        timestamp: config.genesis_timestamp,
        base_fee_per_gas: Some(config.base_fee),
        withdrawals_root: Some(EMPTY_ROOT),
        blob_gas_used: Some(0),
        excess_blob_gas: Some(0),
        parent_beacon_block_root: Some(Hash::ZERO),
        ..Header::default()
    };
    Block {
        header,
        ..Block::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenesisAccount;
    use shared_types::{Address, U256};

    #[test]
    fn test_genesis_commits_prefunded_accounts() {
        let config = ChainConfig {
            prefunded: vec![GenesisAccount {
                address: Address::from_low_u64(1),
                balance: U256::from(5),
            }],
            ..ChainConfig::default()
        };
        let mut state = StateManager::new();
        let block = genesis_block(&config, &mut state);

        assert_eq!(block.number(), 0);
        assert_eq!(block.header.state_root, state.state_root());
        assert_ne!(block.header.state_root, EMPTY_ROOT);
        assert_eq!(block.header.base_fee_per_gas, Some(config.base_fee));
        assert_eq!(state.get_account(&Address::from_low_u64(1)).unwrap().balance, U256::from(5));
    }
}
