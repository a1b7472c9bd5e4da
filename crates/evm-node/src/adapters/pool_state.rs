use evm_state::StateManager;
use evm_txpool::{HeadInfo, StateProvider, TxPoolError};
use shared_types::{Address, Header, U256};

/// The pool's view of the node: account reads from the locked state and
/// fee parameters of the block the pool is filling.
pub struct PoolStateView<'a> {
    pub state: &'a StateManager,
    pub head: &'a Header,
}

impl StateProvider for PoolStateView<'_> {
    fn nonce(&self, address: &Address) -> Result<u64, TxPoolError> {
        Ok(self.state.get_account(address)?.nonce)
    }

    fn balance(&self, address: &Address) -> Result<U256, TxPoolError> {
        Ok(self.state.get_account(address)?.balance)
    }

    fn head(&self) -> Result<HeadInfo, TxPoolError> {
        Ok(HeadInfo {
            base_fee: self.head.calc_next_base_fee(),
            gas_limit: self.head.gas_limit,
        })
    }
}
