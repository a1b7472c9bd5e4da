use evm_interpreter::BlockEnv;
use shared_types::Header;

/// Execution environment of the block described by `header`.
pub fn block_env(header: &Header, chain_id: u64) -> BlockEnv {
    BlockEnv {
        number: header.number,
        coinbase: header.coinbase,
        timestamp: header.timestamp,
        gas_limit: header.gas_limit,
        base_fee: header.base_fee(),
        prev_randao: header.mix_hash,
        blob_base_fee: header.blob_gas_price(),
        chain_id,
    }
}
