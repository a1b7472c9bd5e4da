use evm_chain::Blockchain;
use evm_interpreter::BlockHashProvider;
use shared_types::Hash;

/// BLOCKHASH lookups against the canonical chain.
///
/// The interpreter enforces the 256-block window; this only resolves
/// canonical numbers.
#[derive(Clone, Copy, Debug)]
pub struct ChainBlockHashes<'a>(pub &'a Blockchain);

impl BlockHashProvider for ChainBlockHashes<'_> {
    fn block_hash(&self, number: u64) -> Option<Hash> {
        self.0.get_canonical_hash(number)
    }
}
