mod block_hashes;

pub use block_hashes::ChainBlockHashes;
