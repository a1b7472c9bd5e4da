pub mod dump;
pub mod layers;
pub mod nibbles;
pub mod node;
pub mod parallel;
pub mod trie;

pub use dump::{AccountDump, AccountProof, StateDump, StorageProof};
pub use layers::{Layer, Lookup};
pub use nibbles::Nibbles;
pub use node::TrieNode;
pub use parallel::{compute_storage_roots, storage_root, storage_trie, StorageUpdate};
pub use trie::{ordered_trie_root, verify_proof, MerkleTrie, SecureTrie};
