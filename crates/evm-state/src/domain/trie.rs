//! # Merkle-Patricia Trie
//!
//! An in-memory key/value map that materializes the canonical trie on
//! demand. Roots and proofs are derived from the sorted entries, so the
//! result never depends on insertion order.

use super::nibbles::Nibbles;
use super::node::TrieNode;
use crate::errors::StateError;
use shared_types::rlp::{self, RlpItem};
use shared_types::{Hash, EMPTY_ROOT};
use std::collections::{BTreeMap, HashMap};

/// Trie over raw byte keys.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MerkleTrie {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MerkleTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `value` under `key`. An empty value removes the key.
    pub fn insert(&mut self, key: &[u8], value: Vec<u8>) {
        if value.is_empty() {
            self.entries.remove(key);
        } else {
            self.entries.insert(key.to_vec(), value);
        }
    }

    pub fn remove(&mut self, key: &[u8]) {
        self.entries.remove(key);
    }

    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn root_node(&self) -> TrieNode {
        // Byte order and nibble order agree, so the BTreeMap is already sorted.
        let entries: Vec<(Nibbles, Vec<u8>)> = self
            .entries
            .iter()
            .map(|(k, v)| (Nibbles::from_bytes(k), v.clone()))
            .collect();
        TrieNode::build(&entries)
    }

    /// Root hash.
    pub fn root(&self) -> Hash {
        self.root_node().hash()
    }

    /// Nodes on the path to `key`, root first. Works for absent keys too.
    pub fn proof(&self, key: &[u8]) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        self.root_node()
            .collect_proof(&Nibbles::from_bytes(key), &mut out);
        out
    }
}

/// Trie over keccak-hashed keys (the state and storage tries).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SecureTrie {
    inner: MerkleTrie,
}

impl SecureTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert under `keccak256(key)`.
    pub fn insert(&mut self, key: &[u8], value: Vec<u8>) {
        self.inner.insert(&shared_crypto::keccak256(key), value);
    }

    pub fn root(&self) -> Hash {
        self.inner.root()
    }

    /// Proof for `keccak256(key)`.
    pub fn proof(&self, key: &[u8]) -> Vec<Vec<u8>> {
        self.inner.proof(&shared_crypto::keccak256(key))
    }
}

/// Root of a trie keyed by `rlp(index)` (transactions, receipts, withdrawals).
pub fn ordered_trie_root(items: &[Vec<u8>]) -> Hash {
    if items.is_empty() {
        return EMPTY_ROOT;
    }
    let mut trie = MerkleTrie::new();
    for (i, item) in items.iter().enumerate() {
        trie.insert(&rlp::encode_u64(i as u64), item.clone());
    }
    trie.root()
}

/// Walk `proof` from `root` along `key`.
///
/// Returns the stored value, or `None` when the proof shows the key absent.
///
/// # Errors
///
/// `InvalidProof` when a referenced node is missing or malformed.
pub fn verify_proof(root: Hash, key: &[u8], proof: &[Vec<u8>]) -> Result<Option<Vec<u8>>, StateError> {
    if root == EMPTY_ROOT && proof.is_empty() {
        return Ok(None);
    }
    let nodes: HashMap<Hash, &Vec<u8>> = proof.iter().map(|n| (Hash::keccak(n), n)).collect();
    let key = Nibbles::from_bytes(key);
    let mut current = lookup(&nodes, &root)?;
    let mut depth = 0;
    loop {
        match step(&current, &key, &mut depth, &nodes)? {
            Step::Done(value) => return Ok(value),
            Step::Next(node) => current = node,
        }
    }
}

enum Step {
    Done(Option<Vec<u8>>),
    Next(Vec<u8>),
}

fn invalid(e: impl std::fmt::Display) -> StateError {
    StateError::InvalidProof(e.to_string())
}

fn lookup(nodes: &HashMap<Hash, &Vec<u8>>, hash: &Hash) -> Result<Vec<u8>, StateError> {
    nodes
        .get(hash)
        .map(|n| (*n).clone())
        .ok_or_else(|| StateError::InvalidProof(format!("missing node {hash:?}")))
}

fn step(
    encoded: &[u8],
    key: &Nibbles,
    depth: &mut usize,
    nodes: &HashMap<Hash, &Vec<u8>>,
) -> Result<Step, StateError> {
    let item = rlp::decode(encoded).map_err(invalid)?;
    let fields = item.as_list().map_err(invalid)?;
    let next = match fields.len() {
        17 => {
            if *depth == key.len() {
                return Ok(Step::Done(non_empty(fields[16].as_bytes().ok())));
            }
            let child = &fields[key.at(*depth) as usize];
            *depth += 1;
            child
        }
        2 => {
            let (path, is_leaf) = Nibbles::decode_hex_prefix(fields[0].as_bytes().map_err(invalid)?);
            let remaining = &key.0[(*depth).min(key.len())..];
            if is_leaf {
                let found = remaining == path.0.as_slice();
                return Ok(Step::Done(if found {
                    non_empty(fields[1].as_bytes().ok())
                } else {
                    None
                }));
            }
            if !remaining.starts_with(&path.0) {
                return Ok(Step::Done(None));
            }
            *depth += path.len();
            &fields[1]
        }
        n => return Err(StateError::InvalidProof(format!("node with {n} fields"))),
    };

    match next {
        RlpItem::Bytes(b) if b.is_empty() => Ok(Step::Done(None)),
        RlpItem::Bytes(b) => {
            let hash = Hash::from_slice(b).ok_or_else(|| invalid("bad child reference"))?;
            lookup(nodes, &hash).map(Step::Next)
        }
        RlpItem::List(_) => Ok(Step::Next(reencode(next))),
    }
}

fn non_empty(bytes: Option<&[u8]>) -> Option<Vec<u8>> {
    bytes.filter(|b| !b.is_empty()).map(<[u8]>::to_vec)
}

fn reencode(item: &RlpItem<'_>) -> Vec<u8> {
    match item {
        RlpItem::Bytes(b) => rlp::encode_bytes(b),
        RlpItem::List(items) => {
            let encoded: Vec<Vec<u8>> = items.iter().map(reencode).collect();
            rlp::encode_list(&encoded)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_root() {
        assert_eq!(MerkleTrie::new().root(), EMPTY_ROOT);
        assert_eq!(ordered_trie_root(&[]), EMPTY_ROOT);
    }

    #[test]
    fn test_known_root_doe_dog_dogglesworth() {
        let mut trie = MerkleTrie::new();
        trie.insert(b"doe", b"reindeer".to_vec());
        trie.insert(b"dog", b"puppy".to_vec());
        trie.insert(b"dogglesworth", b"cat".to_vec());
        assert_eq!(
            format!("{:?}", trie.root()),
            "0x8aad789dff2f538bca5d8ea56e8abe10f4c7ba3a5dea95fea4cd6e7c3a1168d3"
        );
    }

    #[test]
    fn test_insertion_order_irrelevant() {
        let mut a = MerkleTrie::new();
        let mut b = MerkleTrie::new();
        for i in 0..50u8 {
            a.insert(&[i, i.wrapping_mul(7)], vec![i + 1]);
        }
        for i in (0..50u8).rev() {
            b.insert(&[i, i.wrapping_mul(7)], vec![i + 1]);
        }
        assert_eq!(a.root(), b.root());
    }

    #[test]
    fn test_empty_value_removes() {
        let mut trie = MerkleTrie::new();
        trie.insert(b"k", b"v".to_vec());
        trie.insert(b"k", vec![]);
        assert_eq!(trie.root(), EMPTY_ROOT);
    }

    #[test]
    fn test_proof_inclusion_and_exclusion() {
        let mut trie = SecureTrie::new();
        for i in 0..40u8 {
            trie.insert(&[i], vec![0xAA; (i as usize % 40) + 1]);
        }
        let root = trie.root();

        let proof = trie.proof(&[7]);
        let value = verify_proof(root, &shared_crypto::keccak256(&[7]), &proof).unwrap();
        assert_eq!(value, Some(vec![0xAA; 8]));

        let absent = trie.proof(&[200]);
        let value = verify_proof(root, &shared_crypto::keccak256(&[200]), &absent).unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn test_proof_with_inline_nodes() {
        let mut trie = MerkleTrie::new();
        trie.insert(&[0x01], vec![1]);
        trie.insert(&[0x02], vec![2]);
        trie.insert(&[0x13], vec![3]);
        let root = trie.root();
        for (key, expected) in [([0x01u8], 1u8), ([0x02], 2), ([0x13], 3)] {
            let proof = trie.proof(&key);
            assert_eq!(verify_proof(root, &key, &proof).unwrap(), Some(vec![expected]));
        }
    }

    #[test]
    fn test_proof_missing_root_rejected() {
        let err = verify_proof(Hash::new([1; 32]), &[1], &[]).unwrap_err();
        assert!(matches!(err, StateError::InvalidProof(_)));
    }

    #[test]
    fn test_ordered_root_changes_with_order() {
        let a = ordered_trie_root(&[vec![1], vec![2]]);
        let b = ordered_trie_root(&[vec![2], vec![1]]);
        assert_ne!(a, b);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;
        use std::collections::BTreeMap;

        fn entries() -> impl Strategy<Value = BTreeMap<Vec<u8>, Vec<u8>>> {
            prop::collection::btree_map(
                prop::collection::vec(any::<u8>(), 1..6),
                prop::collection::vec(any::<u8>(), 1..40),
                0..24,
            )
        }

        proptest! {
            #[test]
            fn prop_root_ignores_insertion_order(
                (map, order) in entries().prop_flat_map(|map| {
                    let keys: Vec<Vec<u8>> = map.keys().cloned().collect();
                    (Just(map), Just(keys).prop_shuffle())
                })
            ) {
                let mut sorted = MerkleTrie::new();
                for (key, value) in &map {
                    sorted.insert(key, value.clone());
                }
                let mut shuffled = MerkleTrie::new();
                for key in &order {
                    shuffled.insert(key, map[key].clone());
                }
                prop_assert_eq!(sorted.root(), shuffled.root());
            }

            #[test]
            fn prop_every_key_proves_its_value(map in entries()) {
                let mut trie = MerkleTrie::new();
                for (key, value) in &map {
                    trie.insert(key, value.clone());
                }
                let root = trie.root();
                for (key, value) in &map {
                    let proven = verify_proof(root, key, &trie.proof(key)).unwrap();
                    prop_assert_eq!(proven.as_deref(), Some(value.as_slice()));
                }
            }
        }
    }
}
