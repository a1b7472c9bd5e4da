use super::nibbles::Nibbles;
use shared_types::{rlp, Hash, EMPTY_ROOT};

// =============================================================================
// TRIE NODE: The four node types in MPT
// =============================================================================

/// Node types in the Merkle-Patricia trie.
///
/// Children are held by value. A child whose encoding is shorter than 32
/// bytes is embedded in its parent; longer children are referenced by hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrieNode {
    /// Empty node (null reference, hash = EMPTY_ROOT).
    Empty,

    /// Leaf node: `[hex_prefix(path, true), value]`.
    Leaf {
        /// Remaining path from this position to the key's end.
        path: Nibbles,
        /// Stored value.
        value: Vec<u8>,
    },

    /// Extension node: `[hex_prefix(path, false), child_ref]`.
    Extension {
        /// Shared prefix.
        path: Nibbles,
        /// The branch below the prefix.
        child: Box<TrieNode>,
    },

    /// Branch node: `[child_ref[0], ..., child_ref[15], value]`.
    Branch {
        /// One slot per nibble.
        children: Box<[TrieNode; 16]>,
        /// Value of a key ending exactly here.
        value: Option<Vec<u8>>,
    },
}

impl TrieNode {
    /// Build the canonical trie for `entries`, which must be sorted by key
    /// with no duplicates.
    pub fn build(entries: &[(Nibbles, Vec<u8>)]) -> Self {
        Self::build_at(entries, 0)
    }

    fn build_at(entries: &[(Nibbles, Vec<u8>)], depth: usize) -> Self {
        match entries {
            [] => TrieNode::Empty,
            [(key, value)] => TrieNode::Leaf {
                path: key.slice(depth),
                value: value.clone(),
            },
            [first, .., last] => {
                // Sorted input: the first and last keys bound the shared prefix.
                let shared = first.0.slice(depth).common_prefix_len(&last.0.slice(depth));
                if shared > 0 {
                    return TrieNode::Extension {
                        path: first.0.slice_range(depth, depth + shared),
                        child: Box::new(Self::build_at(entries, depth + shared)),
                    };
                }

                let mut rest = entries;
                let mut value = None;
                if rest[0].0.len() == depth {
                    value = Some(rest[0].1.clone());
                    rest = &rest[1..];
                }

                let mut children: [TrieNode; 16] = std::array::from_fn(|_| TrieNode::Empty);
                let mut start = 0;
                while start < rest.len() {
                    let nibble = rest[start].0.at(depth);
                    let end = start
                        + rest[start..]
                            .iter()
                            .take_while(|(k, _)| k.at(depth) == nibble)
                            .count();
                    children[nibble as usize] = Self::build_at(&rest[start..end], depth + 1);
                    start = end;
                }
                TrieNode::Branch {
                    children: Box::new(children),
                    value,
                }
            }
        }
    }

    /// RLP-encode this node.
    pub fn rlp_encode(&self) -> Vec<u8> {
        match self {
            TrieNode::Empty => vec![0x80],

            TrieNode::Leaf { path, value } => rlp::encode_list(&[
                rlp::encode_bytes(&path.encode_hex_prefix(true)),
                rlp::encode_bytes(value),
            ]),

            TrieNode::Extension { path, child } => rlp::encode_list(&[
                rlp::encode_bytes(&path.encode_hex_prefix(false)),
                child.reference(),
            ]),

            TrieNode::Branch { children, value } => {
                let mut items: Vec<Vec<u8>> = children.iter().map(TrieNode::reference).collect();
                items.push(rlp::encode_bytes(value.as_deref().unwrap_or_default()));
                rlp::encode_list(&items)
            }
        }
    }

    /// How a parent refers to this node: inline below 32 bytes, else by hash.
    pub fn reference(&self) -> Vec<u8> {
        if matches!(self, TrieNode::Empty) {
            return vec![0x80];
        }
        let encoded = self.rlp_encode();
        if encoded.len() < 32 {
            encoded
        } else {
            rlp::encode_hash(&Hash::keccak(&encoded))
        }
    }

    /// Root hash. The root is always hashed, however short.
    pub fn hash(&self) -> Hash {
        if matches!(self, TrieNode::Empty) {
            return EMPTY_ROOT;
        }
        Hash::keccak(&self.rlp_encode())
    }

    /// Collect the hash-referenced nodes on the path to `key`, root first.
    pub fn collect_proof(&self, key: &Nibbles, out: &mut Vec<Vec<u8>>) {
        let mut node = self;
        let mut depth = 0;
        let mut is_root = true;
        loop {
            if matches!(node, TrieNode::Empty) {
                return;
            }
            let encoded = node.rlp_encode();
            if is_root || encoded.len() >= 32 {
                out.push(encoded);
            }
            is_root = false;
            match node {
                TrieNode::Empty | TrieNode::Leaf { .. } => return,
                TrieNode::Extension { path, child } => {
                    if !key.0[depth..].starts_with(&path.0) {
                        return;
                    }
                    depth += path.len();
                    node = child.as_ref();
                }
                TrieNode::Branch { children, .. } => {
                    if depth >= key.len() {
                        return;
                    }
                    node = &children[key.at(depth) as usize];
                    depth += 1;
                }
            }
        }
    }
}
