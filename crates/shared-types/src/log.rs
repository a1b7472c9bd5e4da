//! Event logs emitted by `LOG0`..`LOG4`.

use crate::bloom::Bloom;
use crate::primitives::{Address, Bytes, Hash};
use crate::rlp;
use serde::{Deserialize, Serialize};

/// A single log entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Log {
    /// Emitting contract
    pub address: Address,
    /// Indexed topics (0 to 4)
    pub topics: Vec<Hash>,
    /// Unindexed payload
    #[serde(with = "crate::quantity::bytes_hex")]
    pub data: Bytes,
}

impl Log {
    /// `rlp([address, [topics...], data])`.
    pub fn rlp_encode(&self) -> Vec<u8> {
        let topics: Vec<Vec<u8>> = self.topics.iter().map(rlp::encode_hash).collect();
        rlp::encode_list(&[
            rlp::encode_address(&self.address),
            rlp::encode_list(&topics),
            rlp::encode_bytes(&self.data),
        ])
    }

    /// Bloom over this log's address and topics.
    pub fn bloom(&self) -> Bloom {
        let mut bloom = Bloom::default();
        bloom.accrue_log(self);
        bloom
    }
}
