//! Transaction receipts as committed to the receipts trie.

use crate::bloom::Bloom;
use crate::log::Log;
use crate::rlp;
use crate::transaction::TxType;
use serde::{Deserialize, Serialize};

/// Consensus receipt: status, cumulative gas, bloom and logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// Envelope type of the transaction
    pub tx_type: TxType,
    /// `true` for success, `false` for a reverted or failed execution
    pub status: bool,
    /// Gas used by this and every earlier transaction in the block
    pub cumulative_gas_used: u64,
    /// Bloom over `logs`
    pub logs_bloom: Bloom,
    /// Logs emitted
    pub logs: Vec<Log>,
}

impl Receipt {
    /// Build a receipt, deriving the bloom from `logs`.
    pub fn new(tx_type: TxType, status: bool, cumulative_gas_used: u64, logs: Vec<Log>) -> Self {
        let mut logs_bloom = Bloom::default();
        for log in &logs {
            logs_bloom.accrue_log(log);
        }
        Self {
            tx_type,
            status,
            cumulative_gas_used,
            logs_bloom,
            logs,
        }
    }

    /// `type || rlp([status, cumulative_gas, bloom, logs])`, no prefix for legacy.
    pub fn encode(&self) -> Vec<u8> {
        let logs: Vec<Vec<u8>> = self.logs.iter().map(Log::rlp_encode).collect();
        let status = if self.status { vec![1u8] } else { vec![] };
        let body = rlp::encode_list(&[
            rlp::encode_bytes(&status),
            rlp::encode_u64(self.cumulative_gas_used),
            rlp::encode_bytes(self.logs_bloom.as_bytes()),
            rlp::encode_list(&logs),
        ]);
        if self.tx_type == TxType::Legacy {
            body
        } else {
            let mut out = Vec::with_capacity(body.len() + 1);
            out.push(self.tx_type as u8);
            out.extend(body);
            out
        }
    }
}
