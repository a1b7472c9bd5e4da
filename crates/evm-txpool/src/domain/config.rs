use serde::Deserialize;
use shared_types::U256;

/// Pool limits.
///
/// Local transactions bypass the capacity, minimum tip, per-sender and base
/// fee headroom checks.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TxPoolConfig {
    /// Maximum number of pooled transactions.
    pub max_pool_size: usize,
    /// Maximum pooled transactions per sender.
    pub max_per_sender: usize,
    /// Minimum tip in wei for remote transactions.
    pub min_gas_price: U256,
    /// Percentage a replacement must raise both fee fields by.
    pub min_price_bump_percent: u64,
    /// Largest accepted calldata in bytes.
    pub max_data_size: usize,
    /// How long a transaction may sit in the pool, in milliseconds.
    pub pool_ttl_ms: u64,
    /// How long handled hashes are remembered, in milliseconds.
    pub handled_ttl_ms: u64,
    /// Buffer size of the event channel.
    pub event_capacity: usize,
}

impl Default for TxPoolConfig {
    fn default() -> Self {
        Self {
            max_pool_size: 5000,
            max_per_sender: 100,
            min_gas_price: U256::from(100_000_000u64),
            min_price_bump_percent: 10,
            max_data_size: 128 * 1024,
            pool_ttl_ms: 20 * 60 * 1000,
            handled_ttl_ms: 60 * 60 * 1000,
            event_capacity: 1024,
        }
    }
}

impl TxPoolConfig {
    /// `value` raised by the configured bump percentage.
    pub fn bumped(&self, value: U256) -> U256 {
        value.saturating_add(value.saturating_mul(U256::from(self.min_price_bump_percent)) / 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bumped_adds_ten_percent() {
        let config = TxPoolConfig::default();
        assert_eq!(config.bumped(U256::from(1000)), U256::from(1100));
        assert_eq!(config.bumped(U256::from(5)), U256::from(5));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: TxPoolConfig = serde_json::from_str(r#"{"maxPerSender": 3}"#).unwrap();
        assert_eq!(config.max_per_sender, 3);
        assert_eq!(config.max_pool_size, 5000);
    }
}
