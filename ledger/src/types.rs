use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: u64,
    /// Asset symbol -> available balance.
    pub balances: HashMap<String, f64>,
    /// Asset symbol -> deposit address. Stable once issued.
    pub deposit_addresses: HashMap<String, String>,
}

impl User {
    pub fn new(user_id: u64, initial_balances: HashMap<String, f64>) -> Self {
        User {
            user_id,
            balances: initial_balances,
            deposit_addresses: HashMap::new(),
        }
    }

    /// Balance for an asset, zero if the user never held it.
    pub fn balance(&self, asset: &str) -> f64 {
        self.balances.get(asset).copied().unwrap_or(0.0)
    }
}

/// One credited blockchain deposit. Presence of a row for a tx_id means the
/// credit has already been applied; the row is the durable idempotency marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositTransaction {
    pub tx_id: String,
    pub user_id: u64,
    pub asset: String,
    pub amount: f64,
    pub address: String,
    pub confirmations: u32,
    /// Millisecond UNIX timestamp assigned when the credit was recorded.
    pub recorded_at: u64,
}
