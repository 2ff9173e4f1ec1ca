//! Wallet payloads.

use serde::{Deserialize, Serialize};

/// `wallet_balance_update` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletBalanceUpdate {
    pub balance: f64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default, alias = "driverId", alias = "passengerId")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}
