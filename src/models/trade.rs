use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Side;

/// Trade intent produced from an entry event. Not an order: nothing here is
/// filled or managed after it is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: u64,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub side: Side,
    #[serde(with = "rust_decimal::serde::str")]
    pub entry_price: Decimal,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub stop_loss: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub take_profit: Option<Decimal>,
    pub setup_seq: u64,
}
