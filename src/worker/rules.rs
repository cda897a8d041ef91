use crate::models::PriceUnit;
use serde::{Deserialize, Serialize};

/// Tunables of the worker state machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingRules {
    /// Sell target as a multiple of the buy-price average
    pub sell_rate: f64,

    /// Averaging-down entry as a multiple of the latest buy price
    pub additional_buy_rate: f64,

    /// Smallest tranche worth an order; smaller remainders are dropped
    pub min_order_budget: u64,

    /// Candles in the price window
    pub price_window: usize,

    pub price_unit: PriceUnit,
}

impl Default for TradingRules {
    fn default() -> Self {
        Self {
            sell_rate: 1.02,
            additional_buy_rate: 0.97,
            min_order_budget: 5000,
            price_window: 24,
            price_unit: PriceUnit::Hour,
        }
    }
}
