use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::Add;

/// One candle: high, low and last trade price for a fixed time bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub timestamp: DateTime<Utc>,
    pub high: f64,
    pub low: f64,
    /// Last trade (close) price of the bucket
    pub trade: f64,
}

impl Price {
    pub fn new(timestamp: DateTime<Utc>, high: f64, low: f64, trade: f64) -> Self {
        Self {
            timestamp,
            high,
            low,
            trade,
        }
    }

    /// `(high + low + close) / 3`
    pub fn typical(&self) -> f64 {
        (self.high + self.low + self.trade) / 3.0
    }

    /// Most recent candle of a window, whatever order the window is in
    pub fn latest(prices: &[Price]) -> Option<&Price> {
        prices.iter().max_by_key(|p| p.timestamp)
    }

    /// Mean typical price of a window, `None` for an empty window
    pub fn average(prices: &[Price]) -> Option<f64> {
        let total = prices.iter().copied().reduce(|acc, p| acc + p)?;
        Some((total.high + total.low + total.trade) / (3.0 * prices.len() as f64))
    }
}

/// Field-wise accumulation. The result keeps the later timestamp and is only
/// meaningful as an intermediate sum.
impl Add for Price {
    type Output = Price;

    fn add(self, other: Price) -> Price {
        Price {
            timestamp: self.timestamp.max(other.timestamp),
            high: self.high + other.high,
            low: self.low + other.low,
            trade: self.trade + other.trade,
        }
    }
}
