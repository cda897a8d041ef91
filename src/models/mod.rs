use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod order;
pub mod price;

pub use order::Order;
pub use price::Price;

/// Budget a freshly created worker starts with
pub const DEFAULT_BUDGET: &str = "10000:20000:30000";

/// Lifecycle of a worker. The status alone picks the decision branch of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkerStatus {
    Watching,
    Buying,
    Selling,
    Finished,
}

impl WorkerStatus {
    /// Statuses the driver keeps scheduling
    pub const ACTIVE: [WorkerStatus; 3] = [Self::Watching, Self::Buying, Self::Selling];

    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Finished)
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Watching => "WATCHING",
            Self::Buying => "BUYING",
            Self::Selling => "SELLING",
            Self::Finished => "FINISHED",
        };
        f.write_str(s)
    }
}

/// Exchanges a worker can trade on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Exchange {
    Upbit,
    Bithumb,
    Coinone,
    Fake,
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Upbit => "UPBIT",
            Self::Bithumb => "BITHUMB",
            Self::Coinone => "COINONE",
            Self::Fake => "FAKE",
        };
        f.write_str(s)
    }
}

impl FromStr for Exchange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UPBIT" => Ok(Self::Upbit),
            "BITHUMB" => Ok(Self::Bithumb),
            "COINONE" => Ok(Self::Coinone),
            "FAKE" => Ok(Self::Fake),
            _ => Err(format!("unknown exchange: {}", s)),
        }
    }
}

/// Traded asset. Quote currency is implied by the exchange (KRW for all of them).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Market {
    Btc,
    Eos,
    Eth,
}

impl Market {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Btc => "BTC",
            Self::Eos => "EOS",
            Self::Eth => "ETH",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Market {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BTC" => Ok(Self::Btc),
            "EOS" => Ok(Self::Eos),
            "ETH" => Ok(Self::Eth),
            _ => Err(format!("unknown market: {}", s)),
        }
    }
}

/// Candle granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceUnit {
    Minute,
    Hour,
    Day,
}

impl PriceUnit {
    pub fn duration(&self) -> chrono::Duration {
        match self {
            Self::Minute => chrono::Duration::minutes(1),
            Self::Hour => chrono::Duration::hours(1),
            Self::Day => chrono::Duration::days(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Wait,
    Done,
    Cancelled,
}
