// Exchange port: the capability interface a worker trades through
pub mod error;
pub mod fake;
pub mod registry;
pub mod tick;

pub use error::ApiError;
pub use fake::{FakeExchangeApi, FakeExchangeConfig, FillPolicy};
pub use registry::{ApiFactory, ExchangeRegistry};
pub use tick::TickTable;

use crate::models::{Market, Order, OrderSide, Price, PriceUnit};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Order, balance and candle access for one market of one exchange.
///
/// Adapters hold no trading state of their own; every call is a round trip to
/// the exchange and any failure comes back as an [`ApiError`].
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// Market this adapter is bound to
    fn market(&self) -> Market;

    /// Place a limit buy spending `budget` (fee included) at the normalized `price`
    async fn buy_order(&self, price: f64, budget: u64) -> Result<Order, ApiError>;

    /// Place a limit sell of `volume` at the normalized `price`
    async fn sell_order(&self, price: f64, volume: f64) -> Result<Order, ApiError>;

    /// Cancel a resting order, returning its id
    async fn cancel_order(&self, order_id: &str) -> Result<String, ApiError>;

    async fn get_order(&self, order_id: &str) -> Result<Order, ApiError>;

    /// Current snapshots of the given orders.
    ///
    /// Open and closed orders are fetched separately and concatenated, so the
    /// result does not follow the order of `order_ids`. Unknown ids are skipped.
    async fn get_orders(&self, order_ids: &[String]) -> Result<Vec<Order>, ApiError>;

    /// The `count` most recent candles of `unit` up to `to` (default: now),
    /// newest first.
    async fn get_prices(
        &self,
        unit: PriceUnit,
        count: usize,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Price>, ApiError>;

    /// Free (not locked in orders) balance of the traded asset
    async fn get_balance(&self) -> Result<f64, ApiError>;

    /// Snap `price` onto the exchange's tick grid, down for buys and up for sells
    fn make_valid_order_price(&self, side: OrderSide, price: f64) -> f64;
}
