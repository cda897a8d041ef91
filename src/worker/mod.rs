// Per-market decision engine
pub mod rules;
pub mod tick;

pub use rules::TradingRules;
pub use tick::{work, TickAction, TickOutcome, WorkerError};

use crate::budget::Budget;
use crate::models::{
    Exchange, Market, Order, OrderSide, OrderStatus, Price, WorkerStatus, DEFAULT_BUDGET,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Trading state of one market.
///
/// Everything a tick needs is in here, so a worker can be loaded, ticked and
/// saved as one unit. Orders are keyed by exchange order id and only ever
/// replaced by fresher snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub worker_id: Uuid,
    pub market: Market,
    pub exchange: Exchange,
    pub status: WorkerStatus,
    pub budget: Budget,
    orders: BTreeMap<String, Order>,
    /// Free balance of the traded asset as of the last refresh
    pub balance: f64,
    /// Latest candle window as returned by the exchange
    pub prices: Vec<Price>,
}

impl Worker {
    pub fn new(market: Market, exchange: Exchange, budget: Budget) -> Self {
        Self {
            worker_id: Uuid::new_v4(),
            market,
            exchange,
            status: WorkerStatus::Watching,
            budget,
            orders: BTreeMap::new(),
            balance: 0.0,
            prices: Vec::new(),
        }
    }

    /// Worker with the default tranche ledger
    pub fn with_default_budget(market: Market, exchange: Exchange) -> Self {
        let budget = DEFAULT_BUDGET.parse().unwrap_or_default();
        Self::new(market, exchange, budget)
    }

    pub fn with_status(mut self, status: WorkerStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_orders(mut self, orders: impl IntoIterator<Item = Order>) -> Self {
        for order in orders {
            self.upsert_order(order);
        }
        self
    }

    pub fn with_prices(mut self, prices: Vec<Price>) -> Self {
        self.prices = prices;
        self
    }

    pub fn with_balance(mut self, balance: f64) -> Self {
        self.balance = balance;
        self
    }

    // ------------------------------------------------------------------
    // Orders
    // ------------------------------------------------------------------

    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    pub fn order(&self, order_id: &str) -> Option<&Order> {
        self.orders.get(order_id)
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// Insert a new order or replace the stored snapshot with the same id
    pub fn upsert_order(&mut self, order: Order) {
        self.orders.insert(order.order_id.clone(), order);
    }

    pub fn orders_by_status(&self, statuses: &[OrderStatus]) -> Vec<&Order> {
        self.orders()
            .filter(|o| statuses.contains(&o.status))
            .collect()
    }

    pub fn orders_by_side(&self, sides: &[OrderSide]) -> Vec<&Order> {
        self.orders().filter(|o| sides.contains(&o.side)).collect()
    }

    /// Most recently created order, optionally restricted to one side
    pub fn latest_order(&self, side: Option<OrderSide>) -> Option<&Order> {
        self.orders()
            .filter(|o| side.map_or(true, |s| o.side == s))
            .max_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.order_id.cmp(&b.order_id))
            })
    }

    /// Mean of `price * executed_volume + paid_fee` over all buy orders.
    ///
    /// Divides by the number of buy orders, not by the executed volume.
    pub fn buy_price_average(&self) -> Option<f64> {
        let buys = self.orders_by_side(&[OrderSide::Buy]);
        if buys.is_empty() {
            return None;
        }
        let total: f64 = buys.iter().map(|o| o.executed_funds()).sum();
        Some(total / buys.len() as f64)
    }

    // ------------------------------------------------------------------
    // Prices
    // ------------------------------------------------------------------

    /// Close of the newest candle
    pub fn trade_price(&self) -> Option<f64> {
        Price::latest(&self.prices).map(|p| p.trade)
    }

    /// Mean typical price of the window
    pub fn price_average(&self) -> Option<f64> {
        Price::average(&self.prices)
    }

    /// Price at which to average down: latest buy price scaled by the rules
    pub fn next_additional_buy_price(&self, rules: &TradingRules) -> Option<f64> {
        self.latest_order(Some(OrderSide::Buy))
            .map(|o| o.price * rules.additional_buy_rate)
    }

    // ------------------------------------------------------------------
    // Budget
    // ------------------------------------------------------------------

    pub fn unit_budget(&self, rules: &TradingRules) -> u64 {
        self.budget.unit(rules.min_order_budget)
    }

    // ------------------------------------------------------------------
    // Decisions
    // ------------------------------------------------------------------

    /// Mean-reversion entry: the last trade sits below the window's typical price
    pub fn is_buy_timing(&self) -> bool {
        match (self.trade_price(), self.price_average()) {
            (Some(trade), Some(average)) => trade < average,
            _ => false,
        }
    }

    /// A resting buy should be pulled because the price ran away from it.
    ///
    /// With a partial position the reference is the buy-price average,
    /// without one it is the order's own limit price.
    pub fn need_to_cancel_buy_order(&self) -> bool {
        let (Some(latest), Some(trade)) = (self.latest_order(None), self.trade_price()) else {
            return false;
        };

        let rising_over_average = self
            .buy_price_average()
            .is_some_and(|average| trade >= average);
        let rising_over_order = trade > latest.price;
        let has_balance = self.balance > 0.0;

        self.status == WorkerStatus::Buying
            && latest.is_waiting()
            && ((has_balance && rising_over_average) || (!has_balance && rising_over_order))
    }

    /// A resting sell should be pulled so the position can be averaged down
    pub fn need_to_cancel_sell_order(&self, rules: &TradingRules) -> bool {
        let (Some(latest), Some(_), Some(trade), Some(next_buy)) = (
            self.latest_order(None),
            self.latest_order(Some(OrderSide::Buy)),
            self.trade_price(),
            self.next_additional_buy_price(rules),
        ) else {
            return false;
        };

        self.status == WorkerStatus::Selling
            && latest.is_waiting()
            && trade <= next_buy
            && self.unit_budget(rules) > 0
    }

    /// The latest order settled and there is something to sell or add to
    pub fn need_to_sell_or_buy_order(&self) -> bool {
        self.latest_order(None)
            .is_some_and(|latest| !latest.is_waiting() && self.balance > 0.0)
    }
}
