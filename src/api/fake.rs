use super::{ApiError, ExchangeApi, TickTable};
use crate::models::{Market, Order, OrderSide, OrderStatus, Price, PriceUnit};
use async_trait::async_trait;
use chrono::{DateTime, Duration, DurationRound, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// When resting orders get executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPolicy {
    /// Every waiting order is filled the first time it is queried
    OnQuery,
    /// Orders only fill through [`FakeExchangeApi::fill_order`]
    Manual,
}

#[derive(Debug, Clone)]
pub struct FakeExchangeConfig {
    pub fee_rate: f64,
    pub fill_policy: FillPolicy,
    /// Seed for the random-walk price feed. `None` serves scripted candles only.
    pub seed: Option<u64>,
    pub start_price: f64,
    /// Max relative move per candle of the random walk
    pub volatility: f64,
}

impl Default for FakeExchangeConfig {
    fn default() -> Self {
        Self {
            fee_rate: 0.0005,
            fill_policy: FillPolicy::OnQuery,
            seed: None,
            start_price: 50_000.0,
            volatility: 0.02,
        }
    }
}

struct RandomWalk {
    rng: StdRng,
    anchor: DateTime<Utc>,
    last_trade: f64,
    volatility: f64,
    /// `(high, low, trade)` oldest first
    history: Vec<(f64, f64, f64)>,
}

impl RandomWalk {
    fn step(&mut self) {
        let change = self.rng.gen_range(-self.volatility..=self.volatility);
        let trade = (self.last_trade * (1.0 + change)).max(1.0);
        let spread = trade * self.volatility * self.rng.gen_range(0.0..=1.0);
        let high = trade.max(self.last_trade) + spread / 2.0;
        let low = (trade.min(self.last_trade) - spread / 2.0).max(0.5);
        self.history.push((high, low, trade));
        self.last_trade = trade;
    }

    fn window(&self, unit: PriceUnit, count: usize) -> Vec<Price> {
        let newest = self.history.len() as i32 - 1;
        self.history
            .iter()
            .enumerate()
            .rev()
            .take(count)
            .map(|(i, &(high, low, trade))| {
                let offset = unit.duration() * (i as i32 - newest);
                Price::new(self.anchor + offset, high, low, trade)
            })
            .collect()
    }
}

struct FakeState {
    orders: Vec<Order>,
    prices: Vec<Price>,
    walk: Option<RandomWalk>,
    /// Held asset including what is locked in waiting sell orders
    holdings: f64,
    failures_left: u32,
    /// Delay applied before every port call
    latency: std::time::Duration,
    last_created: Option<DateTime<Utc>>,
}

impl FakeState {
    fn next_created_at(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let created = match self.last_created {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_created = Some(created);
        created
    }

    fn locked(&self) -> f64 {
        self.orders
            .iter()
            .filter(|o| o.side == OrderSide::Sell && o.is_waiting())
            .map(|o| o.ordered_volume - o.executed_volume)
            .sum()
    }

    fn take_failure(&mut self) -> Result<(), ApiError> {
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(ApiError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }

    fn execute(&mut self, index: usize, volume: f64, fee_rate: f64) {
        let order = &mut self.orders[index];
        let volume = volume.min(order.ordered_volume - order.executed_volume);
        if volume <= 0.0 {
            return;
        }

        order.executed_volume += volume;
        order.paid_fee += order.price * volume * fee_rate;
        if order.executed_volume >= order.ordered_volume {
            order.status = OrderStatus::Done;
        }

        let side = order.side;
        match side {
            OrderSide::Buy => self.holdings += volume,
            OrderSide::Sell => self.holdings -= volume,
        }
    }
}

/// In-memory exchange for tests and paper trading.
///
/// Deterministic: prices are either scripted through [`set_prices`](Self::set_prices)
/// or produced by a seeded random walk, and orders fill according to the
/// configured [`FillPolicy`].
pub struct FakeExchangeApi {
    market: Market,
    config: FakeExchangeConfig,
    ticks: TickTable,
    state: Mutex<FakeState>,
}

impl FakeExchangeApi {
    pub fn new(market: Market) -> Self {
        Self::with_config(market, FakeExchangeConfig::default())
    }

    pub fn with_config(market: Market, config: FakeExchangeConfig) -> Self {
        let walk = config.seed.map(|seed| {
            let anchor = Utc::now()
                .duration_trunc(Duration::hours(1))
                .unwrap_or_else(|_| Utc::now());
            RandomWalk {
                rng: StdRng::seed_from_u64(seed),
                anchor,
                last_trade: config.start_price,
                volatility: config.volatility,
                history: Vec::new(),
            }
        });

        Self {
            market,
            config,
            ticks: TickTable::krw(),
            state: Mutex::new(FakeState {
                orders: Vec::new(),
                prices: Vec::new(),
                walk,
                holdings: 0.0,
                failures_left: 0,
                latency: std::time::Duration::ZERO,
                last_created: None,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the scripted candle feed
    pub fn set_prices(&self, prices: Vec<Price>) {
        self.state().prices = prices;
    }

    /// Set the held asset, excluding anything locked in resting sells
    pub fn set_balance(&self, balance: f64) {
        let mut state = self.state();
        let locked = state.locked();
        state.holdings = balance + locked;
    }

    /// Make the next `calls` port calls fail with [`ApiError::Unavailable`]
    pub fn fail_next_calls(&self, calls: u32) {
        self.state().failures_left = calls;
    }

    /// Make every later port call take `latency` before answering
    pub fn set_latency(&self, latency: std::time::Duration) {
        self.state().latency = latency;
    }

    async fn round_trip(&self) {
        let latency = self.state().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    /// Fully execute a resting order
    pub fn fill_order(&self, order_id: &str) -> Result<(), ApiError> {
        let remaining = self.remaining_volume(order_id)?;
        self.fill_order_partially(order_id, remaining)
    }

    /// Execute `volume` of a resting order; it stays waiting until fully filled
    pub fn fill_order_partially(&self, order_id: &str, volume: f64) -> Result<(), ApiError> {
        let fee_rate = self.config.fee_rate;
        let mut state = self.state();
        let index = state
            .orders
            .iter()
            .position(|o| o.order_id == order_id && o.is_waiting())
            .ok_or_else(|| ApiError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;
        state.execute(index, volume, fee_rate);
        Ok(())
    }

    /// Every order placed so far, oldest first
    pub fn orders(&self) -> Vec<Order> {
        self.state().orders.clone()
    }

    fn remaining_volume(&self, order_id: &str) -> Result<f64, ApiError> {
        self.state()
            .orders
            .iter()
            .find(|o| o.order_id == order_id)
            .map(|o| o.ordered_volume - o.executed_volume)
            .ok_or_else(|| ApiError::OrderNotFound {
                order_id: order_id.to_string(),
            })
    }

    fn place(&self, side: OrderSide, price: f64, volume: f64) -> Result<Order, ApiError> {
        let mut state = self.state();
        state.take_failure()?;

        let order = Order {
            order_id: Uuid::new_v4().to_string(),
            side,
            status: OrderStatus::Wait,
            price,
            ordered_volume: volume,
            executed_volume: 0.0,
            paid_fee: 0.0,
            created_at: state.next_created_at(),
        };
        state.orders.push(order.clone());

        tracing::debug!(
            market = %self.market,
            order_id = %order.order_id,
            side = ?side,
            price,
            volume,
            "Fake exchange accepted order"
        );

        Ok(order)
    }
}

#[async_trait]
impl ExchangeApi for FakeExchangeApi {
    fn market(&self) -> Market {
        self.market
    }

    async fn buy_order(&self, price: f64, budget: u64) -> Result<Order, ApiError> {
        self.round_trip().await;
        let price = self.make_valid_order_price(OrderSide::Buy, price);
        if price.is_nan() || price <= 0.0 || budget == 0 {
            return Err(ApiError::Rejected {
                reason: format!("invalid buy: price={} budget={}", price, budget),
            });
        }

        let volume = budget as f64 * (1.0 - self.config.fee_rate) / price;
        self.place(OrderSide::Buy, price, volume)
    }

    async fn sell_order(&self, price: f64, volume: f64) -> Result<Order, ApiError> {
        self.round_trip().await;
        let price = self.make_valid_order_price(OrderSide::Sell, price);
        if price.is_nan() || price <= 0.0 || volume.is_nan() || volume <= 0.0 {
            return Err(ApiError::Rejected {
                reason: format!("invalid sell: price={} volume={}", price, volume),
            });
        }

        {
            let state = self.state();
            let free = state.holdings - state.locked();
            if volume > free + f64::EPSILON {
                return Err(ApiError::Rejected {
                    reason: format!("insufficient balance: {} < {}", free, volume),
                });
            }
        }

        self.place(OrderSide::Sell, price, volume)
    }

    async fn cancel_order(&self, order_id: &str) -> Result<String, ApiError> {
        self.round_trip().await;
        let mut state = self.state();
        state.take_failure()?;

        let order = state
            .orders
            .iter_mut()
            .find(|o| o.order_id == order_id)
            .ok_or_else(|| ApiError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;

        if !order.is_waiting() {
            return Err(ApiError::NotCancellable {
                order_id: order_id.to_string(),
                status: order.status,
            });
        }

        order.status = OrderStatus::Cancelled;
        Ok(order.order_id.clone())
    }

    async fn get_order(&self, order_id: &str) -> Result<Order, ApiError> {
        let mut orders = self.get_orders(&[order_id.to_string()]).await?;
        orders.pop().ok_or_else(|| ApiError::OrderNotFound {
            order_id: order_id.to_string(),
        })
    }

    async fn get_orders(&self, order_ids: &[String]) -> Result<Vec<Order>, ApiError> {
        self.round_trip().await;
        let fee_rate = self.config.fee_rate;
        let mut state = self.state();
        state.take_failure()?;

        if self.config.fill_policy == FillPolicy::OnQuery {
            let waiting: Vec<(usize, f64)> = state
                .orders
                .iter()
                .enumerate()
                .filter(|(_, o)| o.is_waiting() && order_ids.contains(&o.order_id))
                .map(|(i, o)| (i, o.ordered_volume - o.executed_volume))
                .collect();
            for (index, volume) in waiting {
                state.execute(index, volume, fee_rate);
            }
        }

        // open and closed orders are separate queries on real exchanges
        let requested = state.orders.iter().filter(|o| order_ids.contains(&o.order_id));
        let (open, closed): (Vec<Order>, Vec<Order>) =
            requested.cloned().partition(|o| o.is_waiting());

        Ok(open.into_iter().chain(closed).collect())
    }

    async fn get_prices(
        &self,
        unit: PriceUnit,
        count: usize,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Price>, ApiError> {
        self.round_trip().await;
        let mut state = self.state();
        state.take_failure()?;

        if !state.prices.is_empty() {
            let mut prices: Vec<Price> = state
                .prices
                .iter()
                .filter(|p| to.map_or(true, |to| p.timestamp <= to))
                .copied()
                .collect();
            prices.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            prices.truncate(count);
            return Ok(prices);
        }

        let Some(walk) = state.walk.as_mut() else {
            return Ok(Vec::new());
        };

        // each query advances the simulated market by one candle
        if walk.history.len() < count {
            while walk.history.len() < count {
                walk.step();
            }
        } else {
            walk.step();
        }

        Ok(walk.window(unit, count))
    }

    async fn get_balance(&self) -> Result<f64, ApiError> {
        self.round_trip().await;
        let mut state = self.state();
        state.take_failure()?;
        Ok((state.holdings - state.locked()).max(0.0))
    }

    fn make_valid_order_price(&self, side: OrderSide, price: f64) -> f64 {
        self.ticks.normalize(side, price)
    }
}
