use crate::models::OrderSide;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

/// Price grid of an exchange: the minimum price increment for each magnitude band.
#[derive(Debug, Clone)]
pub struct TickTable {
    /// `(lower bound, tick)` sorted by lower bound, highest first
    bands: Vec<(Decimal, Decimal)>,
}

impl TickTable {
    pub fn new(mut bands: Vec<(Decimal, Decimal)>) -> Self {
        bands.sort_by(|a, b| b.0.cmp(&a.0));
        Self { bands }
    }

    /// KRW order book grid shared by the Korean exchanges
    pub fn krw() -> Self {
        Self::new(vec![
            (Decimal::from(2_000_000), Decimal::from(1000)),
            (Decimal::from(1_000_000), Decimal::from(500)),
            (Decimal::from(500_000), Decimal::from(100)),
            (Decimal::from(100_000), Decimal::from(50)),
            (Decimal::from(10_000), Decimal::from(10)),
            (Decimal::from(1_000), Decimal::from(5)),
            (Decimal::from(100), Decimal::ONE),
            (Decimal::from(10), Decimal::new(1, 1)),
            (Decimal::ONE, Decimal::new(1, 2)),
            (Decimal::ZERO, Decimal::new(1, 3)),
        ])
    }

    /// Tick size for the band `price` falls in
    pub fn tick_for(&self, price: Decimal) -> Decimal {
        let magnitude = price.abs();
        self.bands
            .iter()
            .find(|(lower, _)| magnitude >= *lower)
            .or_else(|| self.bands.last())
            .map(|(_, tick)| *tick)
            .unwrap_or(Decimal::ZERO)
    }

    /// Snap `price` onto the grid: down for buys, up for sells.
    ///
    /// Prices already on the grid are returned unchanged.
    pub fn normalize(&self, side: OrderSide, price: f64) -> f64 {
        let Some(value) = Decimal::from_f64(price) else {
            return price;
        };

        let tick = self.tick_for(value);
        if tick.is_zero() {
            return price;
        }

        let steps = value / tick;
        let snapped = match side {
            OrderSide::Buy => steps.floor() * tick,
            OrderSide::Sell => steps.ceil() * tick,
        };

        snapped.to_f64().unwrap_or(price)
    }
}

impl Default for TickTable {
    fn default() -> Self {
        Self::krw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buy_rounds_down_sell_rounds_up() {
        let table = TickTable::krw();
        assert_eq!(table.normalize(OrderSide::Buy, 10234.0), 10230.0);
        assert_eq!(table.normalize(OrderSide::Sell, 10234.0), 10240.0);
    }

    #[test]
    fn test_price_on_grid_is_unchanged() {
        let table = TickTable::krw();
        assert_eq!(table.normalize(OrderSide::Buy, 10230.0), 10230.0);
        assert_eq!(table.normalize(OrderSide::Sell, 10230.0), 10230.0);
        assert_eq!(table.normalize(OrderSide::Sell, 2_001_000.0), 2_001_000.0);
    }

    #[test]
    fn test_band_selection_by_magnitude() {
        let table = TickTable::krw();
        assert_eq!(table.normalize(OrderSide::Buy, 2_345_678.0), 2_345_000.0);
        assert_eq!(table.normalize(OrderSide::Sell, 2_345_678.0), 2_346_000.0);
        assert_eq!(table.normalize(OrderSide::Buy, 123_456.0), 123_450.0);
        assert_eq!(table.normalize(OrderSide::Buy, 1_234.0), 1_230.0);
        assert_eq!(table.normalize(OrderSide::Sell, 1_234.0), 1_235.0);
        assert_eq!(table.normalize(OrderSide::Buy, 12.37), 12.3);
        assert_eq!(table.normalize(OrderSide::Sell, 12.31), 12.4);
    }

    #[test]
    fn test_tick_for_band_boundaries() {
        let table = TickTable::krw();
        assert_eq!(table.tick_for(Decimal::from(10_000)), Decimal::from(10));
        assert_eq!(table.tick_for(Decimal::from(9_999)), Decimal::from(5));
        assert_eq!(table.tick_for(Decimal::new(5, 1)), Decimal::new(1, 3));
    }

    #[test]
    fn test_non_finite_price_passes_through() {
        let table = TickTable::krw();
        assert!(table.normalize(OrderSide::Buy, f64::NAN).is_nan());
    }
}
