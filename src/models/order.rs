use super::{OrderSide, OrderStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Snapshot of an exchange order.
///
/// Identity is the exchange-assigned `order_id`: two snapshots with the same id
/// are the same order, a fresher snapshot simply replaces an older one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub side: OrderSide,
    pub status: OrderStatus,
    pub price: f64,
    pub ordered_volume: f64,
    pub executed_volume: f64,
    pub paid_fee: f64,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn is_waiting(&self) -> bool {
        self.status == OrderStatus::Wait
    }

    /// Quote currency actually spent (or received) including fee
    pub fn executed_funds(&self) -> f64 {
        self.price * self.executed_volume + self.paid_fee
    }
}

impl PartialEq for Order {
    fn eq(&self, other: &Self) -> bool {
        self.order_id == other.order_id
    }
}

impl Eq for Order {}

impl Hash for Order {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.order_id.hash(state);
    }
}
