use crate::models::{Exchange, OrderStatus};

/// Any failure of an exchange port call.
///
/// The worker treats every variant the same way: the tick is abandoned and
/// retried on the next scheduled round.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("order rejected: {reason}")]
    Rejected { reason: String },

    #[error("order {order_id} not found")]
    OrderNotFound { order_id: String },

    #[error("order {order_id} cannot be cancelled in status {status:?}")]
    NotCancellable {
        order_id: String,
        status: OrderStatus,
    },

    #[error("exchange unavailable: {0}")]
    Unavailable(String),

    #[error("request timed out")]
    Timeout,

    #[error("no adapter registered for {exchange}")]
    Unsupported { exchange: Exchange },
}

impl From<tokio::time::error::Elapsed> for ApiError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        ApiError::Timeout
    }
}
