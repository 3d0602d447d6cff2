use common::{OrderId, ProductId};

use crate::status::OrderStatus;

/// Cart aggregator errors.
#[derive(Debug, thiserror::Error)]
pub enum CartError {
    /// A mutation was attempted before `initialize`.
    #[error("cart not initialized")]
    NotInitialized,

    /// No cart line matched a removal request.
    #[error("product {0} not in cart")]
    LineNotFound(ProductId),
}

/// Order service errors.
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("cannot create an order from an empty cart")]
    EmptyCart,

    #[error("order {0} not found")]
    UnknownOrder(OrderId),

    #[error("illegal transition from {from} to {to}")]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error("transport failure: {0}")]
    Transport(#[from] broker::BrokerError),
}
