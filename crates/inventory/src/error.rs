//! Inventory error types.

use common::ProductId;
use thiserror::Error;

/// Errors that can occur during inventory operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// A stock-check or release envelope failed to parse.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A stock-check request carried no product quantities.
    #[error("stock-check request for order {0} has no product quantities")]
    EmptyRequest(common::OrderId),

    /// A dish lookup failed for a seller-initiated operation.
    #[error("dish not found: {0}")]
    DishNotFound(ProductId),

    /// A seller tried to mutate a dish owned by another company.
    #[error("dish {0} is not owned by company '{1}'")]
    NotOwner(ProductId, String),

    /// A broker publish failed.
    #[error("transport error: {0}")]
    Transport(#[from] broker::BrokerError),
}
