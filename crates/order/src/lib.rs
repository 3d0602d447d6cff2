//! Order service: cart aggregation and the fulfillment orchestrator.
//!
//! Checkout snapshots a user's cart into an immutable order, applies the
//! minimum-charge gate, and runs the stock-check leg of the fulfillment
//! saga: a request to the inventory service, a correlated response, and a
//! final transition to delivered or canceled.

pub mod cart;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod repository;
pub mod status;

pub use cart::{Cart, CartLine, CartSession};
pub use error::{CartError, OrderError};
pub use model::{Order, OrderLine};
pub use orchestrator::{OrderOrchestrator, OrchestratorConfig};
pub use repository::{CartRepository, InMemoryCartRepository, InMemoryOrderRepository, OrderRepository};
pub use status::OrderStatus;

/// Convenience type alias for order results.
pub type Result<T> = std::result::Result<T, OrderError>;
