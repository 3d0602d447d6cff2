//! Inventory service: dish records and the stock reservation engine.
//!
//! The reservation engine consumes stock-check requests from the order
//! service, validates and decrements stock as one atomic unit, replies with
//! a confirmation, and fans out low-stock alerts. A persisted reservation
//! log backs the compensating release path.

pub mod dish;
pub mod engine;
pub mod error;
pub mod repository;

pub use dish::Dish;
pub use engine::{InventoryConfig, InventoryEngine};
pub use error::InventoryError;
pub use repository::{
    DishRepository, InMemoryDishRepository, InMemoryReservationLog, ReservationLog,
    ReservationRecord,
};

/// Convenience type alias for inventory results.
pub type Result<T> = std::result::Result<T, InventoryError>;
