//! Shared types for the food-ordering platform.
//!
//! This crate provides:
//! - Identifier newtypes (`UserId`, `OrderId`, `ProductId`) and `Money`
//! - The token introspection contract consumed by the services
//! - The wire contract: queue names and JSON message shapes exchanged
//!   between the order, inventory, and notification services

pub mod auth;
pub mod types;
pub mod wire;

pub use auth::{AuthError, Claims, StaticTokenIntrospector, TokenIntrospector};
pub use types::{Money, OrderId, ProductId, Role, UserId};
