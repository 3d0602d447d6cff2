//! Message transport adapter for the food-ordering platform.
//!
//! A thin, in-process stand-in for a broker: named queues, topic exchanges
//! with pattern bindings, fire-and-forget publish, and a single consumer
//! per queue running on a bounded worker pool. The services only ever talk
//! to each other through this adapter, so swapping in a networked broker
//! means reimplementing this crate, not the services.

pub mod broker;
pub mod consumer;
pub mod error;
pub mod message;

pub use broker::{Broker, BrokerConfig};
pub use consumer::Consumer;
pub use error::BrokerError;
pub use message::Delivery;

/// Convenience type alias for broker results.
pub type Result<T> = std::result::Result<T, BrokerError>;
