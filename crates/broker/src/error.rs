//! Broker error types.

use thiserror::Error;

/// Errors that can occur during broker operations.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Publish or bind targeted a queue that was never declared.
    #[error("unknown queue: {0}")]
    UnknownQueue(String),

    /// Publish or bind targeted an exchange that was never declared.
    #[error("unknown exchange: {0}")]
    UnknownExchange(String),

    /// The queue already has a consumer registered.
    #[error("queue '{0}' already has a consumer")]
    ConsumerAlreadyRegistered(String),

    /// The queue's buffer is full or its consumer side was torn down.
    #[error("failed to enqueue message on '{0}'")]
    PublishFailed(String),

    /// A consumer rejected a delivery. Carried back so handler failures can
    /// be counted and logged by the worker pool.
    #[error("handler error: {0}")]
    Handler(String),
}
