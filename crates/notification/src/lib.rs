//! Notification service.
//!
//! Consumes saga events from the broker, converts each into one or more
//! addressed notifications, persists them, and pushes best-effort to any
//! live session. Persistence is the durable record; a failed push never
//! rolls it back.

pub mod dispatcher;
pub mod error;
pub mod model;
pub mod push;
pub mod repository;

pub use dispatcher::NotificationDispatcher;
pub use error::NotificationError;
pub use model::{Audience, Notification, NotificationKind};
pub use push::{PushGateway, SessionRegistry};
pub use repository::{InMemoryNotificationRepository, NotificationRepository};

/// Convenience type alias for notification results.
pub type Result<T> = std::result::Result<T, NotificationError>;
