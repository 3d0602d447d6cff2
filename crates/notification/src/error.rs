/// Notification service errors.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("push failed: {0}")]
    Push(String),

    #[error("transport failure: {0}")]
    Transport(#[from] broker::BrokerError),
}
