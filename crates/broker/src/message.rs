//! Delivery envelope handed to consumers.

/// A message delivered from a queue.
///
/// Payloads are plain UTF-8 text; the services layer JSON on top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Routing key the message was published with. For direct publishes
    /// this is the queue name.
    pub routing_key: String,
    /// UTF-8 payload.
    pub body: String,
}

impl Delivery {
    /// Creates a delivery.
    pub fn new(routing_key: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            routing_key: routing_key.into(),
            body: body.into(),
        }
    }
}
