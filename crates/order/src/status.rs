use serde::{Deserialize, Serialize};

/// Lifecycle of an order.
///
/// `Pending` is the only state with outgoing transitions; both
/// `BeingDelivered` and `Canceled` are terminal. Transitions are applied
/// through [`Order::begin_delivery`] and [`Order::cancel`], never by
/// assigning the field directly.
///
/// [`Order::begin_delivery`]: crate::model::Order::begin_delivery
/// [`Order::cancel`]: crate::model::Order::cancel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    BeingDelivered,
    Canceled,
}

impl OrderStatus {
    /// Whether a stock-check outcome can still change this order.
    pub fn can_finalize(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        !self.can_finalize()
    }

    /// Wire representation used in confirmation events.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::BeingDelivered => "BEING_DELIVERED",
            OrderStatus::Canceled => "CANCELED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_is_the_only_open_state() {
        assert!(OrderStatus::Pending.can_finalize());
        assert!(OrderStatus::BeingDelivered.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());
    }

    #[test]
    fn wire_representation_is_screaming_snake() {
        assert_eq!(OrderStatus::BeingDelivered.as_str(), "BEING_DELIVERED");
        assert_eq!(
            serde_json::to_string(&OrderStatus::Canceled).unwrap(),
            "\"CANCELED\""
        );
    }
}
