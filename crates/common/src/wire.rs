//! Wire contract shared by the services.
//!
//! Messages are plain UTF-8 JSON payloads on named queues. Each payload
//! carries a `version` field defaulting to 1 so older producers that omit
//! it keep parsing. Log events are the one exception: they travel on the
//! `admin-log` topic exchange with a `<Service>_<Severity>` routing key and
//! a `"<subject>:<detail>"` payload.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{OrderId, ProductId, UserId};

/// Queue the order service publishes stock-check requests to.
pub const ORDER_STOCK_CHECK_QUEUE: &str = "order-stock-check";
/// Queue the inventory service publishes stock-check responses to.
pub const STOCK_CONFIRMATION_QUEUE: &str = "stock-confirmation";
/// Queue for reservation release requests (order service to inventory).
pub const STOCK_RELEASE_QUEUE: &str = "stock-release";
/// Queue for order confirmations delivered to customers.
pub const ORDER_CONFIRMATION_QUEUE: &str = "order-confirmation";
/// Queue for payment failure events, bound to [`PAYMENTS_EXCHANGE`].
pub const PAYMENT_FAILED_QUEUE: &str = "payment-failed";
/// Queue for low-stock alerts delivered to sellers.
pub const STOCK_ALERT_QUEUE: &str = "stock-alert";
/// Queue the notification service drains log events from, bound to
/// [`ADMIN_LOG_EXCHANGE`] with the `#` pattern.
pub const ADMIN_LOG_QUEUE: &str = "admin-log";

/// Topic exchange carrying `<Service>_<Severity>` log events.
pub const ADMIN_LOG_EXCHANGE: &str = "admin-log";
/// Topic exchange carrying payment events.
pub const PAYMENTS_EXCHANGE: &str = "payments";
/// Routing key for payment failures on [`PAYMENTS_EXCHANGE`].
pub const PAYMENT_FAILED_KEY: &str = "PaymentFailed";

/// Current wire format version.
pub const WIRE_VERSION: u32 = 1;

fn default_version() -> u32 {
    WIRE_VERSION
}

/// Stock-check request, order service to inventory service.
///
/// Correlated to its response solely by `order_id`: the protocol assumes at
/// most one in-flight stock check per order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockCheckRequest {
    #[serde(default = "default_version")]
    pub version: u32,
    pub order_id: OrderId,
    /// Requested quantity per product. A `BTreeMap` keeps the JSON stable
    /// for logging and tests.
    pub product_quantities: BTreeMap<ProductId, u32>,
}

impl StockCheckRequest {
    /// Creates a request at the current wire version.
    pub fn new(order_id: OrderId, product_quantities: BTreeMap<ProductId, u32>) -> Self {
        Self {
            version: WIRE_VERSION,
            order_id,
            product_quantities,
        }
    }
}

/// Stock-check response, inventory service to order service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockCheckResponse {
    #[serde(default = "default_version")]
    pub version: u32,
    pub order_id: OrderId,
    /// Whole-request verdict: true only if every product was found with
    /// sufficient stock.
    pub in_stock: bool,
    /// Total price of the requested quantities in dollars, computed
    /// regardless of the in-stock verdict.
    pub total_price: f64,
}

impl StockCheckResponse {
    /// Creates a response at the current wire version.
    pub fn new(order_id: OrderId, in_stock: bool, total_price: f64) -> Self {
        Self {
            version: WIRE_VERSION,
            order_id,
            in_stock,
            total_price,
        }
    }
}

/// Compensating message: release a reservation the order service cannot
/// complete. Idempotent on the inventory side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseReservation {
    #[serde(default = "default_version")]
    pub version: u32,
    pub order_id: OrderId,
}

impl ReleaseReservation {
    /// Creates a release message at the current wire version.
    pub fn new(order_id: OrderId) -> Self {
        Self {
            version: WIRE_VERSION,
            order_id,
        }
    }
}

/// Order confirmation event for the notification service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfirmation {
    #[serde(default = "default_version")]
    pub version: u32,
    pub order_id: OrderId,
    pub status: String,
    /// Set on cancellations; names the cause.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub user_id: UserId,
}

/// Payment failure event for the notification service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentFailure {
    #[serde(default = "default_version")]
    pub version: u32,
    pub order_id: OrderId,
    pub reason: String,
    pub user_id: UserId,
}

/// Low-stock alert emitted by the inventory service after a reservation or
/// a seller stock update drops a dish under the threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockAlert {
    #[serde(default = "default_version")]
    pub version: u32,
    pub product_id: ProductId,
    pub product_name: String,
    pub remaining: u32,
    pub company_name: String,
}

/// Severity of a log event. Only `Error` produces admin-facing
/// notifications; other severities are log-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Returns the severity name as used in routing keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "Info",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        }
    }

    /// Parses a severity from a routing-key token. Unknown tokens fall back
    /// to `Info` so a malformed key degrades to log-only.
    pub fn parse(s: &str) -> Severity {
        match s {
            "Error" => Severity::Error,
            "Warning" => Severity::Warning,
            _ => Severity::Info,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A log event on the admin-log exchange.
///
/// Encoded as routing key `<service>_<severity>` with payload
/// `"<subject>:<detail>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub service: String,
    pub severity: Severity,
    pub subject: String,
    pub detail: String,
}

impl LogEvent {
    /// Creates a log event.
    pub fn new(
        service: impl Into<String>,
        severity: Severity,
        subject: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            severity,
            subject: subject.into(),
            detail: detail.into(),
        }
    }

    /// Returns the routing key for this event.
    pub fn routing_key(&self) -> String {
        format!("{}_{}", self.service, self.severity)
    }

    /// Encodes the payload.
    pub fn payload(&self) -> String {
        format!("{}:{}", self.subject, self.detail)
    }

    /// Decodes a log event from its routing key and payload. The detail
    /// part is optional; everything after the first colon belongs to it.
    pub fn decode(routing_key: &str, payload: &str) -> LogEvent {
        let (service, severity) = match routing_key.split_once('_') {
            Some((service, severity)) => (service.to_string(), Severity::parse(severity)),
            None => (routing_key.to_string(), Severity::Info),
        };
        let (subject, detail) = match payload.split_once(':') {
            Some((subject, detail)) => (subject.to_string(), detail.to_string()),
            None => (payload.to_string(), String::new()),
        };
        LogEvent {
            service,
            severity,
            subject,
            detail,
        }
    }
}
