//! Saga event fan-out.
//!
//! One handler per event channel. Every handler renders notifications,
//! persists them, then pushes best-effort. Only `Error` severity log
//! events produce admin notifications; lower severities are log-only.

use std::sync::Arc;

use async_trait::async_trait;
use broker::{Broker, BrokerError, Consumer, Delivery};
use common::wire::{
    self, LogEvent, OrderConfirmation, PaymentFailure, Severity, StockAlert,
};
use common::{Role, UserId};
use uuid::Uuid;

use crate::model::{Audience, Notification, NotificationKind};
use crate::push::PushGateway;
use crate::repository::NotificationRepository;
use crate::Result;

/// The notification dispatcher.
pub struct NotificationDispatcher<N: NotificationRepository> {
    repository: N,
    push: Arc<dyn PushGateway>,
}

impl<N> NotificationDispatcher<N>
where
    N: NotificationRepository + 'static,
{
    pub fn new(repository: N, push: Arc<dyn PushGateway>) -> Self {
        Self { repository, push }
    }

    /// Declares the dispatcher's topology and registers its consumers.
    pub fn subscribe(self: &Arc<Self>, broker: &Broker) -> broker::Result<()> {
        broker.declare_queue(wire::ORDER_CONFIRMATION_QUEUE);
        broker.declare_queue(wire::PAYMENT_FAILED_QUEUE);
        broker.declare_queue(wire::STOCK_ALERT_QUEUE);
        broker.declare_queue(wire::ADMIN_LOG_QUEUE);
        broker.declare_exchange(wire::ADMIN_LOG_EXCHANGE);
        broker.declare_exchange(wire::PAYMENTS_EXCHANGE);
        broker.bind_queue(wire::ADMIN_LOG_QUEUE, wire::ADMIN_LOG_EXCHANGE, "#")?;
        broker.bind_queue(
            wire::PAYMENT_FAILED_QUEUE,
            wire::PAYMENTS_EXCHANGE,
            wire::PAYMENT_FAILED_KEY,
        )?;

        broker.consume(
            wire::ORDER_CONFIRMATION_QUEUE,
            Arc::new(OrderConfirmationConsumer(Arc::clone(self))),
        )?;
        broker.consume(
            wire::PAYMENT_FAILED_QUEUE,
            Arc::new(PaymentFailureConsumer(Arc::clone(self))),
        )?;
        broker.consume(
            wire::STOCK_ALERT_QUEUE,
            Arc::new(StockAlertConsumer(Arc::clone(self))),
        )?;
        broker.consume(
            wire::ADMIN_LOG_QUEUE,
            Arc::new(LogEventConsumer(Arc::clone(self))),
        )?;
        Ok(())
    }

    /// Order confirmation events: notify the customer and mirror a copy to
    /// admins.
    #[tracing::instrument(skip(self, payload))]
    pub async fn handle_order_confirmation(&self, payload: &str) -> Result<()> {
        let event: OrderConfirmation = serde_json::from_str(payload)?;
        let order_id = event.order_id;

        let (title, body) = match event.status.as_str() {
            "BEING_DELIVERED" => (
                "Order confirmed".to_string(),
                format!("Order {order_id} is confirmed and being delivered"),
            ),
            "CANCELED" => {
                let reason = event.reason.as_deref().unwrap_or("not enough stock");
                (
                    "Order canceled".to_string(),
                    format!("Order {order_id} was canceled: {reason}"),
                )
            }
            other => (
                "Order update".to_string(),
                format!("Order {order_id} is now {other}"),
            ),
        };

        self.dispatch(Notification::new(
            NotificationKind::Order,
            title.clone(),
            body.clone(),
            Audience::User(event.user_id),
        ))
        .await;
        self.dispatch(Notification::new(
            NotificationKind::Order,
            title,
            format!("{body} (user {})", event.user_id),
            Audience::AllAdmins,
        ))
        .await;
        Ok(())
    }

    /// Payment failures: notify the customer and mirror to admins.
    #[tracing::instrument(skip(self, payload))]
    pub async fn handle_payment_failure(&self, payload: &str) -> Result<()> {
        let event: PaymentFailure = serde_json::from_str(payload)?;
        let body = format!("Order {}: {}", event.order_id, event.reason);

        self.dispatch(Notification::new(
            NotificationKind::Payment,
            "Payment failed",
            body.clone(),
            Audience::User(event.user_id),
        ))
        .await;
        self.dispatch(Notification::new(
            NotificationKind::Payment,
            "Payment failed",
            format!("{body} (user {})", event.user_id),
            Audience::AllAdmins,
        ))
        .await;
        Ok(())
    }

    /// Low-stock alerts go to all sellers.
    #[tracing::instrument(skip(self, payload))]
    pub async fn handle_stock_alert(&self, payload: &str) -> Result<()> {
        let alert: StockAlert = serde_json::from_str(payload)?;
        self.dispatch(Notification::new(
            NotificationKind::Stock,
            format!("Low stock: {}", alert.product_name),
            format!(
                "{} has {} left of {}",
                alert.company_name, alert.remaining, alert.product_name
            ),
            Audience::AllSellers,
        ))
        .await;
        Ok(())
    }

    /// Log events off the admin-log exchange. `Error` severity becomes an
    /// admin notification; anything else is logged and dropped.
    #[tracing::instrument(skip(self, routing_key, payload))]
    pub async fn handle_log_event(&self, routing_key: &str, payload: &str) -> Result<()> {
        let event = LogEvent::decode(routing_key, payload);
        if event.severity != Severity::Error {
            tracing::info!(
                service = %event.service,
                severity = %event.severity,
                subject = %event.subject,
                detail = %event.detail,
                "service log event"
            );
            return Ok(());
        }

        self.dispatch(Notification::new(
            NotificationKind::Error,
            format!("{} error", event.service),
            format!("{}: {}", event.subject, event.detail),
            Audience::AllAdmins,
        ))
        .await;
        Ok(())
    }

    /// Persists, then pushes. The push is best-effort; its failure is
    /// logged and the persisted record stands.
    async fn dispatch(&self, notification: Notification) {
        self.repository.save(notification.clone()).await;
        metrics::counter!("notifications_created_total").increment(1);

        if let Err(e) = self.push.push(&notification).await {
            tracing::warn!(
                notification_id = %notification.id,
                error = %e,
                "push failed, notification persisted only"
            );
        }
    }

    pub async fn notifications_for(&self, user_id: UserId, role: Role) -> Vec<Notification> {
        self.repository.for_user(user_id, role).await
    }

    pub async fn unread_for(&self, user_id: UserId, role: Role) -> Vec<Notification> {
        self.repository.unread_for_user(user_id, role).await
    }

    pub async fn mark_read(&self, id: Uuid) -> bool {
        self.repository.mark_read(id).await
    }

    pub async fn mark_all_read(&self, user_id: UserId, role: Role) -> usize {
        self.repository.mark_all_read(user_id, role).await
    }
}

struct OrderConfirmationConsumer<N: NotificationRepository>(Arc<NotificationDispatcher<N>>);

#[async_trait]
impl<N> Consumer for OrderConfirmationConsumer<N>
where
    N: NotificationRepository + 'static,
{
    async fn handle(&self, delivery: Delivery) -> std::result::Result<(), BrokerError> {
        self.0
            .handle_order_confirmation(&delivery.body)
            .await
            .map_err(|e| BrokerError::Handler(e.to_string()))
    }
}

struct PaymentFailureConsumer<N: NotificationRepository>(Arc<NotificationDispatcher<N>>);

#[async_trait]
impl<N> Consumer for PaymentFailureConsumer<N>
where
    N: NotificationRepository + 'static,
{
    async fn handle(&self, delivery: Delivery) -> std::result::Result<(), BrokerError> {
        self.0
            .handle_payment_failure(&delivery.body)
            .await
            .map_err(|e| BrokerError::Handler(e.to_string()))
    }
}

struct StockAlertConsumer<N: NotificationRepository>(Arc<NotificationDispatcher<N>>);

#[async_trait]
impl<N> Consumer for StockAlertConsumer<N>
where
    N: NotificationRepository + 'static,
{
    async fn handle(&self, delivery: Delivery) -> std::result::Result<(), BrokerError> {
        self.0
            .handle_stock_alert(&delivery.body)
            .await
            .map_err(|e| BrokerError::Handler(e.to_string()))
    }
}

struct LogEventConsumer<N: NotificationRepository>(Arc<NotificationDispatcher<N>>);

#[async_trait]
impl<N> Consumer for LogEventConsumer<N>
where
    N: NotificationRepository + 'static,
{
    async fn handle(&self, delivery: Delivery) -> std::result::Result<(), BrokerError> {
        self.0
            .handle_log_event(&delivery.routing_key, &delivery.body)
            .await
            .map_err(|e| BrokerError::Handler(e.to_string()))
    }
}
