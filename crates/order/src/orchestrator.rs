//! Order fulfillment orchestrator.
//!
//! Drives the order side of the stock-check saga: checkout creates a
//! `Pending` order and publishes a stock-check request; the confirmation
//! consumer finalizes the order when the response arrives. Responses are
//! correlated by order id alone, so at most one stock check may be in
//! flight per order.

use std::sync::Arc;

use async_trait::async_trait;
use broker::{Broker, BrokerError, Consumer, Delivery};
use common::wire::{
    self, OrderConfirmation, PaymentFailure, ReleaseReservation, StockCheckRequest,
    StockCheckResponse,
};
use common::{Money, OrderId, UserId};
use tokio::sync::Mutex;

use crate::cart::CartSession;
use crate::error::OrderError;
use crate::model::Order;
use crate::repository::{CartRepository, OrderRepository};
use crate::Result;

/// Orchestrator tunables.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Orders below this total are canceled before any stock check.
    pub min_charge: Money,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            min_charge: Money::from_dollars(50),
        }
    }
}

/// The order orchestrator.
pub struct OrderOrchestrator<O: OrderRepository> {
    broker: Broker,
    orders: O,
    config: OrchestratorConfig,
    // Serializes the load-check-save in `handle_stock_confirmation`; two
    // copies of one response on concurrent workers must not both observe
    // `Pending`.
    transitions: Mutex<()>,
}

impl<O> OrderOrchestrator<O>
where
    O: OrderRepository + 'static,
{
    pub fn new(broker: Broker, orders: O) -> Self {
        Self::with_config(broker, orders, OrchestratorConfig::default())
    }

    pub fn with_config(broker: Broker, orders: O, config: OrchestratorConfig) -> Self {
        Self {
            broker,
            orders,
            config,
            transitions: Mutex::new(()),
        }
    }

    /// Declares the orchestrator's topology and registers its consumer.
    pub fn subscribe(self: &Arc<Self>, broker: &Broker) -> broker::Result<()> {
        broker.declare_queue(wire::ORDER_STOCK_CHECK_QUEUE);
        broker.declare_queue(wire::STOCK_CONFIRMATION_QUEUE);
        broker.declare_queue(wire::STOCK_RELEASE_QUEUE);
        broker.declare_queue(wire::ORDER_CONFIRMATION_QUEUE);
        broker.declare_queue(wire::PAYMENT_FAILED_QUEUE);
        broker.declare_exchange(wire::PAYMENTS_EXCHANGE);
        broker.bind_queue(
            wire::PAYMENT_FAILED_QUEUE,
            wire::PAYMENTS_EXCHANGE,
            wire::PAYMENT_FAILED_KEY,
        )?;

        broker.consume(
            wire::STOCK_CONFIRMATION_QUEUE,
            Arc::new(StockConfirmationConsumer(Arc::clone(self))),
        )?;
        Ok(())
    }

    /// Creates an order from the session's cart.
    ///
    /// The cart is cleared and flushed on every successful path. Below the
    /// minimum charge the order is canceled on the spot and the broker is
    /// never touched; otherwise the returned order is `Pending` and its
    /// fate arrives later on the confirmation queue.
    #[tracing::instrument(skip(self, session))]
    pub async fn create_order_from_cart<R: CartRepository>(
        &self,
        session: &mut CartSession<R>,
    ) -> Result<Order> {
        let cart = session.cart()?;
        if cart.lines.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        let owner = cart.owner;
        let lines = Order::lines_from_cart(&cart.lines);
        let mut order = self.orders.create(owner, lines).await;
        let total = order.total();
        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(order_id = %order.id, %owner, total = %total, "order created");

        if total < self.config.min_charge {
            order.cancel()?;
            self.orders.save(order.clone()).await;
            session.clear()?;
            session.persist().await?;
            metrics::counter!("orders_below_min_charge_total").increment(1);
            tracing::info!(
                order_id = %order.id,
                total = %total,
                min_charge = %self.config.min_charge,
                "order canceled below minimum charge"
            );
            return Ok(order);
        }

        let request = StockCheckRequest::new(order.id, order.product_quantities());
        self.broker
            .publish(
                "",
                wire::ORDER_STOCK_CHECK_QUEUE,
                serde_json::to_string(&request)?,
            )
            .await?;
        session.clear()?;
        session.persist().await?;
        tracing::info!(order_id = %order.id, "stock check requested");
        Ok(order)
    }

    /// Handles one stock-check response payload.
    ///
    /// Redelivery safe: only a `Pending` order transitions, a terminal one
    /// drops the response silently.
    #[tracing::instrument(skip(self, payload))]
    pub async fn handle_stock_confirmation(&self, payload: &str) -> Result<()> {
        let response: StockCheckResponse = serde_json::from_str(payload)?;
        let order_id = response.order_id;
        metrics::counter!("stock_confirmations_total").increment(1);

        let _guard = self.transitions.lock().await;
        let Some(mut order) = self.orders.find_by_id(order_id).await else {
            // The response is meaningless without an order; no retry would
            // change that.
            tracing::warn!(%order_id, "stock confirmation for unknown order, dropping");
            metrics::counter!("stock_confirmations_unknown_order_total").increment(1);
            return Ok(());
        };
        if order.status.is_terminal() {
            tracing::debug!(%order_id, status = %order.status, "late stock confirmation, dropping");
            return Ok(());
        }

        let total = Money::from_dollars_f64(response.total_price);
        if response.in_stock && total >= self.config.min_charge {
            order.begin_delivery()?;
            self.orders.save(order.clone()).await;
            metrics::counter!("orders_confirmed_total").increment(1);
            tracing::info!(%order_id, "order confirmed for delivery");
            self.publish_confirmation(&order, None).await?;
        } else if !response.in_stock {
            order.cancel()?;
            self.orders.save(order.clone()).await;
            metrics::counter!("orders_canceled_total").increment(1);
            tracing::info!(%order_id, "order canceled, insufficient stock");
            self.publish_confirmation(&order, Some("not enough stock")).await?;
        } else {
            // Stock was reserved but the priced total fell under the gate.
            // Cancel, report the payment failure, and hand the stock back.
            order.cancel()?;
            self.orders.save(order.clone()).await;
            metrics::counter!("orders_canceled_total").increment(1);
            tracing::info!(
                %order_id,
                total = %total,
                min_charge = %self.config.min_charge,
                "order canceled, minimum charge not met"
            );
            self.publish_confirmation(&order, Some("minimum charge not met"))
                .await?;

            let failure = PaymentFailure {
                version: wire::WIRE_VERSION,
                order_id,
                reason: "minimum charge not met".to_string(),
                user_id: order.owner,
            };
            self.broker
                .publish(
                    wire::PAYMENTS_EXCHANGE,
                    wire::PAYMENT_FAILED_KEY,
                    serde_json::to_string(&failure)?,
                )
                .await?;
            self.broker
                .publish(
                    "",
                    wire::STOCK_RELEASE_QUEUE,
                    serde_json::to_string(&ReleaseReservation::new(order_id))?,
                )
                .await?;
        }
        Ok(())
    }

    async fn publish_confirmation(&self, order: &Order, reason: Option<&str>) -> Result<()> {
        let confirmation = OrderConfirmation {
            version: wire::WIRE_VERSION,
            order_id: order.id,
            status: order.status.as_str().to_string(),
            reason: reason.map(str::to_string),
            user_id: order.owner,
        };
        self.broker
            .publish(
                "",
                wire::ORDER_CONFIRMATION_QUEUE,
                serde_json::to_string(&confirmation)?,
            )
            .await?;
        Ok(())
    }

    pub async fn order(&self, id: OrderId) -> Result<Order> {
        self.orders
            .find_by_id(id)
            .await
            .ok_or(OrderError::UnknownOrder(id))
    }

    pub async fn orders_for_user(&self, user_id: UserId) -> Vec<Order> {
        self.orders.find_by_owner(user_id).await
    }

    /// Lists the orders containing at least one of a seller company's
    /// dishes.
    pub async fn orders_for_company(&self, company_name: &str) -> Vec<Order> {
        self.orders.find_by_company(company_name).await
    }
}

struct StockConfirmationConsumer<O: OrderRepository>(Arc<OrderOrchestrator<O>>);

#[async_trait]
impl<O> Consumer for StockConfirmationConsumer<O>
where
    O: OrderRepository + 'static,
{
    async fn handle(&self, delivery: Delivery) -> std::result::Result<(), BrokerError> {
        self.0
            .handle_stock_confirmation(&delivery.body)
            .await
            .map_err(|e| BrokerError::Handler(e.to_string()))
    }
}
