//! Stock reservation engine.
//!
//! Consumes stock-check requests, decides the whole-request in-stock
//! verdict, replies, and decrements stock as the reservation. The
//! check-then-decrement sequence runs under a single reservation mutex so
//! concurrent requests over overlapping products cannot both observe
//! sufficient stock.

use std::sync::Arc;

use async_trait::async_trait;
use broker::{Broker, BrokerError, Consumer, Delivery};
use chrono::Utc;
use common::wire::{
    self, LogEvent, ReleaseReservation, Severity, StockAlert, StockCheckRequest,
    StockCheckResponse,
};
use common::{Money, ProductId};
use tokio::sync::Mutex;

use crate::dish::Dish;
use crate::error::InventoryError;
use crate::repository::{DishRepository, ReservationLog, ReservationRecord};
use crate::Result;

/// Inventory thresholds.
#[derive(Debug, Clone)]
pub struct InventoryConfig {
    /// Stock level below which the owning company's sellers are alerted.
    pub low_stock_threshold: u32,
    /// Stock level at or below which the alert escalates to admins.
    pub critical_stock_threshold: u32,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            low_stock_threshold: 10,
            critical_stock_threshold: 3,
        }
    }
}

/// The inventory reservation engine.
pub struct InventoryEngine<D: DishRepository, L: ReservationLog> {
    broker: Broker,
    dishes: D,
    reservations: L,
    config: InventoryConfig,
    /// Serializes every check-then-decrement sequence against the dish
    /// store. Stock must never go negative under concurrent requests.
    reservation_lock: Mutex<()>,
}

impl<D, L> InventoryEngine<D, L>
where
    D: DishRepository + 'static,
    L: ReservationLog + 'static,
{
    /// Creates an engine with default thresholds.
    pub fn new(broker: Broker, dishes: D, reservations: L) -> Self {
        Self::with_config(broker, dishes, reservations, InventoryConfig::default())
    }

    /// Creates an engine with explicit thresholds.
    pub fn with_config(
        broker: Broker,
        dishes: D,
        reservations: L,
        config: InventoryConfig,
    ) -> Self {
        Self {
            broker,
            dishes,
            reservations,
            config,
            reservation_lock: Mutex::new(()),
        }
    }

    /// Declares the engine's queues and registers its consumers.
    pub fn subscribe(self: &Arc<Self>, broker: &Broker) -> broker::Result<()> {
        broker.declare_queue(wire::ORDER_STOCK_CHECK_QUEUE);
        broker.declare_queue(wire::STOCK_CONFIRMATION_QUEUE);
        broker.declare_queue(wire::STOCK_RELEASE_QUEUE);
        broker.declare_queue(wire::STOCK_ALERT_QUEUE);
        broker.declare_exchange(wire::ADMIN_LOG_EXCHANGE);

        broker.consume(
            wire::ORDER_STOCK_CHECK_QUEUE,
            Arc::new(StockCheckConsumer(Arc::clone(self))),
        )?;
        broker.consume(
            wire::STOCK_RELEASE_QUEUE,
            Arc::new(ReleaseConsumer(Arc::clone(self))),
        )?;
        Ok(())
    }

    /// Handles one stock-check request payload.
    ///
    /// A malformed envelope is rejected with an error event and no
    /// response; everything else gets a response, and stock is decremented
    /// only on an all-in-stock verdict.
    #[tracing::instrument(skip(self, payload))]
    pub async fn handle_stock_check(&self, payload: &str) -> Result<()> {
        metrics::counter!("stock_checks_total").increment(1);

        let request: StockCheckRequest = match serde_json::from_str(payload) {
            Ok(request) => request,
            Err(e) => {
                self.reject_request(&e.to_string()).await;
                return Err(InventoryError::Malformed(e));
            }
        };
        if request.product_quantities.is_empty() {
            self.reject_request(&format!(
                "order {} has no product quantities",
                request.order_id
            ))
            .await;
            return Err(InventoryError::EmptyRequest(request.order_id));
        }

        let order_id = request.order_id;
        tracing::info!(%order_id, products = request.product_quantities.len(), "stock check received");

        // Check and decrement as one atomic unit against the dish store.
        let guard = self.reservation_lock.lock().await;

        let mut all_in_stock = true;
        let mut total_price = Money::zero();
        let mut found: Vec<(Dish, u32)> = Vec::new();
        for (&product_id, &quantity) in &request.product_quantities {
            match self.dishes.find_by_id(product_id).await {
                Some(dish) => {
                    if !dish.has_stock(quantity) {
                        tracing::info!(
                            %order_id, %product_id,
                            available = dish.stock_count, needed = quantity,
                            "insufficient stock"
                        );
                        all_in_stock = false;
                    }
                    total_price += dish.unit_price.multiply(quantity);
                    found.push((dish, quantity));
                }
                None => {
                    tracing::info!(%order_id, %product_id, "unknown product in stock check");
                    all_in_stock = false;
                }
            }
        }

        // The response goes out regardless of the verdict so the order
        // service can still apply its minimum-charge gate.
        let response =
            StockCheckResponse::new(order_id, all_in_stock, total_price.to_dollars_f64());
        self.broker
            .publish(
                "",
                wire::STOCK_CONFIRMATION_QUEUE,
                serde_json::to_string(&response)?,
            )
            .await?;

        if !all_in_stock {
            drop(guard);
            metrics::counter!("stock_checks_rejected_total").increment(1);
            return Ok(());
        }

        // The decrement is the reservation. Record it so a release can
        // restore exactly these quantities.
        let mut alerts = Vec::new();
        let mut items = Vec::new();
        for (mut dish, quantity) in found {
            dish.stock_count -= quantity;
            items.push((dish.id, quantity));
            if dish.stock_count < self.config.low_stock_threshold {
                alerts.push(dish.clone());
            }
            self.dishes.save(dish).await;
        }
        self.reservations
            .append(ReservationRecord {
                order_id,
                items,
                reserved_at: Utc::now(),
            })
            .await;
        drop(guard);

        metrics::counter!("reservations_total").increment(1);
        tracing::info!(%order_id, "stock reserved");

        for dish in alerts {
            self.emit_low_stock_alert(&dish).await;
        }
        Ok(())
    }

    /// Handles a release for a reservation the order service cannot
    /// complete. Idempotent: an unknown or already-released order is a
    /// no-op.
    #[tracing::instrument(skip(self, payload))]
    pub async fn handle_release(&self, payload: &str) -> Result<()> {
        let release: ReleaseReservation = serde_json::from_str(payload)?;
        let order_id = release.order_id;

        let _guard = self.reservation_lock.lock().await;
        let Some(record) = self.reservations.take(order_id).await else {
            tracing::info!(%order_id, "no reservation to release");
            return Ok(());
        };

        for (product_id, quantity) in record.items {
            if let Some(mut dish) = self.dishes.find_by_id(product_id).await {
                dish.stock_count += quantity;
                self.dishes.save(dish).await;
            }
        }
        metrics::counter!("reservations_released_total").increment(1);
        tracing::info!(%order_id, "reservation released");
        Ok(())
    }

    /// Reports every reservation record still in the log. Records persist
    /// for delivered orders too, so the returned list needs cross-checking
    /// against order status before any stock is handed back. Nothing is
    /// released here.
    pub async fn recover(&self) -> Vec<ReservationRecord> {
        let unreleased = self.reservations.unreleased().await;
        for record in &unreleased {
            tracing::warn!(
                order_id = %record.order_id,
                items = record.items.len(),
                reserved_at = %record.reserved_at,
                "unreleased reservation found on startup"
            );
        }
        unreleased
    }

    /// Creates a dish for a seller company, warning on low initial stock.
    #[tracing::instrument(skip(self, description))]
    pub async fn create_dish(
        &self,
        name: String,
        description: String,
        unit_price: Money,
        company_name: String,
        stock_count: u32,
    ) -> Result<Dish> {
        let dish = self
            .dishes
            .create(name, description, unit_price, company_name, stock_count)
            .await;
        tracing::info!(product_id = %dish.id, company = %dish.company_name, "dish created");

        if dish.stock_count < self.config.low_stock_threshold {
            self.emit_low_stock_alert(&dish).await;
        }
        Ok(dish)
    }

    /// Seller-initiated stock update. The dish must belong to the given
    /// company.
    #[tracing::instrument(skip(self))]
    pub async fn update_stock(
        &self,
        product_id: ProductId,
        new_count: u32,
        company_name: &str,
    ) -> Result<Dish> {
        // Stock updates serialize with in-flight reservations.
        let _guard = self.reservation_lock.lock().await;

        let mut dish = self
            .dishes
            .find_by_id(product_id)
            .await
            .ok_or(InventoryError::DishNotFound(product_id))?;
        if dish.company_name != company_name {
            return Err(InventoryError::NotOwner(
                product_id,
                company_name.to_string(),
            ));
        }

        let old_count = dish.stock_count;
        dish.stock_count = new_count;
        self.dishes.save(dish.clone()).await;
        tracing::info!(%product_id, old_count, new_count, "stock updated");

        if dish.stock_count < self.config.low_stock_threshold {
            self.emit_low_stock_alert(&dish).await;
        }
        Ok(dish)
    }

    /// Publishes a low-stock alert to the dish's sellers, escalating to
    /// admins at the critical level. Best-effort: failures are logged.
    async fn emit_low_stock_alert(&self, dish: &Dish) {
        let alert = StockAlert {
            version: wire::WIRE_VERSION,
            product_id: dish.id,
            product_name: dish.name.clone(),
            remaining: dish.stock_count,
            company_name: dish.company_name.clone(),
        };
        let payload = match serde_json::to_string(&alert) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode stock alert");
                return;
            }
        };
        if let Err(e) = self.broker.publish("", wire::STOCK_ALERT_QUEUE, payload).await {
            tracing::warn!(error = %e, "failed to publish stock alert");
        }
        metrics::counter!("stock_alerts_total").increment(1);

        if dish.stock_count <= self.config.critical_stock_threshold {
            let event = LogEvent::new(
                "Stock",
                Severity::Error,
                dish.name.clone(),
                format!(
                    "critically low stock for {}: {} remaining",
                    dish.company_name, dish.stock_count
                ),
            );
            if let Err(e) = self
                .broker
                .publish(
                    wire::ADMIN_LOG_EXCHANGE,
                    &event.routing_key(),
                    event.payload(),
                )
                .await
            {
                tracing::warn!(error = %e, "failed to publish critical stock event");
            }
        }
    }

    /// Emits an error event for a request that could not be processed.
    /// No response is sent; the envelope is meaningless without one.
    async fn reject_request(&self, detail: &str) {
        metrics::counter!("stock_checks_malformed_total").increment(1);
        tracing::warn!(detail, "rejecting stock-check request");

        let event = LogEvent::new("Inventory", Severity::Error, "StockCheck", detail);
        if let Err(e) = self
            .broker
            .publish(
                wire::ADMIN_LOG_EXCHANGE,
                &event.routing_key(),
                event.payload(),
            )
            .await
        {
            tracing::warn!(error = %e, "failed to publish rejection event");
        }
    }
}

struct StockCheckConsumer<D: DishRepository, L: ReservationLog>(Arc<InventoryEngine<D, L>>);

#[async_trait]
impl<D, L> Consumer for StockCheckConsumer<D, L>
where
    D: DishRepository + 'static,
    L: ReservationLog + 'static,
{
    async fn handle(&self, delivery: Delivery) -> std::result::Result<(), BrokerError> {
        self.0
            .handle_stock_check(&delivery.body)
            .await
            .map_err(|e| BrokerError::Handler(e.to_string()))
    }
}

struct ReleaseConsumer<D: DishRepository, L: ReservationLog>(Arc<InventoryEngine<D, L>>);

#[async_trait]
impl<D, L> Consumer for ReleaseConsumer<D, L>
where
    D: DishRepository + 'static,
    L: ReservationLog + 'static,
{
    async fn handle(&self, delivery: Delivery) -> std::result::Result<(), BrokerError> {
        self.0
            .handle_release(&delivery.body)
            .await
            .map_err(|e| BrokerError::Handler(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{InMemoryDishRepository, InMemoryReservationLog};
    use common::OrderId;
    use std::collections::BTreeMap;

    struct TestEngine {
        engine: Arc<InventoryEngine<InMemoryDishRepository, InMemoryReservationLog>>,
        dishes: InMemoryDishRepository,
        reservations: InMemoryReservationLog,
        broker: Broker,
    }

    async fn setup() -> TestEngine {
        let broker = Broker::new();
        broker.declare_queue(wire::STOCK_CONFIRMATION_QUEUE);
        broker.declare_queue(wire::STOCK_ALERT_QUEUE);
        broker.declare_exchange(wire::ADMIN_LOG_EXCHANGE);

        let dishes = InMemoryDishRepository::new();
        let reservations = InMemoryReservationLog::new();
        let engine = Arc::new(InventoryEngine::new(
            broker.clone(),
            dishes.clone(),
            reservations.clone(),
        ));
        TestEngine {
            engine,
            dishes,
            reservations,
            broker,
        }
    }

    async fn seed_dish(harness: &TestEngine, price_cents: i64, stock: u32) -> Dish {
        harness
            .dishes
            .create(
                "Tacos".to_string(),
                String::new(),
                Money::from_cents(price_cents),
                "Casa Lupita".to_string(),
                stock,
            )
            .await
    }

    fn request(order_id: u64, quantities: &[(u64, u32)]) -> String {
        let map: BTreeMap<ProductId, u32> = quantities
            .iter()
            .map(|&(id, q)| (ProductId::new(id), q))
            .collect();
        serde_json::to_string(&StockCheckRequest::new(OrderId::new(order_id), map)).unwrap()
    }

    async fn next_response(broker: &Broker) -> StockCheckResponse {
        let mut receiver = broker.take_receiver(wire::STOCK_CONFIRMATION_QUEUE).unwrap();
        let delivery = tokio::time::timeout(std::time::Duration::from_secs(1), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        serde_json::from_str(&delivery.body).unwrap()
    }

    #[tokio::test]
    async fn sufficient_stock_reserves_and_confirms() {
        let harness = setup().await;
        let dish = seed_dish(&harness, 3000, 20).await;

        harness
            .engine
            .handle_stock_check(&request(1, &[(dish.id.as_u64(), 2)]))
            .await
            .unwrap();

        let response = next_response(&harness.broker).await;
        assert!(response.in_stock);
        assert_eq!(response.order_id, OrderId::new(1));
        assert_eq!(response.total_price, 60.0);

        let stored = harness.dishes.find_by_id(dish.id).await.unwrap();
        assert_eq!(stored.stock_count, 18);
        assert!(harness.reservations.find(OrderId::new(1)).await.is_some());
    }

    #[tokio::test]
    async fn insufficient_stock_decrements_nothing() {
        let harness = setup().await;
        let plenty = seed_dish(&harness, 3000, 20).await;
        let scarce = seed_dish(&harness, 2500, 0).await;

        harness
            .engine
            .handle_stock_check(&request(
                2,
                &[(plenty.id.as_u64(), 1), (scarce.id.as_u64(), 1)],
            ))
            .await
            .unwrap();

        let response = next_response(&harness.broker).await;
        assert!(!response.in_stock);
        // Total price still covers the full request for diagnostics.
        assert_eq!(response.total_price, 55.0);

        // All-or-nothing: the in-stock dish is untouched.
        let stored = harness.dishes.find_by_id(plenty.id).await.unwrap();
        assert_eq!(stored.stock_count, 20);
        assert!(harness.reservations.is_empty().await);
    }

    #[tokio::test]
    async fn unknown_product_fails_whole_request() {
        let harness = setup().await;
        let dish = seed_dish(&harness, 3000, 20).await;

        harness
            .engine
            .handle_stock_check(&request(3, &[(dish.id.as_u64(), 1), (99, 1)]))
            .await
            .unwrap();

        let response = next_response(&harness.broker).await;
        assert!(!response.in_stock);
        assert_eq!(response.total_price, 30.0);
        assert_eq!(
            harness.dishes.find_by_id(dish.id).await.unwrap().stock_count,
            20
        );
    }

    #[tokio::test]
    async fn malformed_request_gets_no_response() {
        let harness = setup().await;
        broker_bind_admin_log(&harness.broker);

        let result = harness.engine.handle_stock_check("not json").await;
        assert!(matches!(result, Err(InventoryError::Malformed(_))));

        let mut logs = harness.broker.take_receiver("admin-log-q").unwrap();
        let delivery = logs.recv().await.unwrap();
        assert_eq!(delivery.routing_key, "Inventory_Error");

        // No response was published.
        let mut responses = harness
            .broker
            .take_receiver(wire::STOCK_CONFIRMATION_QUEUE)
            .unwrap();
        assert!(responses.try_recv().is_err());
    }

    fn broker_bind_admin_log(broker: &Broker) {
        broker.declare_queue("admin-log-q");
        broker.bind_queue("admin-log-q", wire::ADMIN_LOG_EXCHANGE, "#").unwrap();
    }

    #[tokio::test]
    async fn empty_request_is_rejected() {
        let harness = setup().await;
        let result = harness.engine.handle_stock_check(&request(4, &[])).await;
        assert!(matches!(result, Err(InventoryError::EmptyRequest(_))));
    }

    #[tokio::test]
    async fn concurrent_checks_for_last_unit_reserve_once() {
        let harness = setup().await;
        let dish = seed_dish(&harness, 6000, 1).await;

        let first = request(10, &[(dish.id.as_u64(), 1)]);
        let second = request(11, &[(dish.id.as_u64(), 1)]);
        let (a, b) = tokio::join!(
            harness.engine.handle_stock_check(&first),
            harness.engine.handle_stock_check(&second)
        );
        a.unwrap();
        b.unwrap();

        let mut responses = harness
            .broker
            .take_receiver(wire::STOCK_CONFIRMATION_QUEUE)
            .unwrap();
        let first_verdict: StockCheckResponse =
            serde_json::from_str(&responses.recv().await.unwrap().body).unwrap();
        let second_verdict: StockCheckResponse =
            serde_json::from_str(&responses.recv().await.unwrap().body).unwrap();
        assert_eq!(
            [first_verdict.in_stock, second_verdict.in_stock]
                .iter()
                .filter(|&&v| v)
                .count(),
            1
        );

        let stored = harness.dishes.find_by_id(dish.id).await.unwrap();
        assert_eq!(stored.stock_count, 0);
        assert_eq!(harness.reservations.len().await, 1);
    }

    #[tokio::test]
    async fn release_restores_stock_exactly_once() {
        let harness = setup().await;
        let dish = seed_dish(&harness, 3000, 5).await;

        harness
            .engine
            .handle_stock_check(&request(7, &[(dish.id.as_u64(), 3)]))
            .await
            .unwrap();
        assert_eq!(
            harness.dishes.find_by_id(dish.id).await.unwrap().stock_count,
            2
        );

        let release = serde_json::to_string(&ReleaseReservation::new(OrderId::new(7))).unwrap();
        harness.engine.handle_release(&release).await.unwrap();
        assert_eq!(
            harness.dishes.find_by_id(dish.id).await.unwrap().stock_count,
            5
        );

        // Redelivery is a no-op.
        harness.engine.handle_release(&release).await.unwrap();
        assert_eq!(
            harness.dishes.find_by_id(dish.id).await.unwrap().stock_count,
            5
        );
    }

    #[tokio::test]
    async fn release_for_unknown_order_is_noop() {
        let harness = setup().await;
        let release = serde_json::to_string(&ReleaseReservation::new(OrderId::new(404))).unwrap();
        harness.engine.handle_release(&release).await.unwrap();
    }

    #[tokio::test]
    async fn reservation_emits_low_stock_alert() {
        let harness = setup().await;
        let dish = seed_dish(&harness, 3000, 11).await;

        harness
            .engine
            .handle_stock_check(&request(8, &[(dish.id.as_u64(), 2)]))
            .await
            .unwrap();

        let mut alerts = harness.broker.take_receiver(wire::STOCK_ALERT_QUEUE).unwrap();
        let delivery = alerts.recv().await.unwrap();
        let alert: StockAlert = serde_json::from_str(&delivery.body).unwrap();
        assert_eq!(alert.product_id, dish.id);
        assert_eq!(alert.remaining, 9);
        assert_eq!(alert.company_name, "Casa Lupita");
    }

    #[tokio::test]
    async fn critical_stock_escalates_to_admins() {
        let harness = setup().await;
        broker_bind_admin_log(&harness.broker);
        let dish = seed_dish(&harness, 3000, 4).await;

        harness
            .engine
            .handle_stock_check(&request(9, &[(dish.id.as_u64(), 2)]))
            .await
            .unwrap();

        let mut logs = harness.broker.take_receiver("admin-log-q").unwrap();
        let delivery = logs.recv().await.unwrap();
        assert_eq!(delivery.routing_key, "Stock_Error");
        assert!(delivery.body.contains("2 remaining"));
    }

    #[tokio::test]
    async fn update_stock_enforces_ownership() {
        let harness = setup().await;
        let dish = seed_dish(&harness, 3000, 20).await;

        let result = harness
            .engine
            .update_stock(dish.id, 5, "Someone Else")
            .await;
        assert!(matches!(result, Err(InventoryError::NotOwner(_, _))));

        let updated = harness
            .engine
            .update_stock(dish.id, 30, "Casa Lupita")
            .await
            .unwrap();
        assert_eq!(updated.stock_count, 30);
    }

    #[tokio::test]
    async fn create_dish_with_low_stock_alerts() {
        let harness = setup().await;
        let dish = harness
            .engine
            .create_dish(
                "Flan".to_string(),
                "House dessert".to_string(),
                Money::from_cents(700),
                "Casa Lupita".to_string(),
                5,
            )
            .await
            .unwrap();

        let mut alerts = harness.broker.take_receiver(wire::STOCK_ALERT_QUEUE).unwrap();
        let delivery = alerts.recv().await.unwrap();
        let alert: StockAlert = serde_json::from_str(&delivery.body).unwrap();
        assert_eq!(alert.product_id, dish.id);
        assert_eq!(alert.remaining, 5);
    }

    #[tokio::test]
    async fn recover_reports_unreleased_records_without_restoring_stock() {
        let harness = setup().await;
        let dish = seed_dish(&harness, 3000, 20).await;

        harness
            .engine
            .handle_stock_check(&request(12, &[(dish.id.as_u64(), 1)]))
            .await
            .unwrap();

        // A delivered order never releases, so its record still shows up.
        let unreleased = harness.engine.recover().await;
        assert_eq!(unreleased.len(), 1);
        assert_eq!(unreleased[0].order_id, OrderId::new(12));
        assert_eq!(
            harness.dishes.find_by_id(dish.id).await.unwrap().stock_count,
            19
        );

        // Only a release drops the record.
        let release = serde_json::to_string(&ReleaseReservation::new(OrderId::new(12))).unwrap();
        harness.engine.handle_release(&release).await.unwrap();
        assert!(harness.engine.recover().await.is_empty());
    }
}
