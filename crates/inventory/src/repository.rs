//! Dish repository and reservation log traits with in-memory implementations.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::dish::Dish;

/// Key-value storage capability for dishes.
#[async_trait]
pub trait DishRepository: Send + Sync {
    /// Looks a dish up by id.
    async fn find_by_id(&self, id: ProductId) -> Option<Dish>;

    /// Creates a dish, assigning its identity.
    async fn create(
        &self,
        name: String,
        description: String,
        unit_price: Money,
        company_name: String,
        stock_count: u32,
    ) -> Dish;

    /// Saves an existing dish.
    async fn save(&self, dish: Dish);
}

#[derive(Default)]
struct DishStoreState {
    dishes: HashMap<ProductId, Dish>,
    next_id: u64,
}

/// In-memory dish repository.
#[derive(Clone, Default)]
pub struct InMemoryDishRepository {
    state: Arc<RwLock<DishStoreState>>,
}

impl InMemoryDishRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored dishes.
    pub async fn len(&self) -> usize {
        self.state.read().await.dishes.len()
    }

    /// Returns true if no dishes are stored.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.dishes.is_empty()
    }
}

#[async_trait]
impl DishRepository for InMemoryDishRepository {
    async fn find_by_id(&self, id: ProductId) -> Option<Dish> {
        self.state.read().await.dishes.get(&id).cloned()
    }

    async fn create(
        &self,
        name: String,
        description: String,
        unit_price: Money,
        company_name: String,
        stock_count: u32,
    ) -> Dish {
        let mut state = self.state.write().await;
        state.next_id += 1;
        let dish = Dish {
            id: ProductId::new(state.next_id),
            name,
            description,
            unit_price,
            company_name,
            stock_count,
        };
        state.dishes.insert(dish.id, dish.clone());
        dish
    }

    async fn save(&self, dish: Dish) {
        self.state.write().await.dishes.insert(dish.id, dish);
    }
}

/// A reservation held for an order: the quantities decremented from stock.
///
/// Persisted keyed by order id so a release can restore exactly what was
/// taken. Only a release removes a record; a delivered order never
/// releases, so its record stays behind as the trail of what was consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRecord {
    pub order_id: OrderId,
    pub items: Vec<(ProductId, u32)>,
    pub reserved_at: DateTime<Utc>,
}

/// Durable record of reservations, keyed by order id.
#[async_trait]
pub trait ReservationLog: Send + Sync {
    /// Appends a reservation record. A second append for the same order id
    /// replaces the first (at most one in-flight check per order).
    async fn append(&self, record: ReservationRecord);

    /// Looks a record up without removing it.
    async fn find(&self, order_id: OrderId) -> Option<ReservationRecord>;

    /// Removes and returns the record for an order, if any.
    async fn take(&self, order_id: OrderId) -> Option<ReservationRecord>;

    /// Returns every record that has not seen a release. This includes
    /// delivered orders, so on its own it is not a list of stuck
    /// reservations.
    async fn unreleased(&self) -> Vec<ReservationRecord>;
}

/// In-memory reservation log.
#[derive(Clone, Default)]
pub struct InMemoryReservationLog {
    records: Arc<RwLock<HashMap<OrderId, ReservationRecord>>>,
}

impl InMemoryReservationLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of unreleased records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns true if the log holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ReservationLog for InMemoryReservationLog {
    async fn append(&self, record: ReservationRecord) {
        self.records.write().await.insert(record.order_id, record);
    }

    async fn find(&self, order_id: OrderId) -> Option<ReservationRecord> {
        self.records.read().await.get(&order_id).cloned()
    }

    async fn take(&self, order_id: OrderId) -> Option<ReservationRecord> {
        self.records.write().await.remove(&order_id)
    }

    async fn unreleased(&self) -> Vec<ReservationRecord> {
        let mut records: Vec<_> = self.records.read().await.values().cloned().collect();
        records.sort_by_key(|r| r.order_id);
        records
    }
}
