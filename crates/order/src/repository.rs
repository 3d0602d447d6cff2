use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, UserId};
use tokio::sync::RwLock;

use crate::cart::Cart;
use crate::model::{Order, OrderLine};
use crate::status::OrderStatus;

/// Durable storage for carts, keyed by owner.
#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn find_by_owner(&self, owner: UserId) -> Option<Cart>;

    async fn save(&self, cart: Cart);

    async fn delete(&self, owner: UserId);
}

/// In-memory cart store.
#[derive(Clone, Default)]
pub struct InMemoryCartRepository {
    carts: Arc<RwLock<HashMap<UserId, Cart>>>,
}

impl InMemoryCartRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartRepository for InMemoryCartRepository {
    async fn find_by_owner(&self, owner: UserId) -> Option<Cart> {
        self.carts.read().await.get(&owner).cloned()
    }

    async fn save(&self, cart: Cart) {
        self.carts.write().await.insert(cart.owner, cart);
    }

    async fn delete(&self, owner: UserId) {
        self.carts.write().await.remove(&owner);
    }
}

/// Durable storage for orders. The store owns identity assignment; an
/// order id exists only once `create` has persisted the order.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persists a new `Pending` order and assigns its id.
    async fn create(&self, owner: UserId, lines: Vec<OrderLine>) -> Order;

    async fn find_by_id(&self, id: OrderId) -> Option<Order>;

    async fn find_by_owner(&self, owner: UserId) -> Vec<Order>;

    /// Orders with at least one line sold by the named company.
    async fn find_by_company(&self, company_name: &str) -> Vec<Order>;

    async fn save(&self, order: Order);
}

#[derive(Default)]
struct OrderStoreState {
    orders: HashMap<OrderId, Order>,
    next_id: u64,
}

/// In-memory order store with sequential id assignment.
#[derive(Clone, Default)]
pub struct InMemoryOrderRepository {
    state: Arc<RwLock<OrderStoreState>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.orders.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.orders.is_empty()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create(&self, owner: UserId, lines: Vec<OrderLine>) -> Order {
        let mut state = self.state.write().await;
        state.next_id += 1;
        let order = Order {
            id: OrderId::new(state.next_id),
            owner,
            lines,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        };
        state.orders.insert(order.id, order.clone());
        order
    }

    async fn find_by_id(&self, id: OrderId) -> Option<Order> {
        self.state.read().await.orders.get(&id).cloned()
    }

    async fn find_by_owner(&self, owner: UserId) -> Vec<Order> {
        let state = self.state.read().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|order| order.owner == owner)
            .cloned()
            .collect();
        orders.sort_by_key(|order| order.id);
        orders
    }

    async fn find_by_company(&self, company_name: &str) -> Vec<Order> {
        let state = self.state.read().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|order| {
                order
                    .lines
                    .iter()
                    .any(|line| line.seller_company == company_name)
            })
            .cloned()
            .collect();
        orders.sort_by_key(|order| order.id);
        orders
    }

    async fn save(&self, order: Order) {
        self.state.write().await.orders.insert(order.id, order);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Money, ProductId};

    fn line(product_id: u64) -> OrderLine {
        OrderLine {
            product_id: ProductId::new(product_id),
            name: "Tacos".to_string(),
            seller_company: "Casa Lupita".to_string(),
            unit_price: Money::from_cents(3000),
            quantity: 1,
        }
    }

    #[tokio::test]
    async fn create_assigns_sequential_ids() {
        let repository = InMemoryOrderRepository::new();
        let first = repository.create(UserId::new(1), vec![line(1)]).await;
        let second = repository.create(UserId::new(1), vec![line(2)]).await;
        assert_eq!(first.id, OrderId::new(1));
        assert_eq!(second.id, OrderId::new(2));
        assert_eq!(first.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn find_by_owner_sorts_by_id() {
        let repository = InMemoryOrderRepository::new();
        repository.create(UserId::new(1), vec![line(1)]).await;
        repository.create(UserId::new(2), vec![line(2)]).await;
        repository.create(UserId::new(1), vec![line(3)]).await;

        let orders = repository.find_by_owner(UserId::new(1)).await;
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].id, OrderId::new(1));
        assert_eq!(orders[1].id, OrderId::new(3));
    }

    #[tokio::test]
    async fn find_by_company_matches_any_line() {
        let repository = InMemoryOrderRepository::new();
        let other = OrderLine {
            seller_company: "El Jardin".to_string(),
            ..line(9)
        };
        repository.create(UserId::new(1), vec![line(1)]).await;
        repository
            .create(UserId::new(2), vec![line(2), other.clone()])
            .await;
        repository.create(UserId::new(3), vec![other]).await;

        let orders = repository.find_by_company("Casa Lupita").await;
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].id, OrderId::new(1));
        assert_eq!(orders[1].id, OrderId::new(2));
        assert!(repository.find_by_company("Nowhere").await.is_empty());
    }

    #[tokio::test]
    async fn save_overwrites_by_id() {
        let repository = InMemoryOrderRepository::new();
        let mut order = repository.create(UserId::new(1), vec![line(1)]).await;
        order.cancel().unwrap();
        repository.save(order.clone()).await;
        assert_eq!(
            repository.find_by_id(order.id).await.unwrap().status,
            OrderStatus::Canceled
        );
    }

    #[tokio::test]
    async fn cart_repository_round_trip() {
        let repository = InMemoryCartRepository::new();
        assert!(repository.find_by_owner(UserId::new(1)).await.is_none());

        repository.save(Cart::empty(UserId::new(1))).await;
        assert!(repository.find_by_owner(UserId::new(1)).await.is_some());

        repository.delete(UserId::new(1)).await;
        assert!(repository.find_by_owner(UserId::new(1)).await.is_none());
    }
}
