//! Service wiring for the food-ordering platform.
//!
//! Builds the broker, the three services, and their repositories, then
//! subscribes every consumer. The same wiring backs the binary and the
//! integration tests.

pub mod config;

use std::sync::Arc;

use broker::{Broker, BrokerConfig};
use common::auth::{AuthError, Claims, StaticTokenIntrospector, TokenIntrospector};
use inventory::{
    InMemoryDishRepository, InMemoryReservationLog, InventoryConfig, InventoryEngine,
};
use notification::{
    InMemoryNotificationRepository, NotificationDispatcher, SessionRegistry,
};
use order::{
    CartSession, InMemoryCartRepository, InMemoryOrderRepository, OrchestratorConfig,
    OrderOrchestrator,
};

pub use config::Config;

/// The assembled platform: one broker, three services, shared stores.
pub struct Platform {
    pub broker: Broker,
    pub inventory: Arc<InventoryEngine<InMemoryDishRepository, InMemoryReservationLog>>,
    pub orchestrator: Arc<OrderOrchestrator<InMemoryOrderRepository>>,
    pub dispatcher: Arc<NotificationDispatcher<InMemoryNotificationRepository>>,
    pub dishes: InMemoryDishRepository,
    pub carts: InMemoryCartRepository,
    pub orders: InMemoryOrderRepository,
    pub reservations: InMemoryReservationLog,
    pub notifications: InMemoryNotificationRepository,
    pub sessions: SessionRegistry,
    pub tokens: StaticTokenIntrospector,
}

impl Platform {
    /// Wires everything up and starts the consumers.
    pub fn start(config: &Config) -> broker::Result<Self> {
        let broker = Broker::with_config(BrokerConfig {
            worker_count: config.broker_workers,
            queue_depth: config.broker_queue_depth,
        });

        let dishes = InMemoryDishRepository::new();
        let carts = InMemoryCartRepository::new();
        let orders = InMemoryOrderRepository::new();
        let reservations = InMemoryReservationLog::new();
        let notifications = InMemoryNotificationRepository::new();
        let sessions = SessionRegistry::new();
        let tokens = StaticTokenIntrospector::new();

        let inventory = Arc::new(InventoryEngine::with_config(
            broker.clone(),
            dishes.clone(),
            reservations.clone(),
            InventoryConfig {
                low_stock_threshold: config.low_stock_threshold,
                critical_stock_threshold: config.critical_stock_threshold,
            },
        ));
        let orchestrator = Arc::new(OrderOrchestrator::with_config(
            broker.clone(),
            orders.clone(),
            OrchestratorConfig {
                min_charge: config.min_charge(),
            },
        ));
        let dispatcher = Arc::new(NotificationDispatcher::new(
            notifications.clone(),
            Arc::new(sessions.clone()),
        ));

        // Declaration is idempotent; each service declares what it touches
        // and consumes its own queues.
        inventory.subscribe(&broker)?;
        orchestrator.subscribe(&broker)?;
        dispatcher.subscribe(&broker)?;

        Ok(Self {
            broker,
            inventory,
            orchestrator,
            dispatcher,
            dishes,
            carts,
            orders,
            reservations,
            notifications,
            sessions,
            tokens,
        })
    }

    /// A cart session over the platform's cart store.
    pub fn cart_session(&self) -> CartSession<InMemoryCartRepository> {
        CartSession::new(self.carts.clone())
    }

    /// Resolves an access token into its claims. The edge layer calls this
    /// before any cart, order, or notification operation.
    pub fn authenticate(&self, token: &str) -> Result<Claims, AuthError> {
        self.tokens.resolve(token)
    }
}
