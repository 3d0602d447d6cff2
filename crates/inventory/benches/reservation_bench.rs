use std::collections::BTreeMap;
use std::sync::Arc;

use broker::Broker;
use common::wire::{self, StockCheckRequest};
use common::{Money, OrderId, ProductId};
use criterion::{Criterion, criterion_group, criterion_main};
use inventory::{DishRepository, InMemoryDishRepository, InMemoryReservationLog, InventoryEngine};

async fn engine_with_dishes(
    count: u32,
    stock: u32,
) -> (
    Arc<InventoryEngine<InMemoryDishRepository, InMemoryReservationLog>>,
    Broker,
) {
    let broker = Broker::new();
    broker.declare_queue(wire::STOCK_CONFIRMATION_QUEUE);
    broker.declare_queue(wire::STOCK_ALERT_QUEUE);
    broker.declare_exchange(wire::ADMIN_LOG_EXCHANGE);

    let dishes = InMemoryDishRepository::new();
    for n in 0..count {
        dishes
            .create(
                format!("Dish {n}"),
                String::new(),
                Money::from_cents(1500 + n as i64 * 25),
                "Bench Kitchen".to_string(),
                stock,
            )
            .await;
    }
    let engine = Arc::new(InventoryEngine::new(
        broker.clone(),
        dishes,
        InMemoryReservationLog::new(),
    ));
    (engine, broker)
}

fn check_payload(order_id: u64, products: u64) -> String {
    let quantities: BTreeMap<ProductId, u32> =
        (1..=products).map(|id| (ProductId::new(id), 1)).collect();
    serde_json::to_string(&StockCheckRequest::new(OrderId::new(order_id), quantities)).unwrap()
}

fn bench_stock_check_single_item(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (engine, broker) = rt.block_on(engine_with_dishes(16, u32::MAX / 2));
    let mut responses = rt.block_on(async {
        broker.take_receiver(wire::STOCK_CONFIRMATION_QUEUE).unwrap()
    });
    let payload = check_payload(1, 1);

    c.bench_function("inventory/stock_check_single_item", |b| {
        b.iter(|| {
            rt.block_on(async {
                engine.handle_stock_check(&payload).await.unwrap();
                responses.recv().await.unwrap();
            });
        });
    });
}

fn bench_stock_check_ten_items(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (engine, broker) = rt.block_on(engine_with_dishes(16, u32::MAX / 2));
    let mut responses = rt.block_on(async {
        broker.take_receiver(wire::STOCK_CONFIRMATION_QUEUE).unwrap()
    });
    let payload = check_payload(1, 10);

    c.bench_function("inventory/stock_check_ten_items", |b| {
        b.iter(|| {
            rt.block_on(async {
                engine.handle_stock_check(&payload).await.unwrap();
                responses.recv().await.unwrap();
            });
        });
    });
}

fn bench_out_of_stock_verdict(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (engine, broker) = rt.block_on(engine_with_dishes(16, 0));
    let mut responses = rt.block_on(async {
        broker.take_receiver(wire::STOCK_CONFIRMATION_QUEUE).unwrap()
    });
    let payload = check_payload(1, 4);

    c.bench_function("inventory/out_of_stock_verdict", |b| {
        b.iter(|| {
            rt.block_on(async {
                engine.handle_stock_check(&payload).await.unwrap();
                responses.recv().await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_stock_check_single_item,
    bench_stock_check_ten_items,
    bench_out_of_stock_verdict,
);
criterion_main!(benches);
