use std::{sync::Arc, time::Duration};

use serde_json::json;

use pizzastore::{
    config::PizzeriaConfig,
    error::ErrorKind,
    runtime::{
        events::PizzeriaEvent,
        handle::{PizzeriaHandle, RuntimeError, spawn_pizzeria},
    },
    storage::{Storage, StorageResult, memory::MemoryStorage},
};

fn quiet_config() -> PizzeriaConfig {
    PizzeriaConfig {
        merge_interval_ms: 3_600_000,
        merge_on_start: false,
        ..PizzeriaConfig::default()
    }
}

fn storage() -> Arc<MemoryStorage> {
    let storage = Arc::new(MemoryStorage::new().with_document("pizza.json", "[]"));
    storage.create_dir("orders").expect("order dir");
    storage
}

fn pizza_fields(name: &str) -> serde_json::Value {
    json!({"name": name, "toppings": ["tomato"], "imageUrl": format!("{name}.png"), "status": true})
}

/// Memory storage whose directory listing stalls, keeping a merge cycle in
/// flight long enough to overlap it.
struct SlowListing {
    inner: MemoryStorage,
    delay: Duration,
}

impl Storage for SlowListing {
    fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.inner.read(key)
    }

    fn write_atomic(&self, key: &str, bytes: &[u8]) -> StorageResult<()> {
        self.inner.write_atomic(key, bytes)
    }

    fn list_entries(&self, dir: &str) -> StorageResult<Vec<String>> {
        std::thread::sleep(self.delay);
        self.inner.list_entries(dir)
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        self.inner.remove(key)
    }

    fn create_dir(&self, dir: &str) -> StorageResult<()> {
        self.inner.create_dir(dir)
    }
}

fn slow_storage(delay: Duration) -> Arc<SlowListing> {
    let inner = MemoryStorage::new()
        .with_document("pizza.json", "[]")
        .with_document(
            "orders/a.json",
            r#"{"id":"a","orderedPizzas":["Margherita"],"name":"Alice"}"#,
        );
    Arc::new(SlowListing { inner, delay })
}

async fn next_event(sub: &mut tokio::sync::broadcast::Receiver<PizzeriaEvent>) -> PizzeriaEvent {
    tokio::time::timeout(Duration::from_secs(2), sub.recv())
        .await
        .expect("event")
        .expect("recv")
}

#[tokio::test]
async fn catalog_round_trip_and_events_ordered() {
    let handle = spawn_pizzeria(storage(), quiet_config());
    let mut sub = handle.subscribe();

    let created = handle.create_pizza(&pizza_fields("Margherita")).await.expect("create");
    assert_eq!(created.id, 1);
    handle
        .update_pizza(1, &pizza_fields("Margherita DOP"))
        .await
        .expect("update");
    assert_eq!(handle.get_pizza(1).await.expect("get").name, "Margherita DOP");
    assert!(handle.delete_pizza(1).await.expect("delete"));

    let err = handle.delete_pizza(1).await.expect_err("second delete");
    assert_eq!(err.kind(), Some(ErrorKind::NotFound));
    assert!(handle.read_catalog().await.expect("list").is_empty());

    assert_eq!(next_event(&mut sub).await, PizzeriaEvent::PizzaCreated { id: 1 });
    assert_eq!(next_event(&mut sub).await, PizzeriaEvent::PizzaUpdated { id: 1 });
    assert_eq!(next_event(&mut sub).await, PizzeriaEvent::PizzaDeleted { id: 1 });

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn invalid_fields_are_rejected_before_the_writer() {
    let backing = storage();
    let handle = spawn_pizzeria(backing.clone(), quiet_config());

    let err = handle
        .create_pizza(&json!({"name": "NoToppings", "imageUrl": "", "status": true}))
        .await
        .expect_err("invalid");
    assert_eq!(err.kind(), Some(ErrorKind::Validation));
    assert_eq!(backing.read("pizza.json").expect("read"), b"[]");

    let err = handle
        .submit_order(&json!({"orderedPizzas": [], "name": "Anon"}))
        .await
        .expect_err("no id");
    assert_eq!(err.kind(), Some(ErrorKind::Validation));

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_do_not_lose_updates() {
    let handle = spawn_pizzeria(storage(), quiet_config());

    let mut tasks = Vec::new();
    for i in 0..16 {
        let h: PizzeriaHandle = handle.clone();
        tasks.push(tokio::spawn(async move {
            h.create_pizza(&pizza_fields(&format!("p{i}"))).await
        }));
    }
    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.expect("join").expect("create").id);
    }
    ids.sort();
    assert_eq!(ids, (1..=16).collect::<Vec<_>>());
    assert_eq!(handle.read_catalog().await.expect("list").len(), 16);

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn order_is_visible_directly_then_in_aggregate_after_merge() {
    let handle = spawn_pizzeria(storage(), quiet_config());

    let err = handle.read_order_aggregate().await.expect_err("no merge yet");
    assert_eq!(err.kind(), Some(ErrorKind::StorageRead));

    let order = json!({"id": "a", "orderedPizzas": ["Margherita"], "name": "Alice"});
    let echoed = handle.submit_order(&order).await.expect("submit");
    assert_eq!(echoed.name, "Alice");
    assert_eq!(handle.get_order("a").await.expect("lookup").ordered_pizzas, vec!["Margherita"]);
    assert!(handle.read_order_aggregate().await.is_err());

    let report = handle.trigger_merge().await.expect("merge").expect("not skipped");
    assert_eq!(report.merged, 1);
    let aggregate = handle.read_order_aggregate().await.expect("aggregate");
    assert_eq!(aggregate.len(), 1);
    assert_eq!(aggregate[0].id, "a");

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn submit_without_order_dir_is_a_write_error() {
    let backing = Arc::new(MemoryStorage::new().with_document("pizza.json", "[]"));
    let handle = spawn_pizzeria(backing, quiet_config());

    let err = handle
        .submit_order(&json!({"id": "a", "orderedPizzas": [], "name": "Alice"}))
        .await
        .expect_err("no dir");
    assert_eq!(err.kind(), Some(ErrorKind::StorageWrite));

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn timer_merges_on_start_and_on_interval() {
    let backing = storage();
    let cfg = PizzeriaConfig {
        merge_interval_ms: 50,
        merge_on_start: true,
        ..PizzeriaConfig::default()
    };
    let handle = spawn_pizzeria(backing, cfg);
    let mut sub = handle.subscribe();

    loop {
        if let PizzeriaEvent::AggregateRefreshed { orders, .. } = next_event(&mut sub).await {
            assert_eq!(orders, 0);
            break;
        }
    }

    handle
        .submit_order(&json!({"id": "late", "orderedPizzas": ["Funghi"], "name": "Lou"}))
        .await
        .expect("submit");

    let mut seen = false;
    for _ in 0..20 {
        if let PizzeriaEvent::AggregateRefreshed { orders: 1, .. } = next_event(&mut sub).await {
            seen = true;
            break;
        }
    }
    assert!(seen, "expected a timer merge to pick up the new order");

    handle.shutdown().await.expect("shutdown");
    assert!(matches!(handle.trigger_merge().await, Err(RuntimeError::Stopped)));
}

#[tokio::test]
async fn replace_catalog_validates_whole_document() {
    let backing = storage();
    let handle = spawn_pizzeria(backing.clone(), quiet_config());

    let doc = json!([
        {"id": 10, "name": "a", "toppings": [], "imageUrl": "", "status": true},
        {"id": 11, "name": "b", "toppings": [], "url": "b.png", "status": false}
    ]);
    let stored = handle.replace_catalog(&doc).await.expect("replace");
    assert_eq!(stored.len(), 2);
    assert_eq!(handle.create_pizza(&pizza_fields("c")).await.expect("create").id, 12);

    let err = handle
        .replace_catalog(&json!([{"id": 1}]))
        .await
        .expect_err("invalid");
    assert_eq!(err.kind(), Some(ErrorKind::Validation));
    assert_eq!(handle.read_catalog().await.expect("list").len(), 3);

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn overlapping_trigger_is_skipped_while_a_cycle_runs() {
    let handle = spawn_pizzeria(slow_storage(Duration::from_millis(400)), quiet_config());

    let first = tokio::spawn({
        let h = handle.clone();
        async move { h.trigger_merge().await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let second = handle.trigger_merge().await.expect("second trigger");
    assert!(second.is_none(), "overlapping trigger must be skipped");

    let first = first.await.expect("join").expect("first trigger");
    assert_eq!(first.expect("first cycle ran").merged, 1);

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_waits_for_an_in_flight_merge() {
    let backing = slow_storage(Duration::from_millis(400));
    let handle = spawn_pizzeria(backing.clone(), quiet_config());
    let mut sub = handle.subscribe();

    let pending = tokio::spawn({
        let h = handle.clone();
        async move { h.trigger_merge().await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    handle.shutdown().await.expect("shutdown");
    assert!(
        backing.read("orders.json").is_ok(),
        "aggregate must be written before shutdown returns"
    );

    let report = pending.await.expect("join").expect("in-flight trigger");
    assert_eq!(report.expect("cycle ran").merged, 1);

    assert_eq!(
        next_event(&mut sub).await,
        PizzeriaEvent::AggregateRefreshed { orders: 1, skipped: 0 }
    );
    assert!(matches!(handle.trigger_merge().await, Err(RuntimeError::Stopped)));
    let late = tokio::time::timeout(Duration::from_millis(300), sub.recv()).await;
    assert!(late.is_err(), "no merge may run after shutdown: {late:?}");
}
