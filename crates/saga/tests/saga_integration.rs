//! Integration tests for order placement sagas.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use inventory::{InMemoryInventoryStore, InventoryStore, ProductId};
use orders::{InMemoryOrderRepository, LineItem, OrderFilter, OrderRepository, OrderStatus, UserId};
use saga::testing::{InventoryCall, RecordingInventory};
use saga::{
    FileSagaJournal, InMemorySagaJournal, RetryPolicy, SagaCoordinator, SagaError, SagaEvent,
    SagaJournal, SagaState,
};
use tokio_util::sync::CancellationToken;

type TestCoordinator = SagaCoordinator<
    RecordingInventory<InMemoryInventoryStore>,
    InMemoryOrderRepository,
    InMemorySagaJournal,
>;

struct TestHarness {
    coordinator: Arc<TestCoordinator>,
    inventory: RecordingInventory<InMemoryInventoryStore>,
    orders: InMemoryOrderRepository,
    journal: InMemorySagaJournal,
}

fn fast_retry(max_retries: usize) -> RetryPolicy {
    RetryPolicy::builder()
        .max_retries(max_retries)
        .initial_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(5))
        .build()
}

impl TestHarness {
    fn new(stock: &[(&str, u64)]) -> Self {
        Self::with_retry(stock, fast_retry(3))
    }

    fn with_retry(stock: &[(&str, u64)], policy: RetryPolicy) -> Self {
        let inventory =
            RecordingInventory::new(InMemoryInventoryStore::with_stock(stock.iter().copied()));
        let orders = InMemoryOrderRepository::new();
        let journal = InMemorySagaJournal::new();

        let coordinator =
            SagaCoordinator::new(inventory.clone(), orders.clone(), journal.clone())
                .with_retry_policy(policy);

        Self {
            coordinator: Arc::new(coordinator),
            inventory,
            orders,
            journal,
        }
    }

    async fn stock(&self, product: &str) -> u64 {
        self.inventory
            .get(&ProductId::new(product))
            .await
            .unwrap()
            .stock
    }

    async fn place(&self, cart: &[(&str, i64)]) -> Result<orders::Order, SagaError> {
        let items = cart.iter().map(|&(p, q)| LineItem::new(p, q)).collect();
        self.coordinator
            .create_order(UserId::new("alice"), items)
            .await
    }

    async fn only_order(&self) -> orders::Order {
        let mut all = self.orders.list(OrderFilter::all()).await.unwrap();
        assert_eq!(all.len(), 1);
        all.remove(0)
    }
}

#[tokio::test]
async fn test_scenario_second_item_exceeds_stock() {
    let h = TestHarness::new(&[("1", 10), ("2", 20)]);

    let err = h.place(&[("1", 5), ("2", 25)]).await.unwrap_err();

    assert!(matches!(err, SagaError::InsufficientStock { .. }));
    assert_eq!(err.product_id(), Some(&ProductId::new("2")));
    assert_eq!(h.stock("1").await, 10);
    assert_eq!(h.stock("2").await, 20);
}

#[tokio::test]
async fn test_scenario_order_drains_stock_exactly() {
    let h = TestHarness::new(&[("1", 10)]);

    let order = h.place(&[("1", 10)]).await.unwrap();

    assert_eq!(order.status(), OrderStatus::Confirmed);
    assert_eq!(order.user_id().as_str(), "alice");
    assert_eq!(h.stock("1").await, 0);
    assert_eq!(h.only_order().await, order);
}

#[tokio::test]
async fn test_each_product_drops_by_requested_quantity() {
    let h = TestHarness::new(&[("1", 10), ("2", 20), ("3", 30)]);

    h.place(&[("1", 1), ("2", 2), ("3", 3)]).await.unwrap();

    assert_eq!(h.stock("1").await, 9);
    assert_eq!(h.stock("2").await, 18);
    assert_eq!(h.stock("3").await, 27);
    assert!(h.inventory.incremented_products().is_empty());
}

#[tokio::test]
async fn test_compensation_runs_in_reverse_order() {
    let h = TestHarness::new(&[("A", 10), ("B", 10), ("C", 10), ("D", 0)]);

    let err = h
        .place(&[("A", 1), ("B", 2), ("C", 3), ("D", 1)])
        .await
        .unwrap_err();

    assert_eq!(err.product_id(), Some(&ProductId::new("D")));
    assert_eq!(
        h.inventory.incremented_products(),
        vec![ProductId::new("C"), ProductId::new("B"), ProductId::new("A")]
    );
    for product in ["A", "B", "C"] {
        assert_eq!(h.stock(product).await, 10);
    }

    // Each compensation restores exactly what was taken
    let increments: Vec<_> = h
        .inventory
        .calls()
        .into_iter()
        .filter(|c| matches!(c, InventoryCall::Increment { .. }))
        .collect();
    assert_eq!(
        increments,
        vec![
            InventoryCall::Increment {
                product_id: ProductId::new("C"),
                quantity: 3
            },
            InventoryCall::Increment {
                product_id: ProductId::new("B"),
                quantity: 2
            },
            InventoryCall::Increment {
                product_id: ProductId::new("A"),
                quantity: 1
            },
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_orders_never_oversell() {
    const Q: i64 = 5;
    let h = TestHarness::new(&[("1", 2 * Q as u64)]);

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let coordinator = Arc::clone(&h.coordinator);
            tokio::spawn(async move {
                coordinator
                    .create_order(UserId::guest(), vec![LineItem::new("1", Q)])
                    .await
            })
        })
        .collect();

    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let confirmed = results.iter().filter(|r| r.is_ok()).count();
    let refused = results
        .iter()
        .filter(|r| matches!(r, Err(SagaError::InsufficientStock { .. })))
        .count();

    assert_eq!(confirmed, 2);
    assert_eq!(refused, 1);
    assert_eq!(h.stock("1").await, 0);
}

#[tokio::test]
async fn test_repeated_failing_cart_does_not_drift() {
    let h = TestHarness::new(&[("1", 10), ("2", 20)]);

    for _ in 0..5 {
        let err = h.place(&[("1", 5), ("2", 25)]).await.unwrap_err();
        assert!(matches!(
            err,
            SagaError::InsufficientStock { requested: 25, available: 20, .. }
        ));
    }

    assert_eq!(h.stock("1").await, 10);
    assert_eq!(h.stock("2").await, 20);
}

#[tokio::test]
async fn test_communication_failure_rolls_back_without_forward_retry() {
    let h = TestHarness::new(&[("1", 10), ("2", 20)]);
    h.inventory.fail_decrements_for("2");

    let err = h.place(&[("1", 4), ("2", 1)]).await.unwrap_err();

    assert!(matches!(err, SagaError::CommunicationFailure { .. }));
    assert_eq!(err.product_id(), Some(&ProductId::new("2")));
    assert_eq!(h.stock("1").await, 10);

    let decrements_of_2 = h
        .inventory
        .calls()
        .into_iter()
        .filter(|c| {
            matches!(c, InventoryCall::TryDecrement { product_id, .. } if product_id.as_str() == "2")
        })
        .count();
    assert_eq!(decrements_of_2, 1);
}

#[tokio::test]
async fn test_unknown_product_rolls_back() {
    let h = TestHarness::new(&[("1", 10)]);

    let err = h.place(&[("1", 4), ("nope", 1)]).await.unwrap_err();

    assert!(matches!(err, SagaError::ProductNotFound(ref p) if p.as_str() == "nope"));
    assert_eq!(h.stock("1").await, 10);
}

#[tokio::test]
async fn test_failed_saga_persists_audit_order() {
    let h = TestHarness::new(&[("1", 10), ("2", 20)]);

    h.place(&[("1", 5), ("2", 25)]).await.unwrap_err();

    let order = h.only_order().await;
    assert_eq!(order.status(), OrderStatus::Failed);
    assert_eq!(
        order.failure_reason(),
        Some("Insufficient stock for product 2: requested 25, available 20")
    );

    let confirmed = h
        .orders
        .list(OrderFilter::all().with_status(OrderStatus::Confirmed))
        .await
        .unwrap();
    assert!(confirmed.is_empty());
}

#[tokio::test]
async fn test_validation_failures_leave_no_trace() {
    let h = TestHarness::new(&[("1", 10)]);

    assert!(matches!(h.place(&[]).await, Err(SagaError::EmptyCart)));
    assert!(matches!(
        h.place(&[("1", 0)]).await,
        Err(SagaError::InvalidQuantity { .. })
    ));

    assert!(h.inventory.calls().is_empty());
    assert_eq!(h.orders.order_count().await, 0);
    assert_eq!(h.journal.saga_count().await, 0);
}

#[tokio::test]
async fn test_transient_compensation_failure_is_retried() {
    let h = TestHarness::new(&[("1", 10), ("2", 20)]);
    h.inventory.fail_increments_for("1", 2);

    let err = h.place(&[("1", 5), ("2", 25)]).await.unwrap_err();

    assert!(matches!(err, SagaError::InsufficientStock { .. }));
    assert_eq!(h.stock("1").await, 10);
    assert!(h.journal.anomalies().await.unwrap().is_empty());

    let order = h.only_order().await;
    let events = h.journal.events_for(order.id()).await.unwrap();
    let attempts = events.iter().find_map(|e| match e {
        SagaEvent::ItemCompensated(data) => Some(data.attempts),
        _ => None,
    });
    assert_eq!(attempts, Some(3));
}

#[tokio::test]
async fn test_exhausted_compensation_records_anomaly() {
    let h = TestHarness::with_retry(&[("1", 10), ("2", 20)], fast_retry(2));
    h.inventory.fail_increments_for("1", 10);

    let err = h.place(&[("1", 5), ("2", 25)]).await.unwrap_err();

    // The caller still sees the failure that triggered rollback
    assert!(matches!(err, SagaError::InsufficientStock { .. }));
    assert_eq!(h.stock("1").await, 5);

    let anomalies = h.journal.anomalies().await.unwrap();
    assert_eq!(anomalies.len(), 1);
    let (order_id, anomaly) = &anomalies[0];
    assert_eq!(anomaly.product_id.as_str(), "1");
    assert_eq!(anomaly.quantity, 5);
    assert_eq!(anomaly.attempts, 3);

    let saga = h.coordinator.get_saga(*order_id).await.unwrap().unwrap();
    assert_eq!(saga.state(), SagaState::Failed);
    assert!(saga.has_unresolved_anomalies());
}

#[tokio::test]
async fn test_permanent_compensation_failure_is_not_retried() {
    let h = TestHarness::new(&[("1", 10), ("2", 20), ("3", 0)]);
    h.inventory.reject_increments_for("2");

    h.place(&[("1", 1), ("2", 1), ("3", 1)]).await.unwrap_err();

    // One increment for "2" despite the retry policy; "1" still compensated
    assert_eq!(
        h.inventory.incremented_products(),
        vec![ProductId::new("2"), ProductId::new("1")]
    );
    assert_eq!(h.stock("1").await, 10);
    assert_eq!(h.stock("2").await, 19);
    assert_eq!(h.journal.anomalies().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_retry_compensation_resolves_anomaly_once() {
    let h = TestHarness::new(&[("1", 10), ("2", 20)]);
    h.inventory.reject_increments_for("1");

    h.place(&[("1", 5), ("2", 25)]).await.unwrap_err();
    let order = h.only_order().await;
    assert_eq!(h.stock("1").await, 5);

    h.inventory.heal_increments();
    let saga = h.coordinator.retry_compensation(order.id()).await.unwrap();

    assert_eq!(saga.state(), SagaState::Failed);
    assert!(saga.applied_log().is_fully_compensated());
    assert!(!saga.has_unresolved_anomalies());
    assert_eq!(h.stock("1").await, 10);

    // Nothing left to undo
    h.coordinator.retry_compensation(order.id()).await.unwrap();
    assert_eq!(h.stock("1").await, 10);
}

/// Leaves a Failed saga with an anomaly on "1" whose next increment fails
/// once and then waits out a long backoff.
async fn failed_saga_with_slow_retry() -> (TestHarness, orders::OrderId) {
    let slow = RetryPolicy::builder()
        .max_retries(2)
        .initial_delay(Duration::from_millis(200))
        .max_delay(Duration::from_millis(200))
        .build();
    let h = TestHarness::with_retry(&[("1", 10), ("2", 20)], slow);
    h.inventory.reject_increments_for("1");

    h.place(&[("1", 5), ("2", 25)]).await.unwrap_err();
    let order_id = h.only_order().await.id();
    assert_eq!(h.stock("1").await, 5);

    h.inventory.heal_increments();
    h.inventory.fail_increments_for("1", 1);
    (h, order_id)
}

#[tokio::test]
async fn test_dropped_retry_compensation_releases_order() {
    let (h, order_id) = failed_saga_with_slow_retry().await;

    // Dropped while backing off after the first failed increment
    let dropped = tokio::time::timeout(
        Duration::from_millis(50),
        h.coordinator.retry_compensation(order_id),
    )
    .await;
    assert!(dropped.is_err());
    assert_eq!(h.stock("1").await, 5);

    let saga = h.coordinator.retry_compensation(order_id).await.unwrap();
    assert!(saga.applied_log().is_fully_compensated());
    assert_eq!(h.stock("1").await, 10);
}

#[tokio::test]
async fn test_spawned_retry_compensation_outlives_caller() {
    let (h, order_id) = failed_saga_with_slow_retry().await;

    drop(h.coordinator.spawn_retry_compensation(order_id));
    h.coordinator.drain().await;

    assert_eq!(h.stock("1").await, 10);
    let saga = h.coordinator.get_saga(order_id).await.unwrap().unwrap();
    assert!(saga.applied_log().is_fully_compensated());
    assert!(!saga.has_unresolved_anomalies());
}

#[tokio::test]
async fn test_cancellation_stops_reserving_and_compensates() {
    let h = TestHarness::new(&[("1", 10), ("2", 20)]);
    let cancel = CancellationToken::new();
    h.inventory.cancel_after_decrement_of("1", cancel.clone());

    let err = h
        .coordinator
        .spawn_create_order(
            UserId::new("alice"),
            vec![LineItem::new("1", 3), LineItem::new("2", 4)],
            cancel,
        )
        .await
        .unwrap()
        .unwrap_err();

    assert!(matches!(err, SagaError::Cancelled));
    assert_eq!(h.stock("1").await, 10);
    assert_eq!(h.stock("2").await, 20);
    assert!(!h.inventory.calls().contains(&InventoryCall::TryDecrement {
        product_id: ProductId::new("2"),
        quantity: 4
    }));
    assert_eq!(h.only_order().await.status(), OrderStatus::Failed);
}

#[tokio::test]
async fn test_dropped_request_still_finishes_saga() {
    let h = TestHarness::new(&[("1", 10)]);
    let cancel = CancellationToken::new();

    let handle = {
        let _guard = cancel.clone().drop_guard();
        h.coordinator
            .spawn_create_order(UserId::guest(), vec![LineItem::new("1", 2)], cancel.clone())
    };

    // Whether the saga saw the cancellation or not, it reaches a terminal state
    let result = handle.await.unwrap();
    match result {
        Ok(_) => assert_eq!(h.stock("1").await, 8),
        Err(err) => {
            assert!(matches!(err, SagaError::Cancelled));
            assert_eq!(h.stock("1").await, 10);
        }
    }
    assert!(h.only_order().await.status().is_terminal());
}

#[tokio::test]
async fn test_saga_history_is_journaled_in_order() {
    let h = TestHarness::new(&[("1", 10), ("2", 20)]);

    h.place(&[("1", 5), ("2", 25)]).await.unwrap_err();
    let order = h.only_order().await;

    let types: Vec<_> = h
        .journal
        .events_for(order.id())
        .await
        .unwrap()
        .iter()
        .map(SagaEvent::event_type)
        .collect();
    assert_eq!(
        types,
        vec![
            "SagaStarted",
            "ItemReserved",
            "ReservationFailed",
            "CompensationStarted",
            "ItemCompensated",
            "SagaFailed",
        ]
    );
}

#[tokio::test]
async fn test_file_journal_keeps_anomalies_across_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("saga.jsonl");
    let inventory = RecordingInventory::new(InMemoryInventoryStore::with_stock([
        ("1", 10),
        ("2", 20),
    ]));
    let orders = InMemoryOrderRepository::new();
    inventory.reject_increments_for("1");

    let order_id = {
        let journal = FileSagaJournal::open(&path).await.unwrap();
        let coordinator = SagaCoordinator::new(inventory.clone(), orders.clone(), journal)
            .with_retry_policy(fast_retry(1));
        coordinator
            .create_order(
                UserId::guest(),
                vec![LineItem::new("1", 5), LineItem::new("2", 25)],
            )
            .await
            .unwrap_err();
        let failed = orders.list(OrderFilter::all()).await.unwrap();
        failed[0].id()
    };

    let journal = FileSagaJournal::open(&path).await.unwrap();
    let anomalies = journal.anomalies().await.unwrap();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].0, order_id);

    inventory.heal_increments();
    let coordinator = SagaCoordinator::new(inventory.clone(), orders, journal);
    let saga = coordinator.retry_compensation(order_id).await.unwrap();
    assert!(saga.applied_log().is_fully_compensated());
    assert_eq!(
        inventory.get(&ProductId::new("1")).await.unwrap().stock,
        10
    );
}
