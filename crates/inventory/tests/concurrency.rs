//! Concurrency tests for the in-memory inventory store.

use futures_util::future::join_all;
use inventory::{InMemoryInventoryStore, InventoryError, InventoryStore, ProductId};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_decrements_never_oversell() {
    let store = InMemoryInventoryStore::with_stock([("1", 100)]);
    let product = ProductId::new("1");

    // 150 tasks each asking for one unit: exactly 100 may succeed.
    let tasks = (0..150).map(|_| {
        let store = store.clone();
        let product = product.clone();
        tokio::spawn(async move { store.try_decrement(&product, 1).await })
    });

    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let refused = results
        .iter()
        .filter(|r| matches!(r, Err(InventoryError::InsufficientStock { .. })))
        .count();

    assert_eq!(succeeded, 100);
    assert_eq!(refused, 50);
    assert_eq!(store.get(&product).await.unwrap().stock, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mixed_decrements_and_increments_balance() {
    let store = InMemoryInventoryStore::with_stock([("1", 50)]);
    let product = ProductId::new("1");

    let tasks = (0..50).map(|_| {
        let store = store.clone();
        let product = product.clone();
        tokio::spawn(async move {
            store.try_decrement(&product, 1).await.unwrap();
            store.increment(&product, 1).await.unwrap();
        })
    });

    for joined in join_all(tasks).await {
        joined.unwrap();
    }

    assert_eq!(store.get(&product).await.unwrap().stock, 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_products_are_independent() {
    let store = InMemoryInventoryStore::with_stock([("1", 10), ("2", 10)]);

    let tasks = (0..20).map(|i| {
        let store = store.clone();
        let product = ProductId::new(if i % 2 == 0 { "1" } else { "2" });
        tokio::spawn(async move { store.try_decrement(&product, 1).await })
    });

    for joined in join_all(tasks).await {
        joined.unwrap().unwrap();
    }

    assert_eq!(store.get(&ProductId::new("1")).await.unwrap().stock, 0);
    assert_eq!(store.get(&ProductId::new("2")).await.unwrap().stock, 0);
}
