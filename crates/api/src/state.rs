//! Shared application state.

use std::sync::Arc;

use inventory::{HttpInventoryClient, InMemoryInventoryStore, InventoryStore};
use orders::InMemoryOrderRepository;
use saga::{FileSagaJournal, InMemorySagaJournal, RetryPolicy, SagaCoordinator, SagaJournal};

use crate::config::Config;
use crate::error::StartupError;

/// Stock the in-process inventory starts with.
pub const DEFAULT_STOCK: [(&str, u64); 2] = [("1", 10), ("2", 20)];

/// The coordinator as wired by the server: inventory and journal are chosen
/// at startup from configuration.
pub type Coordinator =
    SagaCoordinator<Arc<dyn InventoryStore>, InMemoryOrderRepository, Arc<dyn SagaJournal>>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    /// Set when this process owns the inventory and serves its routes.
    pub local_inventory: Option<InMemoryInventoryStore>,
}

impl AppState {
    /// Builds state from configuration: remote or in-process inventory,
    /// file or in-memory journal.
    pub async fn from_config(config: &Config) -> Result<Self, StartupError> {
        let (inventory, local_inventory) = match config.inventory_service_url {
            Some(ref url) => {
                let client = HttpInventoryClient::new(url.as_str(), config.inventory_timeout)?;
                tracing::info!(url = %client.base_url(), "using remote inventory service");
                let inventory: Arc<dyn InventoryStore> = Arc::new(client);
                (inventory, None)
            }
            None => {
                let store = InMemoryInventoryStore::with_stock(DEFAULT_STOCK);
                tracing::info!(products = DEFAULT_STOCK.len(), "using in-process inventory");
                let inventory: Arc<dyn InventoryStore> = Arc::new(store.clone());
                (inventory, Some(store))
            }
        };

        let journal: Arc<dyn SagaJournal> = match config.saga_journal_path {
            Some(ref path) => Arc::new(FileSagaJournal::open(path).await?),
            None => Arc::new(InMemorySagaJournal::new()),
        };

        Ok(Self::new(
            inventory,
            local_inventory,
            journal,
            config.retry_policy(),
        ))
    }

    /// In-process inventory seeded with [`DEFAULT_STOCK`] and an in-memory journal.
    pub fn in_memory() -> Self {
        Self::with_inventory(InMemoryInventoryStore::with_stock(DEFAULT_STOCK))
    }

    /// In-process state around an existing store.
    pub fn with_inventory(store: InMemoryInventoryStore) -> Self {
        Self::new(
            Arc::new(store.clone()),
            Some(store),
            Arc::new(InMemorySagaJournal::new()),
            RetryPolicy::default(),
        )
    }

    pub fn new(
        inventory: Arc<dyn InventoryStore>,
        local_inventory: Option<InMemoryInventoryStore>,
        journal: Arc<dyn SagaJournal>,
        retry_policy: RetryPolicy,
    ) -> Self {
        let coordinator = SagaCoordinator::new(inventory, InMemoryOrderRepository::new(), journal)
            .with_retry_policy(retry_policy);
        Self {
            coordinator: Arc::new(coordinator),
            local_inventory,
        }
    }
}
