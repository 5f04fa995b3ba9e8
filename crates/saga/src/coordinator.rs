//! Saga coordinator for order placement.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use common::{OrderId, UserId};
use inventory::{InventoryError, InventoryStore};
use orders::{LineItem, Order, OrderRepository};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::aggregate::SagaInstance;
use crate::error::SagaError;
use crate::events::SagaEvent;
use crate::journal::SagaJournal;
use crate::retry::{RetryPolicy, retry_with_predicate};
use crate::state::SagaState;

/// Places orders by decrementing stock item by item, undoing applied
/// decrements in reverse order when any step fails.
///
/// The coordinator holds no lock across a saga; correctness rests on the
/// inventory's per-product atomicity. Every event is journaled before it is
/// applied to the in-memory [`SagaInstance`].
pub struct SagaCoordinator<I, R, J>
where
    I: InventoryStore,
    R: OrderRepository,
    J: SagaJournal,
{
    inventory: I,
    orders: R,
    journal: J,
    retry_policy: RetryPolicy,
    /// Orders whose operator-triggered compensation is running.
    compensating: Mutex<HashSet<OrderId>>,
    /// Sagas and compensation retries detached from their callers.
    tasks: TaskTracker,
}

impl<I, R, J> SagaCoordinator<I, R, J>
where
    I: InventoryStore,
    R: OrderRepository,
    J: SagaJournal,
{
    /// Creates a coordinator with the default compensation retry policy.
    pub fn new(inventory: I, orders: R, journal: J) -> Self {
        Self {
            inventory,
            orders,
            journal,
            retry_policy: RetryPolicy::default(),
            compensating: Mutex::new(HashSet::new()),
            tasks: TaskTracker::new(),
        }
    }

    /// Sets the retry policy for compensating increments.
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn inventory(&self) -> &I {
        &self.inventory
    }

    pub fn orders(&self) -> &R {
        &self.orders
    }

    pub fn journal(&self) -> &J {
        &self.journal
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Places an order for `items` on behalf of `user_id`.
    ///
    /// Returns the Confirmed order, or the failure that stopped the forward
    /// phase after every applied decrement has been compensated.
    pub async fn create_order(
        &self,
        user_id: UserId,
        items: Vec<LineItem>,
    ) -> Result<Order, SagaError> {
        self.create_order_with_cancellation(user_id, items, &CancellationToken::new())
            .await
    }

    /// Like [`create_order`](Self::create_order), but stops reserving once
    /// `cancel` fires. Compensation runs to completion regardless.
    #[tracing::instrument(skip(self, user_id, items, cancel), fields(%user_id, items = items.len()))]
    pub async fn create_order_with_cancellation(
        &self,
        user_id: UserId,
        items: Vec<LineItem>,
        cancel: &CancellationToken,
    ) -> Result<Order, SagaError> {
        let quantities = validate(&items)?;

        metrics::counter!("saga_executions_total").increment(1);
        let saga_start = Instant::now();

        let order = Order::pending(user_id.clone(), items.clone());
        let order_id = order.id();
        let mut saga = SagaInstance::default();
        self.record(
            order_id,
            &mut saga,
            SagaEvent::saga_started(order_id, user_id, items.clone()),
        )
        .await;

        for (item, quantity) in items.iter().zip(quantities) {
            if cancel.is_cancelled() {
                tracing::info!(%order_id, reserved = saga.applied_log().len(), "saga cancelled");
                self.record(
                    order_id,
                    &mut saga,
                    SagaEvent::reservation_failed(None, SagaError::Cancelled.to_string()),
                )
                .await;
                return Err(self
                    .fail(&mut saga, order, SagaError::Cancelled, saga_start)
                    .await);
            }

            match self.inventory.try_decrement(&item.product_id, quantity).await {
                Ok(record) => {
                    let sequence = saga.applied_log().len();
                    tracing::debug!(
                        %order_id,
                        product_id = %item.product_id,
                        quantity,
                        remaining = record.stock,
                        "item reserved"
                    );
                    self.record(
                        order_id,
                        &mut saga,
                        SagaEvent::item_reserved(
                            sequence,
                            item.product_id.clone(),
                            quantity,
                            record.stock,
                        ),
                    )
                    .await;
                }
                Err(err) => {
                    let err = SagaError::from_inventory(&item.product_id, err);
                    tracing::warn!(
                        %order_id,
                        product_id = %item.product_id,
                        error = %err,
                        "reservation failed"
                    );
                    self.record(
                        order_id,
                        &mut saga,
                        SagaEvent::reservation_failed(
                            Some(item.product_id.clone()),
                            err.to_string(),
                        ),
                    )
                    .await;
                    return Err(self.fail(&mut saga, order, err, saga_start).await);
                }
            }
        }

        let mut confirmed = order.clone();
        let persisted = match confirmed.confirm() {
            Ok(()) => self.orders.save(confirmed.clone()).await,
            Err(err) => Err(err),
        };
        if let Err(err) = persisted {
            tracing::error!(%order_id, error = %err, "failed to persist confirmed order");
            return Err(self
                .fail(&mut saga, order, SagaError::Order(err), saga_start)
                .await);
        }

        self.record(order_id, &mut saga, SagaEvent::order_confirmed())
            .await;

        let duration = saga_start.elapsed().as_secs_f64();
        metrics::histogram!("saga_duration_seconds").record(duration);
        metrics::counter!("saga_confirmed_total").increment(1);
        tracing::info!(%order_id, duration, "order confirmed");

        Ok(confirmed)
    }

    /// Compensates, records the Failed audit order and returns `err`.
    async fn fail(
        &self,
        saga: &mut SagaInstance,
        mut order: Order,
        err: SagaError,
        saga_start: Instant,
    ) -> SagaError {
        let order_id = order.id();
        let reason = err.to_string();

        self.compensate(order_id, saga, &reason).await;

        match order.fail(&reason) {
            Ok(()) => {
                if let Err(save_err) = self.orders.save(order).await {
                    tracing::error!(%order_id, error = %save_err, "failed to persist failed order");
                }
            }
            Err(transition_err) => {
                tracing::error!(%order_id, error = %transition_err, "failed to mark order failed");
            }
        }

        self.record(order_id, saga, SagaEvent::saga_failed(reason.clone()))
            .await;

        metrics::histogram!("saga_duration_seconds").record(saga_start.elapsed().as_secs_f64());
        metrics::counter!("saga_failed_total").increment(1);
        tracing::warn!(%order_id, %reason, "saga failed");

        err
    }

    /// Undoes every outstanding applied decrement, newest first.
    ///
    /// Each increment is retried on transient errors. An increment that
    /// still fails is recorded as a compensation anomaly and the walk
    /// continues with the next entry.
    #[tracing::instrument(skip(self, saga, reason))]
    async fn compensate(&self, order_id: OrderId, saga: &mut SagaInstance, reason: &str) {
        let pending = saga.outstanding_compensations();

        self.record(
            order_id,
            saga,
            SagaEvent::compensation_started(reason, pending.len()),
        )
        .await;
        metrics::counter!("saga_compensations_total").increment(1);

        for step in pending {
            let mut attempts = 0;
            let result = retry_with_predicate(
                &self.retry_policy,
                || {
                    attempts += 1;
                    self.inventory.increment(&step.product_id, step.quantity)
                },
                InventoryError::is_transient,
            )
            .await;

            match result {
                Ok(record) => {
                    tracing::debug!(
                        %order_id,
                        product_id = %step.product_id,
                        quantity = step.quantity,
                        restored = record.stock,
                        attempts,
                        "decrement compensated"
                    );
                    self.record(
                        order_id,
                        saga,
                        SagaEvent::item_compensated(
                            step.sequence,
                            step.product_id,
                            step.quantity,
                            attempts,
                        ),
                    )
                    .await;
                }
                Err(err) => {
                    metrics::counter!("saga_compensation_anomalies_total").increment(1);
                    tracing::error!(
                        %order_id,
                        product_id = %step.product_id,
                        quantity = step.quantity,
                        attempts,
                        error = %err,
                        "compensation anomaly: stock left under-counted"
                    );
                    self.record(
                        order_id,
                        saga,
                        SagaEvent::compensation_anomaly(
                            step.sequence,
                            step.product_id,
                            step.quantity,
                            attempts,
                            err.to_string(),
                        ),
                    )
                    .await;
                }
            }
        }
    }

    /// Journals an event, then applies it to the saga.
    ///
    /// A journal failure is logged and counted but does not stop the saga.
    async fn record(&self, order_id: OrderId, saga: &mut SagaInstance, event: SagaEvent) {
        if let Err(err) = self.journal.append(order_id, &event).await {
            metrics::counter!("saga_journal_errors_total").increment(1);
            tracing::error!(
                %order_id,
                event_type = event.event_type(),
                error = %err,
                "failed to journal saga event"
            );
        }
        saga.apply(event);
    }

    /// Loads a saga instance by replaying its journal.
    pub async fn get_saga(&self, order_id: OrderId) -> Result<Option<SagaInstance>, SagaError> {
        let events = self.journal.events_for(order_id).await?;
        Ok(SagaInstance::from_events(events))
    }

    /// Re-runs outstanding compensations for a Failed saga.
    ///
    /// Entries already compensated are skipped, so calling this repeatedly
    /// never increments a product twice for the same decrement. Returns the
    /// saga as it stands afterwards.
    #[tracing::instrument(skip(self))]
    ///
    /// Dropping the returned future releases the order for the next retry,
    /// but may leave an applied increment unjournaled. Callers that can be
    /// cancelled should use [`spawn_retry_compensation`](Self::spawn_retry_compensation).
    pub async fn retry_compensation(&self, order_id: OrderId) -> Result<SagaInstance, SagaError> {
        // Load under the guard: a concurrent retry may have just compensated.
        let _guard = CompensationGuard::acquire(&self.compensating, order_id)
            .ok_or(SagaError::CompensationInProgress(order_id))?;

        self.compensate_outstanding(order_id).await
    }

    async fn compensate_outstanding(&self, order_id: OrderId) -> Result<SagaInstance, SagaError> {
        let mut saga = self
            .get_saga(order_id)
            .await?
            .ok_or(SagaError::SagaNotFound(order_id))?;

        if saga.state() != SagaState::Failed {
            return Err(SagaError::InvalidState {
                expected: SagaState::Failed.to_string(),
                actual: saga.state(),
            });
        }

        let outstanding = saga.applied_log().outstanding_count();
        if outstanding > 0 {
            tracing::info!(%order_id, outstanding, "retrying compensation");
            let reason = saga.failure_reason().unwrap_or("compensation retry").to_string();
            self.compensate(order_id, &mut saga, &reason).await;
            self.record(order_id, &mut saga, SagaEvent::saga_failed(reason))
                .await;
        }

        Ok(saga)
    }
}

impl<I, R, J> SagaCoordinator<I, R, J>
where
    I: InventoryStore + 'static,
    R: OrderRepository + 'static,
    J: SagaJournal + 'static,
{
    /// Runs the saga on its own task so that dropping the caller's future
    /// cannot interrupt compensation. Cancel `cancel` to stop reserving.
    pub fn spawn_create_order(
        self: &Arc<Self>,
        user_id: UserId,
        items: Vec<LineItem>,
        cancel: CancellationToken,
    ) -> JoinHandle<Result<Order, SagaError>> {
        let coordinator = Arc::clone(self);
        self.tasks.spawn(async move {
            coordinator
                .create_order_with_cancellation(user_id, items, &cancel)
                .await
        })
    }

    /// Runs [`retry_compensation`](Self::retry_compensation) on its own task,
    /// so a dropped caller cannot interrupt it between an increment and its
    /// journal entry.
    pub fn spawn_retry_compensation(
        self: &Arc<Self>,
        order_id: OrderId,
    ) -> JoinHandle<Result<SagaInstance, SagaError>> {
        let coordinator = Arc::clone(self);
        self.tasks
            .spawn(async move { coordinator.retry_compensation(order_id).await })
    }

    /// Waits for every spawned saga to finish. Sagas spawned afterwards are
    /// still run but no longer awaited.
    pub async fn drain(&self) {
        self.tasks.close();
        tracing::info!(in_flight = self.tasks.len(), "waiting for in-flight sagas");
        self.tasks.wait().await;
    }
}

/// Marks an order as having a compensation retry in flight until dropped.
struct CompensationGuard<'a> {
    in_flight: &'a Mutex<HashSet<OrderId>>,
    order_id: OrderId,
}

impl<'a> CompensationGuard<'a> {
    /// Returns `None` if a retry for `order_id` is already running.
    fn acquire(in_flight: &'a Mutex<HashSet<OrderId>>, order_id: OrderId) -> Option<Self> {
        let inserted = in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(order_id);
        inserted.then_some(Self { in_flight, order_id })
    }
}

impl Drop for CompensationGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.order_id);
    }
}

/// Rejects empty carts and non-positive quantities before any side effect.
fn validate(items: &[LineItem]) -> Result<Vec<u64>, SagaError> {
    if items.is_empty() {
        return Err(SagaError::EmptyCart);
    }
    items
        .iter()
        .map(|item| match u64::try_from(item.quantity) {
            Ok(quantity) if quantity > 0 => Ok(quantity),
            _ => Err(SagaError::InvalidQuantity {
                product_id: item.product_id.clone(),
                quantity: item.quantity,
            }),
        })
        .collect()
}
