//! Active-order registry.
//!
//! Maps broker-assigned order ids to live orders. The dispatch side is the
//! only mutator; the polling side reads snapshots to decide which remote
//! orders are worth reconciling, so snapshot reads must be atomic with
//! respect to individual register/unregister calls. A read-write lock around
//! the map provides exactly that.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

use crate::models::{BrokerOrderId, Order};

/// Registry of live orders keyed by broker order id.
///
/// Register/unregister preconditions are enforced with panics: violating
/// them means the engine lost track of its own bookkeeping, which is never
/// recoverable by retrying.
#[derive(Debug, Default)]
pub struct OrderRegistry {
    orders: RwLock<HashMap<BrokerOrderId, Order>>,
}

impl OrderRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an order under its broker id.
    ///
    /// # Panics
    ///
    /// Panics if the order has no broker id yet, or the id is already
    /// registered.
    pub fn register(&self, order: Order) {
        let Some(id) = order.broker_order_id().cloned() else {
            panic!("cannot register order {} without a broker id", order.id());
        };
        let mut orders = self.orders.write();
        assert!(
            !orders.contains_key(&id),
            "broker order id {id} is already registered"
        );
        orders.insert(id, order);
    }

    /// Remove and return the order registered under `id`.
    ///
    /// # Panics
    ///
    /// Panics if the id is not registered.
    pub fn unregister(&self, id: &BrokerOrderId) -> Order {
        match self.orders.write().remove(id) {
            Some(order) => order,
            None => panic!("broker order id {id} is not registered"),
        }
    }

    /// Whether `id` is currently registered.
    #[must_use]
    pub fn contains(&self, id: &BrokerOrderId) -> bool {
        self.orders.read().contains_key(id)
    }

    /// Atomic snapshot of all registered orders.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Order> {
        self.orders.read().values().cloned().collect()
    }

    /// Atomic snapshot of the registered broker ids.
    #[must_use]
    pub fn active_ids(&self) -> HashSet<BrokerOrderId> {
        self.orders.read().keys().cloned().collect()
    }

    /// Run `f` against the order registered under `id`, holding the write
    /// lock for the duration. Returns `None` when the id is not registered.
    pub fn modify<F, R>(&self, id: &BrokerOrderId, f: F) -> Option<R>
    where
        F: FnOnce(&mut Order) -> R,
    {
        self.orders.write().get_mut(id).map(f)
    }

    /// Number of registered orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.read().len()
    }

    /// Whether no orders are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.read().is_empty()
    }
}
