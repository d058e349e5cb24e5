use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

use super::{CursorStore, OrderId, OrderStatus, OrderStore, PendingOrder, StoreError};

#[derive(Debug, Clone)]
struct OrderRecord {
    order: PendingOrder,
    notes: Vec<String>,
}

/// In-process order store
#[derive(Default)]
pub struct MemoryOrderStore {
    orders: RwLock<BTreeMap<OrderId, OrderRecord>>,
    /// Orders whose writes fail with `Unavailable`
    failing: RwLock<HashSet<OrderId>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, order: PendingOrder) {
        self.orders.write().await.insert(
            order.id,
            OrderRecord {
                order,
                notes: Vec::new(),
            },
        );
    }

    pub async fn status(&self, id: OrderId) -> Option<OrderStatus> {
        self.orders.read().await.get(&id).map(|r| r.order.status)
    }

    pub async fn notes(&self, id: OrderId) -> Vec<String> {
        self.orders
            .read()
            .await
            .get(&id)
            .map(|r| r.notes.clone())
            .unwrap_or_default()
    }

    /// Make every write to `id` fail, simulating a store outage for one order
    pub async fn fail_writes_for(&self, id: OrderId) {
        self.failing.write().await.insert(id);
    }

    pub async fn restore_writes_for(&self, id: OrderId) {
        self.failing.write().await.remove(&id);
    }

    async fn transition(
        &self,
        id: OrderId,
        to: OrderStatus,
        note: &str,
    ) -> Result<bool, StoreError> {
        if self.failing.read().await.contains(&id) {
            return Err(StoreError::Unavailable(format!("writes to order {} fail", id)));
        }

        let mut orders = self.orders.write().await;
        let record = orders.get_mut(&id).ok_or(StoreError::OrderNotFound(id))?;
        if record.order.status != OrderStatus::Pending {
            return Ok(false);
        }
        record.order.status = to;
        record.notes.push(note.to_string());
        Ok(true)
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn list_pending(&self, window: chrono::Duration) -> Result<Vec<OrderId>, StoreError> {
        let since = Utc::now() - window;
        Ok(self
            .orders
            .read()
            .await
            .values()
            .filter(|r| r.order.status == OrderStatus::Pending && r.order.created_at >= since)
            .map(|r| r.order.id)
            .collect())
    }

    async fn get(&self, id: OrderId) -> Result<Option<PendingOrder>, StoreError> {
        Ok(self.orders.read().await.get(&id).map(|r| r.order.clone()))
    }

    async fn mark_paid(&self, id: OrderId, note: &str) -> Result<bool, StoreError> {
        self.transition(id, OrderStatus::Paid, note).await
    }

    async fn mark_on_hold(&self, id: OrderId, note: &str) -> Result<bool, StoreError> {
        self.transition(id, OrderStatus::OnHold, note).await
    }
}

/// In-process cursor store
#[derive(Default)]
pub struct MemoryCursorStore {
    values: RwLock<HashMap<String, i64>>,
    /// Number of successful `set` calls
    writes: RwLock<usize>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_value(key: &str, ledger_index: i64) -> Self {
        let store = Self::new();
        store.values.write().await.insert(key.to_string(), ledger_index);
        store
    }

    pub async fn writes(&self) -> usize {
        *self.writes.read().await
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        Ok(self.values.read().await.get(key).copied())
    }

    async fn set(&self, key: &str, ledger_index: i64) -> Result<(), StoreError> {
        let mut values = self.values.write().await;
        let slot = values.entry(key.to_string()).or_insert(ledger_index);
        *slot = (*slot).max(ledger_index);
        *self.writes.write().await += 1;
        Ok(())
    }
}
