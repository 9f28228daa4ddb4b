//! In-process TransferStore with the same locking contract as the Postgres one.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::domain::{TransferFilter, TransferRecord};
use crate::ports::{StoreError, StoreResult, TransferLock, TransferStore};

struct Slot {
    record: TransferRecord,
    gate: Arc<Mutex<()>>,
}

type Slots = Arc<RwLock<HashMap<Uuid, Slot>>>;

#[derive(Clone, Default)]
pub struct InMemoryTransferStore {
    slots: Slots,
}

impl InMemoryTransferStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransferStore for InMemoryTransferStore {
    async fn insert(&self, record: &TransferRecord) -> StoreResult<TransferRecord> {
        let mut slots = self.slots.write().await;
        slots.insert(
            record.id,
            Slot {
                record: record.clone(),
                gate: Arc::new(Mutex::new(())),
            },
        );
        Ok(record.clone())
    }

    async fn get(&self, id: Uuid) -> StoreResult<TransferRecord> {
        self.slots
            .read()
            .await
            .get(&id)
            .map(|slot| slot.record.clone())
            .ok_or(StoreError::NotFound(id))
    }

    async fn list(&self, filter: &TransferFilter) -> StoreResult<Vec<TransferRecord>> {
        let slots = self.slots.read().await;
        let mut records: Vec<TransferRecord> = slots
            .values()
            .filter(|slot| filter.matches(&slot.record))
            .map(|slot| slot.record.clone())
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn lock(&self, id: Uuid) -> StoreResult<Box<dyn TransferLock>> {
        let gate = {
            let slots = self.slots.read().await;
            let slot = slots.get(&id).ok_or(StoreError::NotFound(id))?;
            slot.gate.clone()
        };

        let guard = gate.lock_owned().await;

        // the previous holder may have changed or deleted the record
        let record = self.get(id).await?;

        Ok(Box::new(InMemoryTransferLock {
            slots: self.slots.clone(),
            record,
            guard: Some(guard),
        }))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

struct InMemoryTransferLock {
    slots: Slots,
    record: TransferRecord,
    guard: Option<OwnedMutexGuard<()>>,
}

#[async_trait]
impl TransferLock for InMemoryTransferLock {
    fn record(&self) -> &TransferRecord {
        &self.record
    }

    async fn commit(&mut self, mut next: TransferRecord) -> StoreResult<TransferRecord> {
        self.record
            .check_frozen_fields(&next)
            .map_err(StoreError::Frozen)?;
        let guard = self.guard.take().ok_or(StoreError::Released)?;
        next.id = self.record.id;
        next.updated_at = Utc::now();

        {
            let mut slots = self.slots.write().await;
            let slot = slots
                .get_mut(&self.record.id)
                .ok_or(StoreError::NotFound(self.record.id))?;
            slot.record = next.clone();
        }

        drop(guard);
        self.record = next;
        Ok(self.record.clone())
    }

    async fn delete(&mut self) -> StoreResult<()> {
        let guard = self.guard.take().ok_or(StoreError::Released)?;
        self.slots.write().await.remove(&self.record.id);
        drop(guard);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LifecycleStatus;
    use bigdecimal::BigDecimal;
    use std::time::Duration;

    fn record(source: &str) -> TransferRecord {
        TransferRecord::new_pending(
            source.to_string(),
            "destination".to_string(),
            BigDecimal::from(1),
            "hash".to_string(),
            BigDecimal::from(0),
            "devnet".to_string(),
        )
    }

    #[tokio::test]
    async fn get_missing_record_is_not_found() {
        let store = InMemoryTransferStore::new();
        let id = Uuid::new_v4();
        assert!(matches!(store.get(id).await, Err(StoreError::NotFound(missing)) if missing == id));
        assert!(matches!(store.lock(id).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn list_filters_and_orders_newest_first() {
        let store = InMemoryTransferStore::new();
        let mut older = record("alice");
        older.created_at = Utc::now() - chrono::Duration::minutes(5);
        let newer = record("alice");
        let other = record("bob");
        store.insert(&older).await.unwrap();
        store.insert(&newer).await.unwrap();
        store.insert(&other).await.unwrap();

        let filter = TransferFilter {
            source_address: Some("alice".to_string()),
            ..TransferFilter::default()
        };
        let listed = store.list(&filter).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, newer.id);
        assert_eq!(listed[1].id, older.id);
    }

    #[tokio::test]
    async fn commit_persists_and_releases() {
        let store = InMemoryTransferStore::new();
        let r = record("alice");
        store.insert(&r).await.unwrap();

        let mut lock = store.lock(r.id).await.unwrap();
        let mut next = lock.record().clone();
        next.lifecycle_status = LifecycleStatus::Cancelled;
        lock.commit(next).await.unwrap();

        assert_eq!(
            store.get(r.id).await.unwrap().lifecycle_status,
            LifecycleStatus::Cancelled
        );
        // released, so it can be taken again
        let again = store.lock(r.id).await.unwrap();
        assert_eq!(again.record().lifecycle_status, LifecycleStatus::Cancelled);
    }

    #[tokio::test]
    async fn second_lock_waits_for_first() {
        let store = InMemoryTransferStore::new();
        let r = record("alice");
        store.insert(&r).await.unwrap();

        let first = store.lock(r.id).await.unwrap();
        let waiting = tokio::time::timeout(Duration::from_millis(50), store.lock(r.id)).await;
        assert!(waiting.is_err());

        drop(first);
        assert!(store.lock(r.id).await.is_ok());
    }

    #[tokio::test]
    async fn delete_removes_record_and_releases_lock() {
        let store = InMemoryTransferStore::new();
        let r = record("alice");
        store.insert(&r).await.unwrap();

        let mut lock = store.lock(r.id).await.unwrap();
        lock.delete().await.unwrap();
        assert!(matches!(lock.delete().await, Err(StoreError::Released)));
        assert!(matches!(store.get(r.id).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn commit_rejects_changes_to_signed_fields() {
        let store = InMemoryTransferStore::new();
        let mut r = record("alice");
        r.mark_submitted("sig".to_string());
        store.insert(&r).await.unwrap();

        let mut lock = store.lock(r.id).await.unwrap();
        let mut next = lock.record().clone();
        next.amount = BigDecimal::from(2);
        assert!(matches!(lock.commit(next).await, Err(StoreError::Frozen(_))));
        assert_eq!(store.get(r.id).await.unwrap().amount, BigDecimal::from(1));
    }
}
