//! # In-Memory Store
//!
//! A [`TransactionalStore`] that reproduces the PostgreSQL behaviour the
//! allocator depends on, for tests and the load generator.
//!
//! ## Semantics Mirrored
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PostgreSQL                          MemoryStore                        │
//! │  ───────────────────────────────     ─────────────────────────────────  │
//! │  pg_advisory_xact_lock(id)           tokio Mutex per id, owned guard    │
//! │    re-entrant within a tx              held in the transaction          │
//! │    released at COMMIT/ROLLBACK         dropped with the transaction     │
//! │  lock_timeout                        tokio::time::timeout               │
//! │                                                                         │
//! │  CREATE SEQUENCE in its own          counter published when creation    │
//! │    committed transaction               returns, kept on rollback        │
//! │  concurrent in-flight CREATE         UniqueViolation                    │
//! │                                                                         │
//! │  nextval (NOT transactional)         AtomicI64 shared by all txs        │
//! │                                                                         │
//! │  UNIQUE (terminal, receipt_number)   checked at commit                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! One simplification: PostgreSQL makes a second concurrent creator wait for
//! the first and only fails it if the first commits. Here the second creator
//! fails immediately.
//!
//! Key locks live in a map keyed by lock id. An entry is removed as soon as
//! no transaction holds or waits for it.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use receipt_core::{Payment, ReceiptScope, Sale, SaleItem, SequenceKey};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

use super::{SaleTransaction, TransactionalStore};
use crate::allocator::CounterTransaction;
use crate::error::{DbError, DbResult};

/// Default time a transaction waits for a key lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Store
// =============================================================================

/// Shared in-memory database. Clones share state.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    available: AtomicBool,
    lock_timeout: Duration,
    next_tx_id: AtomicU64,
    locks: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    counters: HashMap<SequenceKey, Arc<AtomicI64>>,
    /// Counters whose creation is in flight, by creating tx id.
    creating: HashMap<SequenceKey, u64>,
    sales: Vec<Sale>,
    receipt_index: HashSet<(ReceiptScope, String)>,
    sale_ids: HashSet<Uuid>,
    items: Vec<SaleItem>,
    payments: Vec<Payment>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// A store whose key locks give up after `lock_timeout`.
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        MemoryStore {
            inner: Arc::new(Inner {
                available: AtomicBool::new(true),
                lock_timeout,
                next_tx_id: AtomicU64::new(1),
                locks: Mutex::new(HashMap::new()),
                state: Mutex::new(State::default()),
            }),
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        self.inner.lock_timeout
    }

    /// Simulates losing (or regaining) the database.
    ///
    /// While unavailable every operation, including commit, fails with
    /// `StorageUnavailable`.
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Last value handed out by the counter for `key`.
    ///
    /// `None` if the counter was never created.
    pub fn counter_value(&self, key: &SequenceKey) -> Option<i64> {
        self.inner
            .state
            .lock()
            .counters
            .get(key)
            .map(|counter| counter.load(Ordering::SeqCst))
    }

    /// Number of counters created so far.
    pub fn counter_count(&self) -> usize {
        self.inner.state.lock().counters.len()
    }

    /// Committed sales in commit order.
    pub fn sales(&self) -> Vec<Sale> {
        self.inner.state.lock().sales.clone()
    }

    pub fn sale_items(&self) -> Vec<SaleItem> {
        self.inner.state.lock().items.clone()
    }

    pub fn payments(&self) -> Vec<Payment> {
        self.inner.state.lock().payments.clone()
    }
}

impl Inner {
    fn ensure_available(&self) -> DbResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DbError::StorageUnavailable("memory store is offline".to_string()))
        }
    }

    fn lock_for(&self, lock_id: i64) -> Arc<AsyncMutex<()>> {
        self.locks
            .lock()
            .entry(lock_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Drops the map entry for `lock_id` once nobody holds or awaits it.
    ///
    /// Every clone is taken under the map lock, so a strong count of one
    /// seen under that lock cannot race with a new waiter.
    fn prune_lock(&self, lock_id: i64) {
        let mut locks = self.locks.lock();
        if locks
            .get(&lock_id)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1)
        {
            locks.remove(&lock_id);
        }
    }
}

#[async_trait]
impl TransactionalStore for MemoryStore {
    type Transaction = MemoryTransaction;

    async fn begin(&self) -> DbResult<MemoryTransaction> {
        self.inner.ensure_available()?;

        Ok(MemoryTransaction {
            id: self.inner.next_tx_id.fetch_add(1, Ordering::SeqCst),
            store: Arc::clone(&self.inner),
            held_locks: HashMap::new(),
            sales: Vec::new(),
            items: Vec::new(),
            payments: Vec::new(),
        })
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// An open memory-store transaction. Dropping it rolls back.
#[derive(Debug)]
pub struct MemoryTransaction {
    id: u64,
    store: Arc<Inner>,
    held_locks: HashMap<i64, OwnedMutexGuard<()>>,
    sales: Vec<Sale>,
    items: Vec<SaleItem>,
    payments: Vec<Payment>,
}

impl MemoryTransaction {
    /// Makes staged rows visible, or fails leaving nothing behind.
    fn publish(&mut self) -> DbResult<()> {
        let mut state = self.store.state.lock();

        let mut seen = HashSet::new();
        for sale in &self.sales {
            let entry = (sale.scope(), sale.receipt_number.as_str().to_string());
            if state.receipt_index.contains(&entry) || !seen.insert(entry) {
                return Err(DbError::duplicate(
                    "sales_terminal_receipt_number_key",
                    sale.receipt_number.as_str(),
                ));
            }
        }

        for sale in self.sales.drain(..) {
            state
                .receipt_index
                .insert((sale.scope(), sale.receipt_number.as_str().to_string()));
            state.sale_ids.insert(sale.id);
            state.sales.push(sale);
        }
        state.items.append(&mut self.items);
        state.payments.append(&mut self.payments);

        Ok(())
    }

    fn sale_exists(&self, sale_id: Uuid) -> bool {
        self.sales.iter().any(|sale| sale.id == sale_id)
            || self.store.state.lock().sale_ids.contains(&sale_id)
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        let id = self.id;
        self.store.state.lock().creating.retain(|_, owner| *owner != id);

        let released: Vec<i64> = self
            .held_locks
            .drain()
            .map(|(lock_id, guard)| {
                drop(guard);
                lock_id
            })
            .collect();
        for lock_id in released {
            self.store.prune_lock(lock_id);
        }
    }
}

#[async_trait]
impl CounterTransaction for MemoryTransaction {
    async fn acquire_xact_lock(&mut self, lock_id: i64) -> DbResult<()> {
        self.store.ensure_available()?;

        if self.held_locks.contains_key(&lock_id) {
            return Ok(());
        }

        let mutex = self.store.lock_for(lock_id);
        let timeout = self.store.lock_timeout;
        let guard = match tokio::time::timeout(timeout, mutex.lock_owned()).await {
            Ok(guard) => guard,
            Err(_) => {
                self.store.prune_lock(lock_id);
                return Err(DbError::LockTimeout(format!(
                    "lock {lock_id} not acquired within {}ms",
                    timeout.as_millis()
                )));
            }
        };

        self.held_locks.insert(lock_id, guard);
        Ok(())
    }

    async fn create_counter_if_absent(&mut self, key: &SequenceKey) -> DbResult<()> {
        self.store.ensure_available()?;

        {
            let mut state = self.store.state.lock();
            if state.counters.contains_key(key) {
                return Ok(());
            }
            if state.creating.contains_key(key) {
                return Err(DbError::duplicate("counter", key.counter_name()));
            }
            state.creating.insert(key.clone(), self.id);
        }

        // DDL round trip: let other transactions run.
        tokio::task::yield_now().await;

        {
            let mut state = self.store.state.lock();
            state.creating.remove(key);
            state
                .counters
                .entry(key.clone())
                .or_insert_with(|| Arc::new(AtomicI64::new(0)));
        }
        debug!(counter = %key.counter_name(), tx = self.id, "Created counter");

        Ok(())
    }

    async fn next_counter_value(&mut self, key: &SequenceKey) -> DbResult<i64> {
        self.store.ensure_available()?;

        let counter = self
            .store
            .state
            .lock()
            .counters
            .get(key)
            .cloned()
            .ok_or_else(|| {
                DbError::QueryFailed(format!(
                    "relation \"{}\" does not exist",
                    key.counter_name()
                ))
            })?;

        Ok(counter.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl SaleTransaction for MemoryTransaction {
    async fn insert_sale(&mut self, sale: &Sale) -> DbResult<()> {
        self.store.ensure_available()?;
        self.sales.push(sale.clone());
        Ok(())
    }

    async fn insert_sale_item(&mut self, item: &SaleItem) -> DbResult<()> {
        self.store.ensure_available()?;
        if !self.sale_exists(item.sale_id) {
            return Err(DbError::ForeignKeyViolation {
                message: format!("sale_items.sale_id {} has no sale", item.sale_id),
            });
        }
        self.items.push(item.clone());
        Ok(())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> DbResult<()> {
        self.store.ensure_available()?;
        if !self.sale_exists(payment.sale_id) {
            return Err(DbError::ForeignKeyViolation {
                message: format!("payments.sale_id {} has no sale", payment.sale_id),
            });
        }
        self.payments.push(payment.clone());
        Ok(())
    }

    async fn commit(mut self) -> DbResult<()> {
        self.store.ensure_available()?;
        self.publish()
    }

    async fn rollback(self) -> DbResult<()> {
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn key(day: u32) -> SequenceKey {
        let date = NaiveDate::from_ymd_opt(2025, 11, day).unwrap();
        SequenceKey::derive(&Uuid::nil(), &Uuid::nil(), &Uuid::nil(), date)
    }

    #[tokio::test]
    async fn test_counter_increments_survive_rollback() {
        let store = MemoryStore::new();
        let key = key(17);

        let mut tx = store.begin().await.unwrap();
        tx.create_counter_if_absent(&key).await.unwrap();
        assert_eq!(tx.next_counter_value(&key).await.unwrap(), 1);
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.next_counter_value(&key).await.unwrap(), 2);
        tx.rollback().await.unwrap();

        assert_eq!(store.counter_value(&key), Some(2));
    }

    #[tokio::test]
    async fn test_counter_creation_survives_rollback() {
        let store = MemoryStore::new();
        let key = key(17);

        let mut tx = store.begin().await.unwrap();
        tx.create_counter_if_absent(&key).await.unwrap();
        assert_eq!(tx.next_counter_value(&key).await.unwrap(), 1);
        drop(tx);

        assert_eq!(store.counter_value(&key), Some(1));

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.next_counter_value(&key).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_missing_counter_is_a_query_error() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let err = tx.next_counter_value(&key(17)).await.unwrap_err();
        assert!(matches!(err, DbError::QueryFailed(_)));
    }

    #[tokio::test]
    async fn test_locks_are_reentrant_and_released_on_drop() {
        let store = MemoryStore::with_lock_timeout(Duration::from_millis(50));

        let mut first = store.begin().await.unwrap();
        first.acquire_xact_lock(7).await.unwrap();
        first.acquire_xact_lock(7).await.unwrap();

        let mut second = store.begin().await.unwrap();
        let err = second.acquire_xact_lock(7).await.unwrap_err();
        assert!(matches!(err, DbError::LockTimeout(_)));
        second.acquire_xact_lock(8).await.unwrap();

        drop(first);
        second.acquire_xact_lock(7).await.unwrap();
    }

    #[tokio::test]
    async fn test_lock_entries_are_pruned_when_released() {
        let store = MemoryStore::with_lock_timeout(Duration::from_millis(20));

        let mut first = store.begin().await.unwrap();
        first.acquire_xact_lock(1).await.unwrap();
        first.acquire_xact_lock(2).await.unwrap();

        let mut second = store.begin().await.unwrap();
        assert!(second.acquire_xact_lock(1).await.is_err());
        assert_eq!(store.inner.locks.lock().len(), 2);

        drop(first);
        assert!(store.inner.locks.lock().is_empty());

        second.acquire_xact_lock(1).await.unwrap();
        second.commit().await.unwrap();
        assert!(store.inner.locks.lock().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_creation_is_a_unique_violation() {
        let store = MemoryStore::new();
        let key = key(17);

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();

        let (created, raced) = tokio::join!(
            first.create_counter_if_absent(&key),
            second.create_counter_if_absent(&key)
        );
        created.unwrap();
        assert!(matches!(raced.unwrap_err(), DbError::UniqueViolation { .. }));

        second.create_counter_if_absent(&key).await.unwrap();
        assert_eq!(second.next_counter_value(&key).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_offline_store_fails_everything() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        store.set_available(false);
        assert!(matches!(
            tx.acquire_xact_lock(1).await.unwrap_err(),
            DbError::StorageUnavailable(_)
        ));
        assert!(matches!(store.begin().await.unwrap_err(), DbError::StorageUnavailable(_)));

        store.set_available(true);
        tx.acquire_xact_lock(1).await.unwrap();
    }
}
