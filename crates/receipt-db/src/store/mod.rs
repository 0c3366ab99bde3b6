//! # Transactional Stores
//!
//! The storage seam under the Sale Persistence Transaction.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   TransactionalStore::begin()                                          │
//! │          │                                                              │
//! │          ▼                                                              │
//! │   SaleTransaction  (extends CounterTransaction)                        │
//! │   ├── acquire_xact_lock / create_counter_if_absent / next_counter_value│
//! │   ├── insert_sale / insert_sale_item / insert_payment                  │
//! │   └── commit | rollback | drop (= rollback)                            │
//! │                                                                         │
//! │   Implementations                                                       │
//! │   ├── Database     (postgres.rs)  advisory locks + SEQUENCE counters   │
//! │   └── MemoryStore  (memory.rs)    same semantics, no server            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use receipt_core::{Payment, Sale, SaleItem};

use crate::allocator::CounterTransaction;
use crate::error::DbResult;

pub use memory::MemoryStore;
pub use postgres::PgSaleTransaction;

/// An open transaction that can number and write a sale.
///
/// Dropping the transaction without committing rolls it back.
#[async_trait]
pub trait SaleTransaction: CounterTransaction {
    async fn insert_sale(&mut self, sale: &Sale) -> DbResult<()>;

    async fn insert_sale_item(&mut self, item: &SaleItem) -> DbResult<()>;

    async fn insert_payment(&mut self, payment: &Payment) -> DbResult<()>;

    async fn commit(self) -> DbResult<()>
    where
        Self: Sized;

    async fn rollback(self) -> DbResult<()>
    where
        Self: Sized;
}

/// Something that can open a [`SaleTransaction`].
#[async_trait]
pub trait TransactionalStore: Send + Sync {
    type Transaction: SaleTransaction + 'static;

    async fn begin(&self) -> DbResult<Self::Transaction>;
}
