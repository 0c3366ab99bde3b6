//! # receipt-db: Counter Allocation & Sale Persistence
//!
//! This crate hands out receipt numbers that are unique per tenant and
//! strictly increasing per (terminal, business day), under any amount of
//! concurrency, and writes each sale together with its number in one
//! transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Receipt Number Data Flow                            │
//! │                                                                         │
//! │  Checkout (any number of concurrent requests, any number of processes) │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  receipt-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   SaleRepository::record_sale                                   │   │
//! │  │        │                                                        │   │
//! │  │        ▼                                                        │   │
//! │  │   ReceiptSequencer ──► CounterAllocator ──► CounterTransaction  │   │
//! │  │   (date, key, format)  (lock strategy)      (store primitives)  │   │
//! │  │                                                   │             │   │
//! │  │                            ┌──────────────────────┴─────┐       │   │
//! │  │                            ▼                            ▼       │   │
//! │  │                     Database (PgPool)            MemoryStore    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  PostgreSQL: advisory xact locks, receipt_seq_* sequences,      │   │
//! │  │  sales / sale_items / payments                                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`allocator`] - Counter Allocator and the lock strategies
//! - [`sequencer`] - Receipt number for a scope and instant
//! - [`store`] - Transactional stores (PostgreSQL, in-memory)
//! - [`repository`] - Sale Persistence Transaction and reads
//! - [`pool`] - Connection pool creation and configuration
//! - [`config`] - Receipt numbering configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use receipt_db::{Database, DbConfig, ReceiptConfig, ReceiptSequencer};
//!
//! let db = Database::new(DbConfig::from_env()?).await?;
//! let sequencer = ReceiptSequencer::new(&ReceiptConfig::from_env()?)?;
//!
//! let recorded = db.sales(sequencer).record_sale(new_sale).await?;
//! println!("{}", recorded.sale.receipt_number); // T42-R-20251117-0001
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocator;
pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod sequencer;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use allocator::{CounterAllocator, CounterTransaction, LockStrategy};
pub use config::{ConfigError, ReceiptConfig};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::sale::SaleRepository;
pub use sequencer::ReceiptSequencer;
pub use store::memory::MemoryTransaction;
pub use store::{MemoryStore, PgSaleTransaction, SaleTransaction, TransactionalStore};
