//! # Repository Module
//!
//! Database repository implementations.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Checkout                                                              │
//! │       │                                                                 │
//! │       │  db.sales(sequencer).record_sale(new_sale)                      │
//! │       ▼                                                                 │
//! │  SaleRepository<S: TransactionalStore>                                 │
//! │  ├── record_sale(&self, new_sale)            any store                 │
//! │  ├── get_by_receipt_number(&self, scope, ..) PostgreSQL only           │
//! │  ├── find_by_receipt_number(&self, tenant,..) PostgreSQL only          │
//! │  ├── get_items(&self, sale_id)               PostgreSQL only           │
//! │  └── get_payments(&self, sale_id)            PostgreSQL only           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database (PgPool)  |  MemoryStore                                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`sale::SaleRepository`] - Sale Persistence Transaction and reads

pub mod sale;
