//! # PostgreSQL Store
//!
//! ## Primitive Mapping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  acquire_xact_lock(id)     SELECT pg_advisory_xact_lock($1)             │
//! │                            released by COMMIT / ROLLBACK only           │
//! │                                                                         │
//! │  create_counter_if_absent  to_regclass(name) in the sale tx, then if    │
//! │                            missing, on the counter pool:                │
//! │                              BEGIN                                      │
//! │                              CREATE SEQUENCE IF NOT EXISTS              │
//! │                                receipt_seq_<key> AS BIGINT              │
//! │                                START WITH 1 MINVALUE 1                  │
//! │                              COMMIT                                     │
//! │                                                                         │
//! │  next_counter_value        SELECT nextval($1::regclass)                 │
//! │                            never rolled back: aborts leave gaps         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `CREATE SEQUENCE` is transactional. Run inside the sale transaction, an
//! aborted first sale of the day would take the counter with it and value 1
//! would be issued again. The DDL therefore commits on its own connection,
//! drawn from a separate small pool so that sale transactions waiting on a
//! key lock can never starve it.
//!
//! The creating transaction takes no advisory lock: under a locking strategy
//! the sale transaction already holds the key lock on its own connection,
//! which serializes creators, and taking it again here would wait on itself.
//!
//! The sequence name is built from a validated 20-hex-digit key, so it is
//! safe to splice into DDL. DDL statements are sent unprepared since every
//! key names a different object.

use std::fmt;

use async_trait::async_trait;
use receipt_core::{Payment, Sale, SaleItem, SequenceKey};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, trace};

use super::{SaleTransaction, TransactionalStore};
use crate::allocator::CounterTransaction;
use crate::error::DbResult;
use crate::pool::Database;

// =============================================================================
// Sale Transaction
// =============================================================================

/// A PostgreSQL transaction that numbers and writes one sale.
pub struct PgSaleTransaction {
    tx: Transaction<'static, Postgres>,
    /// Pool for counter DDL, committed independently of `tx`.
    counters: PgPool,
}

impl PgSaleTransaction {
    pub(crate) fn new(tx: Transaction<'static, Postgres>, counters: PgPool) -> Self {
        PgSaleTransaction { tx, counters }
    }
}

impl fmt::Debug for PgSaleTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgSaleTransaction").finish_non_exhaustive()
    }
}

// =============================================================================
// Counter Primitives
// =============================================================================

#[async_trait]
impl CounterTransaction for PgSaleTransaction {
    async fn acquire_xact_lock(&mut self, lock_id: i64) -> DbResult<()> {
        trace!(lock_id, "Waiting for advisory lock");

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(lock_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn create_counter_if_absent(&mut self, key: &SequenceKey) -> DbResult<()> {
        let name = key.counter_name();

        let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
            .bind(&name)
            .fetch_one(&mut *self.tx)
            .await?;
        if exists {
            return Ok(());
        }

        let sql = format!("CREATE SEQUENCE IF NOT EXISTS {name} AS BIGINT START WITH 1 MINVALUE 1");

        let mut ddl = self.counters.begin().await?;
        sqlx::query(&sql).persistent(false).execute(&mut *ddl).await?;
        ddl.commit().await?;

        debug!(counter = %name, "Created counter");
        Ok(())
    }

    async fn next_counter_value(&mut self, key: &SequenceKey) -> DbResult<i64> {
        let value: i64 = sqlx::query_scalar("SELECT nextval($1::regclass)")
            .bind(key.counter_name())
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(value)
    }
}

#[async_trait]
impl SaleTransaction for PgSaleTransaction {
    async fn insert_sale(&mut self, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, receipt_number = %sale.receipt_number, "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, tenant_id, store_id, terminal_id, receipt_number, status,
                subtotal_cents, tax_cents, discount_cents, total_cents,
                user_id, notes, created_at, completed_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6,
                $7, $8, $9, $10,
                $11, $12, $13, $14
            )
            "#,
        )
        .bind(sale.id)
        .bind(sale.tenant_id)
        .bind(sale.store_id)
        .bind(sale.terminal_id)
        .bind(sale.receipt_number.as_str())
        .bind(sale.status.as_str())
        .bind(sale.subtotal_cents)
        .bind(sale.tax_cents)
        .bind(sale.discount_cents)
        .bind(sale.total_cents)
        .bind(&sale.user_id)
        .bind(&sale.notes)
        .bind(sale.created_at)
        .bind(sale.completed_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_sale_item(&mut self, item: &SaleItem) -> DbResult<()> {
        debug!(sale_id = %item.sale_id, product_id = %item.product_id, "Adding sale item");

        sqlx::query(
            r#"
            INSERT INTO sale_items (
                id, sale_id, product_id,
                sku_snapshot, name_snapshot, unit_price_cents,
                quantity, line_total_cents, tax_cents, discount_cents,
                created_at
            ) VALUES (
                $1, $2, $3,
                $4, $5, $6,
                $7, $8, $9, $10,
                $11
            )
            "#,
        )
        .bind(item.id)
        .bind(item.sale_id)
        .bind(item.product_id)
        .bind(&item.sku_snapshot)
        .bind(&item.name_snapshot)
        .bind(item.unit_price_cents)
        .bind(item.quantity)
        .bind(item.line_total_cents)
        .bind(item.tax_cents)
        .bind(item.discount_cents)
        .bind(item.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> DbResult<()> {
        debug!(sale_id = %payment.sale_id, amount = %payment.amount_cents, "Recording payment");

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, sale_id, method,
                amount_cents, tendered_cents, change_cents,
                reference, created_at
            ) VALUES (
                $1, $2, $3,
                $4, $5, $6,
                $7, $8
            )
            "#,
        )
        .bind(payment.id)
        .bind(payment.sale_id)
        .bind(payment.method.as_str())
        .bind(payment.amount_cents)
        .bind(payment.tendered_cents)
        .bind(payment.change_cents)
        .bind(&payment.reference)
        .bind(payment.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self) -> DbResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> DbResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl TransactionalStore for Database {
    type Transaction = PgSaleTransaction;

    async fn begin(&self) -> DbResult<PgSaleTransaction> {
        let tx = self.pool().begin().await?;
        Ok(PgSaleTransaction::new(tx, self.counter_pool().clone()))
    }
}
