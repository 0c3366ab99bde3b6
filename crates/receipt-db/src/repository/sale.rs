//! # Sale Repository
//!
//! Records sales, each with a freshly allocated receipt number, in one
//! transaction.
//!
//! ## Sale Persistence Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      record_sale(new_sale)                              │
//! │                                                                         │
//! │  1. BEGIN                                                              │
//! │  2. next_receipt_number   → lock key, create counter, lock, nextval    │
//! │  3. INSERT sales          (receipt_number UNIQUE per terminal)         │
//! │  4. INSERT sale_items     (one per line)                               │
//! │  5. INSERT payments       (split tender allowed)                       │
//! │  6. COMMIT                → key lock released                          │
//! │                                                                         │
//! │  Any step fails → ROLLBACK, error returned unchanged.                  │
//! │  The counter value drawn in step 2 is NOT returned: a gap remains.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use receipt_core::{
    NewSale, Payment, PaymentMethod, ReceiptNumber, ReceiptScope, RecordedSale, Sale, SaleItem,
    SaleStatus,
};
use sqlx::postgres::PgRow;
use sqlx::Row;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::DbResult;
use crate::pool::Database;
use crate::sequencer::ReceiptSequencer;
use crate::store::{SaleTransaction, TransactionalStore};

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository<S> {
    store: S,
    sequencer: ReceiptSequencer,
}

impl<S: TransactionalStore> SaleRepository<S> {
    /// Creates a new SaleRepository.
    pub fn new(store: S, sequencer: ReceiptSequencer) -> Self {
        SaleRepository { store, sequencer }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sequencer(&self) -> &ReceiptSequencer {
        &self.sequencer
    }

    /// Numbers and persists a sale with its items and payments.
    ///
    /// ## Returns
    /// * `Ok(RecordedSale)` - committed; the receipt number is final
    /// * `Err(DbError)` - nothing was written; retry the whole call if
    ///   `is_retryable()`
    pub async fn record_sale(&self, sale: NewSale) -> DbResult<RecordedSale> {
        let scope = sale.scope;
        let mut tx = self.store.begin().await?;

        let recorded = match self.write_sale(&mut tx, sale).await {
            Ok(recorded) => recorded,
            Err(err) => {
                warn!(terminal_id = %scope.terminal_id, error = %err, "Sale not recorded, rolling back");
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                return Err(err);
            }
        };

        if let Err(err) = tx.commit().await {
            warn!(
                receipt_number = %recorded.sale.receipt_number,
                error = %err,
                "Commit failed, receipt number discarded"
            );
            return Err(err);
        }

        info!(
            id = %recorded.sale.id,
            receipt_number = %recorded.sale.receipt_number,
            items = recorded.items.len(),
            payments = recorded.payments.len(),
            "Sale recorded"
        );

        Ok(recorded)
    }

    async fn write_sale(&self, tx: &mut S::Transaction, sale: NewSale) -> DbResult<RecordedSale> {
        // One instant for both the business date and the row timestamps.
        let now = self.sequencer.now();
        let receipt_number = self
            .sequencer
            .next_receipt_number_at(tx, &sale.scope, now)
            .await?;

        let recorded = sale.into_records(receipt_number, now);

        tx.insert_sale(&recorded.sale).await?;
        for item in &recorded.items {
            tx.insert_sale_item(item).await?;
        }
        for payment in &recorded.payments {
            tx.insert_payment(payment).await?;
        }

        Ok(recorded)
    }
}

// =============================================================================
// PostgreSQL Reads
// =============================================================================

impl SaleRepository<Database> {
    /// Gets the sale a terminal printed `receipt_number` on.
    ///
    /// Matches the `(tenant, store, terminal, receipt_number)` unique
    /// constraint, so at most one row qualifies.
    pub async fn get_by_receipt_number(
        &self,
        scope: &ReceiptScope,
        receipt_number: &str,
    ) -> DbResult<Option<Sale>> {
        let row = sqlx::query(
            r#"
            SELECT
                id, tenant_id, store_id, terminal_id, receipt_number, status,
                subtotal_cents, tax_cents, discount_cents, total_cents,
                user_id, notes, created_at, completed_at
            FROM sales
            WHERE tenant_id = $1 AND store_id = $2 AND terminal_id = $3
              AND receipt_number = $4
            "#,
        )
        .bind(scope.tenant_id)
        .bind(scope.store_id)
        .bind(scope.terminal_id)
        .bind(receipt_number)
        .fetch_optional(self.store.pool())
        .await?;

        row.as_ref().map(sale_from_row).transpose()
    }

    /// Every sale in a tenant printed with `receipt_number`.
    ///
    /// Two terminals whose display numbers collide can print the same text
    /// on the same day, so a receipt scanned without its terminal may match
    /// more than one sale.
    pub async fn find_by_receipt_number(
        &self,
        tenant_id: Uuid,
        receipt_number: &str,
    ) -> DbResult<Vec<Sale>> {
        let rows = sqlx::query(
            r#"
            SELECT
                id, tenant_id, store_id, terminal_id, receipt_number, status,
                subtotal_cents, tax_cents, discount_cents, total_cents,
                user_id, notes, created_at, completed_at
            FROM sales
            WHERE tenant_id = $1 AND receipt_number = $2
            ORDER BY created_at, id
            "#,
        )
        .bind(tenant_id)
        .bind(receipt_number)
        .fetch_all(self.store.pool())
        .await?;

        rows.iter().map(sale_from_row).collect()
    }

    /// Gets all items for a sale.
    pub async fn get_items(&self, sale_id: Uuid) -> DbResult<Vec<SaleItem>> {
        let rows = sqlx::query(
            r#"
            SELECT
                id, sale_id, product_id,
                sku_snapshot, name_snapshot, unit_price_cents,
                quantity, line_total_cents, tax_cents, discount_cents,
                created_at
            FROM sale_items
            WHERE sale_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(sale_id)
        .fetch_all(self.store.pool())
        .await?;

        rows.iter().map(item_from_row).collect()
    }

    /// Gets all payments for a sale.
    pub async fn get_payments(&self, sale_id: Uuid) -> DbResult<Vec<Payment>> {
        let rows = sqlx::query(
            r#"
            SELECT
                id, sale_id, method,
                amount_cents, tendered_cents, change_cents,
                reference, created_at
            FROM payments
            WHERE sale_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(sale_id)
        .fetch_all(self.store.pool())
        .await?;

        rows.iter().map(payment_from_row).collect()
    }
}

fn sale_from_row(row: &PgRow) -> DbResult<Sale> {
    let receipt_number: String = row.try_get("receipt_number")?;
    let status: String = row.try_get("status")?;

    Ok(Sale {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        store_id: row.try_get("store_id")?,
        terminal_id: row.try_get("terminal_id")?,
        receipt_number: receipt_number.parse::<ReceiptNumber>()?,
        status: status.parse::<SaleStatus>()?,
        subtotal_cents: row.try_get("subtotal_cents")?,
        tax_cents: row.try_get("tax_cents")?,
        discount_cents: row.try_get("discount_cents")?,
        total_cents: row.try_get("total_cents")?,
        user_id: row.try_get("user_id")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

fn item_from_row(row: &PgRow) -> DbResult<SaleItem> {
    Ok(SaleItem {
        id: row.try_get("id")?,
        sale_id: row.try_get("sale_id")?,
        product_id: row.try_get("product_id")?,
        sku_snapshot: row.try_get("sku_snapshot")?,
        name_snapshot: row.try_get("name_snapshot")?,
        unit_price_cents: row.try_get("unit_price_cents")?,
        quantity: row.try_get("quantity")?,
        line_total_cents: row.try_get("line_total_cents")?,
        tax_cents: row.try_get("tax_cents")?,
        discount_cents: row.try_get("discount_cents")?,
        created_at: row.try_get("created_at")?,
    })
}

fn payment_from_row(row: &PgRow) -> DbResult<Payment> {
    let method: String = row.try_get("method")?;

    Ok(Payment {
        id: row.try_get("id")?,
        sale_id: row.try_get("sale_id")?,
        method: method.parse::<PaymentMethod>()?,
        amount_cents: row.try_get("amount_cents")?,
        tendered_cents: row.try_get("tendered_cents")?,
        change_cents: row.try_get("change_cents")?,
        reference: row.try_get("reference")?,
        created_at: row.try_get("created_at")?,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReceiptConfig;
    use crate::error::DbError;
    use crate::store::MemoryStore;
    use receipt_core::{NewPayment, NewSaleItem, ReceiptScope};

    fn repository(store: MemoryStore) -> SaleRepository<MemoryStore> {
        let sequencer = ReceiptSequencer::new(&ReceiptConfig::default()).unwrap();
        SaleRepository::new(store, sequencer)
    }

    fn new_sale(scope: ReceiptScope) -> NewSale {
        let mut sale = NewSale::new(scope, "cashier-1");
        sale.total_cents = 199;
        sale.items.push(NewSaleItem {
            product_id: Uuid::new_v4(),
            sku: "COKE-330".to_string(),
            name: "Coca-Cola 330ml".to_string(),
            unit_price_cents: 199,
            quantity: 1,
            line_total_cents: 199,
            tax_cents: 0,
            discount_cents: 0,
        });
        sale.payments.push(NewPayment {
            method: PaymentMethod::Cash,
            amount_cents: 199,
            tendered_cents: Some(200),
            change_cents: Some(1),
            reference: None,
        });
        sale
    }

    #[tokio::test]
    async fn test_record_sale_writes_all_rows() {
        let store = MemoryStore::new();
        let repo = repository(store.clone());
        let scope = ReceiptScope::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let recorded = repo.record_sale(new_sale(scope)).await.unwrap();

        assert_eq!(recorded.sale.receipt_number.parts().counter, 1);
        assert_eq!(store.sales(), vec![recorded.sale.clone()]);
        assert_eq!(store.sale_items().len(), 1);
        assert_eq!(store.payments()[0].sale_id, recorded.sale.id);
    }

    #[tokio::test]
    async fn test_failed_sale_leaves_nothing_behind() {
        let store = MemoryStore::new();
        let repo = repository(store.clone());
        let scope = ReceiptScope::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        store.set_available(false);
        let err = repo.record_sale(new_sale(scope)).await.unwrap_err();
        assert!(matches!(err, DbError::StorageUnavailable(_)));
        assert!(err.is_retryable());

        store.set_available(true);
        assert!(store.sales().is_empty());
        assert_eq!(store.counter_count(), 0);
    }
}
