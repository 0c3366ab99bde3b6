//! # Domain Types
//!
//! Records written by the Sale Persistence Transaction.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  ReceiptScope   │   │      Sale       │   │    Payment      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  tenant_id      │──►│  id (UUID)      │◄──│  sale_id (FK)   │       │
//! │  │  store_id       │   │  receipt_number │   │  method         │       │
//! │  │  terminal_id    │   │  status, totals │   │  amount_cents   │       │
//! │  └─────────────────┘   └────────▲────────┘   └─────────────────┘       │
//! │                                 │                                       │
//! │  ┌─────────────────┐   ┌────────┴────────┐                             │
//! │  │    NewSale      │   │    SaleItem     │                             │
//! │  │ (caller input)  │   │ sale_id (FK)    │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Business fields (totals, tax, line items) are chosen by the caller and
//! carried through untouched. This crate never computes them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::receipt::ReceiptNumber;

// =============================================================================
// Receipt Scope
// =============================================================================

/// The terminal a sale is rung up on: the scope of its receipt counter
/// (together with the business date).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReceiptScope {
    pub tenant_id: Uuid,
    pub store_id: Uuid,
    pub terminal_id: Uuid,
}

impl ReceiptScope {
    pub fn new(tenant_id: Uuid, store_id: Uuid, terminal_id: Uuid) -> Self {
        ReceiptScope {
            tenant_id,
            store_id,
            terminal_id,
        }
    }
}

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a sale transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Sale is in progress (items being added).
    Draft,
    /// Sale has been paid and finalized.
    #[default]
    Completed,
    /// Sale was cancelled/refunded.
    Voided,
}

impl SaleStatus {
    /// Column value stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Draft => "draft",
            SaleStatus::Completed => "completed",
            SaleStatus::Voided => "voided",
        }
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SaleStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(SaleStatus::Draft),
            "completed" => Ok(SaleStatus::Completed),
            "voided" => Ok(SaleStatus::Voided),
            other => Err(CoreError::unknown_value("sales.status", other)),
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash payment.
    Cash,
    /// Card payment on external terminal.
    ExternalCard,
}

impl PaymentMethod {
    /// Column value stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::ExternalCard => "external_card",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentMethod::Cash),
            "external_card" => Ok(PaymentMethod::ExternalCard),
            other => Err(CoreError::unknown_value("payments.method", other)),
        }
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A persisted sale. `receipt_number` is assigned once and never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub store_id: Uuid,
    pub terminal_id: Uuid,
    pub receipt_number: ReceiptNumber,
    pub status: SaleStatus,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub user_id: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Sale {
    /// The terminal scope this sale was numbered in.
    pub fn scope(&self) -> ReceiptScope {
        ReceiptScope::new(self.tenant_id, self.store_id, self.terminal_id)
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line item in a sale.
/// Uses snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleItem {
    pub id: Uuid,
    pub sale_id: Uuid,
    pub product_id: Uuid,
    /// SKU at time of sale (frozen).
    pub sku_snapshot: String,
    /// Product name at time of sale (frozen).
    pub name_snapshot: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub line_total_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Payment
// =============================================================================

/// A payment towards a sale.
/// A sale can have multiple payments for split tender scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub sale_id: Uuid,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    /// For cash: amount customer gave (to calculate change).
    pub tendered_cents: Option<i64>,
    /// For cash: change returned to customer.
    pub change_cents: Option<i64>,
    /// External reference (card auth code, etc.).
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Caller Input
// =============================================================================

/// A line item as handed over by the checkout flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSaleItem {
    pub product_id: Uuid,
    pub sku: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub line_total_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
}

/// A payment as handed over by the checkout flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayment {
    pub method: PaymentMethod,
    pub amount_cents: i64,
    pub tendered_cents: Option<i64>,
    pub change_cents: Option<i64>,
    pub reference: Option<String>,
}

/// Everything needed to persist a sale except its id, timestamps and
/// receipt number, which are assigned inside the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSale {
    pub scope: ReceiptScope,
    pub user_id: String,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub notes: Option<String>,
    pub items: Vec<NewSaleItem>,
    pub payments: Vec<NewPayment>,
}

/// A sale together with the rows written alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedSale {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub payments: Vec<Payment>,
}

impl NewSale {
    /// An empty sale for a terminal; totals and rows are filled in by the caller.
    pub fn new(scope: ReceiptScope, user_id: impl Into<String>) -> Self {
        NewSale {
            scope,
            user_id: user_id.into(),
            subtotal_cents: 0,
            tax_cents: 0,
            discount_cents: 0,
            total_cents: 0,
            notes: None,
            items: Vec::new(),
            payments: Vec::new(),
        }
    }

    /// Assembles the rows to insert once a receipt number has been allocated.
    pub fn into_records(self, receipt_number: ReceiptNumber, now: DateTime<Utc>) -> RecordedSale {
        let sale_id = Uuid::new_v4();

        let items = self
            .items
            .into_iter()
            .map(|item| SaleItem {
                id: Uuid::new_v4(),
                sale_id,
                product_id: item.product_id,
                sku_snapshot: item.sku,
                name_snapshot: item.name,
                unit_price_cents: item.unit_price_cents,
                quantity: item.quantity,
                line_total_cents: item.line_total_cents,
                tax_cents: item.tax_cents,
                discount_cents: item.discount_cents,
                created_at: now,
            })
            .collect();

        let payments = self
            .payments
            .into_iter()
            .map(|payment| Payment {
                id: Uuid::new_v4(),
                sale_id,
                method: payment.method,
                amount_cents: payment.amount_cents,
                tendered_cents: payment.tendered_cents,
                change_cents: payment.change_cents,
                reference: payment.reference,
                created_at: now,
            })
            .collect();

        let sale = Sale {
            id: sale_id,
            tenant_id: self.scope.tenant_id,
            store_id: self.scope.store_id,
            terminal_id: self.scope.terminal_id,
            receipt_number,
            status: SaleStatus::Completed,
            subtotal_cents: self.subtotal_cents,
            tax_cents: self.tax_cents,
            discount_cents: self.discount_cents,
            total_cents: self.total_cents,
            user_id: self.user_id,
            notes: self.notes,
            created_at: now,
            completed_at: Some(now),
        };

        RecordedSale {
            sale,
            items,
            payments,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::TerminalNumber;
    use chrono::{NaiveDate, TimeZone};

    fn receipt() -> ReceiptNumber {
        let date = NaiveDate::from_ymd_opt(2025, 11, 17).unwrap();
        ReceiptNumber::format(TerminalNumber::new(42).unwrap(), date, 7).unwrap()
    }

    fn sample_sale() -> NewSale {
        let scope = ReceiptScope::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut sale = NewSale::new(scope, "cashier-1");
        sale.subtotal_cents = 398;
        sale.tax_cents = 33;
        sale.total_cents = 431;
        sale.items.push(NewSaleItem {
            product_id: Uuid::new_v4(),
            sku: "COKE-330".to_string(),
            name: "Coca-Cola 330ml".to_string(),
            unit_price_cents: 199,
            quantity: 2,
            line_total_cents: 398,
            tax_cents: 33,
            discount_cents: 0,
        });
        sale.payments.push(NewPayment {
            method: PaymentMethod::Cash,
            amount_cents: 431,
            tendered_cents: Some(500),
            change_cents: Some(69),
            reference: None,
        });
        sale
    }

    #[test]
    fn test_into_records_links_rows_to_sale() {
        let now = Utc.with_ymd_and_hms(2025, 11, 17, 12, 0, 0).unwrap();
        let input = sample_sale();
        let scope = input.scope;

        let recorded = input.into_records(receipt(), now);

        assert_eq!(recorded.sale.scope(), scope);
        assert_eq!(recorded.sale.receipt_number.as_str(), "T42-R-20251117-0007");
        assert_eq!(recorded.sale.status, SaleStatus::Completed);
        assert_eq!(recorded.sale.completed_at, Some(now));
        assert_eq!(recorded.sale.total_cents, 431);

        assert_eq!(recorded.items.len(), 1);
        assert_eq!(recorded.items[0].sale_id, recorded.sale.id);
        assert_eq!(recorded.items[0].sku_snapshot, "COKE-330");

        assert_eq!(recorded.payments.len(), 1);
        assert_eq!(recorded.payments[0].sale_id, recorded.sale.id);
        assert_eq!(recorded.payments[0].change_cents, Some(69));
    }

    #[test]
    fn test_status_round_trip() {
        for status in [SaleStatus::Draft, SaleStatus::Completed, SaleStatus::Voided] {
            assert_eq!(status.as_str().parse::<SaleStatus>().unwrap(), status);
        }
        assert_eq!(
            "refunded".parse::<SaleStatus>().unwrap_err(),
            CoreError::unknown_value("sales.status", "refunded")
        );
    }

    #[test]
    fn test_payment_method_column_values() {
        assert_eq!(PaymentMethod::ExternalCard.as_str(), "external_card");
        assert_eq!("cash".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cash);
        assert!(matches!(
            "bitcoin".parse::<PaymentMethod>().unwrap_err(),
            CoreError::UnknownColumnValue { column: "payments.method", .. }
        ));
    }
}
