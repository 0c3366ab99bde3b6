#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use receipt_core::{
    terminal_number, FixedClock, NewPayment, NewSale, NewSaleItem, PaymentMethod, ReceiptScope,
    TerminalNumber,
};
use receipt_db::{LockStrategy, ReceiptConfig, ReceiptSequencer, SaleRepository, TransactionalStore};
use uuid::Uuid;

/// A tenant shared by every scope in a test, as in a real deployment.
pub const TENANT: &str = "00000000-0000-0000-0000-000000000001";
pub const STORE: &str = "7d444840-9dc0-11d1-b245-5ffdce74fad2";

pub fn tenant() -> Uuid {
    Uuid::parse_str(TENANT).unwrap()
}

pub fn store() -> Uuid {
    Uuid::parse_str(STORE).unwrap()
}

/// A fresh terminal in the shared tenant and store.
pub fn terminal_scope() -> ReceiptScope {
    ReceiptScope::new(tenant(), store(), Uuid::new_v4())
}

/// Two terminals in the shared tenant and store with the same display number.
///
/// Only 999 display numbers exist, so the search ends within 1000 draws.
pub fn colliding_terminals() -> (ReceiptScope, ReceiptScope) {
    let mut seen: HashMap<TerminalNumber, Uuid> = HashMap::new();
    loop {
        let terminal_id = Uuid::new_v4();
        if let Some(earlier) = seen.insert(terminal_number(&terminal_id), terminal_id) {
            return (
                ReceiptScope::new(tenant(), store(), earlier),
                ReceiptScope::new(tenant(), store(), terminal_id),
            );
        }
    }
}

/// 2025-11-17 at the given UTC time.
pub fn on_nov_17(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 17, hour, minute, second).unwrap()
}

pub fn config(strategy: LockStrategy) -> ReceiptConfig {
    ReceiptConfig {
        lock_strategy: strategy,
        ..ReceiptConfig::default()
    }
}

pub fn sequencer(config: &ReceiptConfig, clock: &FixedClock) -> ReceiptSequencer {
    ReceiptSequencer::new(config)
        .unwrap()
        .with_clock(Arc::new(clock.clone()))
}

pub fn repository<S: TransactionalStore>(
    store: S,
    strategy: LockStrategy,
    clock: &FixedClock,
) -> SaleRepository<S> {
    SaleRepository::new(store, sequencer(&config(strategy), clock))
}

/// A one-line cash sale.
pub fn sale(scope: ReceiptScope) -> NewSale {
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
