//! # Receipt Load Generator
//!
//! Fires N concurrent sales at ONE terminal and checks that every committed
//! receipt number is distinct.
//!
//! ## Usage
//! ```bash
//! # 500 concurrent sales against PostgreSQL (DATABASE_URL)
//! cargo run -p receipt-db --bin receipt-load
//!
//! # Custom amount, in-memory store, single-lock strategy
//! RECEIPT_LOCK_STRATEGY=single cargo run -p receipt-db --bin receipt-load -- --count 2000 --memory
//! ```
//!
//! Prints a JSON report and exits with status 1 if any receipt number was
//! issued twice.

use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Instant;

use receipt_core::{NewPayment, NewSale, NewSaleItem, PaymentMethod, ReceiptScope};
use receipt_db::{
    Database, DbConfig, MemoryStore, ReceiptConfig, ReceiptSequencer, SaleRepository,
    TransactionalStore,
};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const DEFAULT_COUNT: usize = 500;

#[derive(Debug, Serialize)]
struct LoadReport {
    backend: &'static str,
    lock_strategy: String,
    terminal_id: Uuid,
    requested: usize,
    committed: usize,
    failed: usize,
    retryable_failures: usize,
    distinct: usize,
    duplicates: Vec<String>,
    highest_counter: i64,
    elapsed_ms: u128,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut count = DEFAULT_COUNT;
    let mut memory = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(DEFAULT_COUNT);
                    i += 1;
                }
            }
            "--memory" | "-m" => memory = true,
            "--help" | "-h" => {
                println!("Receipt Load Generator");
                println!();
                println!("Usage: receipt-load [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Concurrent sales to record (default: {DEFAULT_COUNT})");
                println!("  -m, --memory       Use the in-memory store instead of DATABASE_URL");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => warn!(argument = other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let receipt_config = ReceiptConfig::from_env()?;
    let sequencer = ReceiptSequencer::new(&receipt_config)?;
    let scope = ReceiptScope::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    info!(
        count,
        memory,
        strategy = %receipt_config.lock_strategy,
        terminal_id = %scope.terminal_id,
        "Starting load run"
    );

    let report = if memory {
        let repo = SaleRepository::new(MemoryStore::new(), sequencer);
        run(repo, scope, count, "memory").await
    } else {
        let db = Database::new(DbConfig::from_env()?).await?;
        let schema = db.migration_status().await?;
        if !schema.is_current() {
            warn!(pending = schema.pending(), "Schema has unapplied migrations");
        }
        let report = run(db.sales(sequencer), scope, count, "postgres").await;
        db.close().await;
        report
    };

    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.duplicates.is_empty() {
        warn!(duplicates = report.duplicates.len(), "Duplicate receipt numbers issued");
        std::process::exit(1);
    }

    Ok(())
}

/// Records `count` sales concurrently on one terminal and tallies the outcome.
async fn run<S>(
    repo: SaleRepository<S>,
    scope: ReceiptScope,
    count: usize,
    backend: &'static str,
) -> LoadReport
where
    S: TransactionalStore + 'static,
{
    let lock_strategy = repo.sequencer().allocator().strategy().to_string();
    let repo = Arc::new(repo);
    let start = Instant::now();

    let handles: Vec<_> = (0..count)
        .map(|n| {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move { repo.record_sale(sample_sale(scope, n)).await })
        })
        .collect();

    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut committed = 0;
    let mut failed = 0;
    let mut retryable_failures = 0;
    let mut highest_counter = 0;

    for handle in handles {
        match handle.await {
            Ok(Ok(recorded)) => {
                committed += 1;
                highest_counter = highest_counter.max(recorded.sale.receipt_number.parts().counter);
                *seen.entry(recorded.sale.receipt_number.into_string()).or_default() += 1;
            }
            Ok(Err(err)) => {
                failed += 1;
                if err.is_retryable() {
                    retryable_failures += 1;
                }
                warn!(error = %err, "Sale failed");
            }
            Err(join_err) => {
                failed += 1;
                warn!(error = %join_err, "Sale task panicked");
            }
        }
    }

    let mut duplicates: Vec<String> = seen
        .iter()
        .filter(|(_, times)| **times > 1)
        .map(|(number, _)| number.clone())
        .collect();
    duplicates.sort();

    LoadReport {
        backend,
        lock_strategy,
        terminal_id: scope.terminal_id,
        requested: count,
        committed,
        failed,
        retryable_failures,
        distinct: seen.len(),
        duplicates,
        highest_counter,
        elapsed_ms: start.elapsed().as_millis(),
    }
}

fn sample_sale(scope: ReceiptScope, n: usize) -> NewSale {
    let price_cents = 199 + (n % 800) as i64;

    let mut sale = NewSale::new(scope, "load-generator");
    sale.subtotal_cents = price_cents;
    sale.total_cents = price_cents;
    sale.items.push(NewSaleItem {
        product_id: Uuid::new_v4(),
        sku: format!("LOAD-{n:05}"),
        name: format!("Load item {n}"),
        unit_price_cents: price_cents,
        quantity: 1,
        line_total_cents: price_cents,
        tax_cents: 0,
        discount_cents: 0,
    });
    sale.payments.push(NewPayment {
        method: PaymentMethod::Cash,
        amount_cents: price_cents,
        tendered_cents: Some(price_cents),
        change_cents: Some(0),
        reference: None,
    });
    sale
}
