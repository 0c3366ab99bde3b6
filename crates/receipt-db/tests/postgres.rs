//! Allocation against a real PostgreSQL server.
//!
//! Run with:
//! ```bash
//! DATABASE_URL=postgres://localhost/receipts_test cargo test -p receipt-db -- --ignored
//! ```

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use receipt_core::{FixedClock, ReceiptNumber, SequenceKey};
use receipt_db::{
    CounterTransaction, Database, DbConfig, DbError, LockStrategy, SaleTransaction,
};

use common::{colliding_terminals, on_nov_17, repository, sale, terminal_scope};

async fn connect() -> Database {
    let config = DbConfig::from_env().expect("DATABASE_URL must be set");
    let db = Database::new(config).await.expect("database should be reachable");

    let schema = db.migration_status().await.unwrap();
    assert!(schema.is_current(), "unapplied migrations: {schema:?}");
    db
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn postgres_five_hundred_concurrent_sales() {
    let db = connect().await;
    let clock = FixedClock::new(on_nov_17(12, 0, 0));
    let repo = Arc::new(repository(db.clone(), LockStrategy::TwoPhase, &clock));
    let scope = terminal_scope();

    let handles: Vec<_> = (0..500)
        .map(|_| {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move { repo.record_sale(sale(scope)).await })
        })
        .collect();

    let mut numbers = HashSet::new();
    for handle in handles {
        let recorded = handle.await.unwrap().expect("sale should be recorded");
        assert!(numbers.insert(recorded.sale.receipt_number.into_string()));
    }
    assert_eq!(numbers.len(), 500);

    let mut counters: Vec<i64> = numbers
        .iter()
        .map(|n| ReceiptNumber::parse(n).unwrap().counter)
        .collect();
    counters.sort_unstable();
    assert_eq!(counters, (1..=500).collect::<Vec<i64>>());
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn postgres_rollback_leaves_a_gap() {
    let db = connect().await;
    let clock = FixedClock::new(on_nov_17(12, 0, 0));
    let repo = repository(db.clone(), LockStrategy::TwoPhase, &clock);
    let scope = terminal_scope();

    let first = repo.record_sale(sale(scope)).await.unwrap();
    assert_eq!(first.sale.receipt_number.parts().counter, 1);

    let mut tx = db.begin().await.unwrap();
    let abandoned = repo.sequencer().next_receipt_number(&mut tx, &scope).await.unwrap();
    assert_eq!(abandoned.parts().counter, 2);
    tx.rollback().await.unwrap();

    let third = repo.record_sale(sale(scope)).await.unwrap();
    assert_eq!(third.sale.receipt_number.parts().counter, 3);
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn postgres_aborted_first_sale_keeps_its_number_consumed() {
    let db = connect().await;
    let clock = FixedClock::new(on_nov_17(12, 0, 0));
    let repo = repository(db.clone(), LockStrategy::TwoPhase, &clock);
    let scope = terminal_scope();

    let mut tx = db.begin().await.unwrap();
    let abandoned = repo.sequencer().next_receipt_number(&mut tx, &scope).await.unwrap();
    assert_eq!(abandoned.parts().counter, 1);
    tx.rollback().await.unwrap();

    let recorded = repo.record_sale(sale(scope)).await.unwrap();
    assert_eq!(recorded.sale.receipt_number.parts().counter, 2);
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn postgres_recorded_sale_reads_back() {
    let db = connect().await;
    let clock = FixedClock::new(on_nov_17(12, 0, 0));
    let repo = repository(db.clone(), LockStrategy::TwoPhase, &clock);
    let scope = terminal_scope();

    let recorded = repo.record_sale(sale(scope)).await.unwrap();
    let sales = db.sales(repo.sequencer().clone());

    let loaded = sales
        .get_by_receipt_number(&scope, recorded.sale.receipt_number.as_str())
        .await
        .unwrap()
        .expect("sale should exist");
    assert_eq!(loaded.id, recorded.sale.id);
    assert_eq!(loaded.receipt_number, recorded.sale.receipt_number);
    assert_eq!(loaded.scope(), scope);

    assert_eq!(sales.get_items(loaded.id).await.unwrap().len(), 1);
    assert_eq!(sales.get_payments(loaded.id).await.unwrap()[0].change_cents, Some(69));
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn postgres_shared_receipt_text_resolves_per_terminal() {
    let db = connect().await;
    let clock = FixedClock::new(on_nov_17(12, 0, 0));
    let repo = repository(db.clone(), LockStrategy::TwoPhase, &clock);
    let (first, second) = colliding_terminals();

    let a = repo.record_sale(sale(first)).await.unwrap();
    let b = repo.record_sale(sale(second)).await.unwrap();
    let text = a.sale.receipt_number.as_str();
    assert_eq!(text, b.sale.receipt_number.as_str());

    let sales = db.sales(repo.sequencer().clone());
    let on_first = sales.get_by_receipt_number(&first, text).await.unwrap().unwrap();
    let on_second = sales.get_by_receipt_number(&second, text).await.unwrap().unwrap();
    assert_eq!(on_first.id, a.sale.id);
    assert_eq!(on_second.id, b.sale.id);

    let mut matches: Vec<_> = sales
        .find_by_receipt_number(first.tenant_id, text)
        .await
        .unwrap()
        .into_iter()
        .map(|sale| sale.id)
        .collect();
    matches.sort();
    let mut expected = vec![a.sale.id, b.sale.id];
    expected.sort();
    assert_eq!(matches, expected);
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn postgres_missing_counter_is_a_query_error() {
    let db = connect().await;
    let key = SequenceKey::for_scope(&terminal_scope(), on_nov_17(0, 0, 0).date_naive());

    let mut tx = db.begin().await.unwrap();
    let err = tx.next_counter_value(&key).await.unwrap_err();
    assert!(matches!(err, DbError::QueryFailed(_)));
}
