//! # Receipt Sequencer
//!
//! Turns "a sale is being recorded on this terminal, now" into a receipt
//! number, inside the caller's transaction.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  clock.now() ──► calendar.date_at() ──► business date                   │
//! │                                             │                           │
//! │  scope (tenant, store, terminal) ──────────┤                           │
//! │                                             ▼                           │
//! │                                   SequenceKey::for_scope                │
//! │                                             │                           │
//! │                                             ▼                           │
//! │                           CounterAllocator::allocate(tx, key)           │
//! │                                             │                           │
//! │  terminal_number(terminal_id) ─────────────┤                           │
//! │                                             ▼                           │
//! │                                ReceiptNumber::format                    │
//! │                                   T42-R-20251117-0007                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use receipt_core::{
    terminal_number, BusinessCalendar, Clock, ReceiptNumber, ReceiptScope, SequenceKey,
    SystemClock,
};
use tracing::debug;

use crate::allocator::{CounterAllocator, CounterTransaction};
use crate::config::{ConfigError, ReceiptConfig};
use crate::error::DbResult;

/// Allocates receipt numbers.
#[derive(Debug, Clone)]
pub struct ReceiptSequencer {
    allocator: CounterAllocator,
    calendar: BusinessCalendar,
    clock: Arc<dyn Clock>,
}

impl ReceiptSequencer {
    /// A sequencer on the system clock.
    pub fn new(config: &ReceiptConfig) -> Result<Self, ConfigError> {
        Ok(ReceiptSequencer {
            allocator: CounterAllocator::new(config.lock_strategy),
            calendar: config.calendar()?,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replaces the clock, typically with a `FixedClock` in tests.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn allocator(&self) -> CounterAllocator {
        self.allocator
    }

    pub fn calendar(&self) -> BusinessCalendar {
        self.calendar
    }

    /// The current instant according to this sequencer's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Allocates the next receipt number for `scope` on today's business date.
    pub async fn next_receipt_number<T>(
        &self,
        tx: &mut T,
        scope: &ReceiptScope,
    ) -> DbResult<ReceiptNumber>
    where
        T: CounterTransaction + ?Sized,
    {
        self.next_receipt_number_at(tx, scope, self.now()).await
    }

    /// Allocates the next receipt number for `scope` on the business date of `at`.
    ///
    /// A failure leaves the transaction unusable; the caller must roll back.
    pub async fn next_receipt_number_at<T>(
        &self,
        tx: &mut T,
        scope: &ReceiptScope,
        at: DateTime<Utc>,
    ) -> DbResult<ReceiptNumber>
    where
        T: CounterTransaction + ?Sized,
    {
        let date = self.calendar.date_at(at);
        let key = SequenceKey::for_scope(scope, date);

        let counter = self.allocator.allocate(tx, &key).await?;
        let receipt_number = ReceiptNumber::format(terminal_number(&scope.terminal_id), date, counter)?;

        debug!(
            terminal_id = %scope.terminal_id,
            %date,
            counter,
            receipt_number = %receipt_number,
            "Allocated receipt number"
        );

        Ok(receipt_number)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, SaleTransaction, TransactionalStore};
    use chrono::{Duration, TimeZone};
    use receipt_core::FixedClock;
    use uuid::Uuid;

    fn scope() -> ReceiptScope {
        ReceiptScope::new(
            Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap(),
            Uuid::parse_str("7d444840-9dc0-11d1-b245-5ffdce74fad2").unwrap(),
            Uuid::parse_str("a1a2a3a4-b1b2-c1c2-d1d2-d3d4d5d6d7d8").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_first_receipt_of_the_day() {
        let store = MemoryStore::new();
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 11, 17, 9, 30, 0).unwrap());
        let sequencer = ReceiptSequencer::new(&ReceiptConfig::default())
            .unwrap()
            .with_clock(Arc::new(clock));

        let mut tx = store.begin().await.unwrap();
        let first = sequencer.next_receipt_number(&mut tx, &scope()).await.unwrap();
        let second = sequencer.next_receipt_number(&mut tx, &scope()).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(first.as_str(), "T308-R-20251117-0001");
        assert_eq!(second.as_str(), "T308-R-20251117-0002");
    }

    #[tokio::test]
    async fn test_reference_offset_decides_the_date() {
        let store = MemoryStore::new();
        let config = ReceiptConfig {
            utc_offset_minutes: -300,
            ..ReceiptConfig::default()
        };
        let sequencer = ReceiptSequencer::new(&config).unwrap();

        // 03:00 UTC on the 18th is still the 17th at UTC-05:00.
        let at = Utc.with_ymd_and_hms(2025, 11, 18, 3, 0, 0).unwrap();
        let mut tx = store.begin().await.unwrap();
        let number = sequencer.next_receipt_number_at(&mut tx, &scope(), at).await.unwrap();

        assert_eq!(number.as_str(), "T308-R-20251117-0001");
    }

    #[tokio::test]
    async fn test_new_day_starts_at_one() {
        let store = MemoryStore::new();
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 11, 17, 23, 59, 0).unwrap());
        let sequencer = ReceiptSequencer::new(&ReceiptConfig::default())
            .unwrap()
            .with_clock(Arc::new(clock.clone()));

        let mut tx = store.begin().await.unwrap();
        sequencer.next_receipt_number(&mut tx, &scope()).await.unwrap();
        sequencer.next_receipt_number(&mut tx, &scope()).await.unwrap();

        clock.advance(Duration::minutes(2));
        let next_day = sequencer.next_receipt_number(&mut tx, &scope()).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(next_day.as_str(), "T308-R-20251118-0001");
    }
}
