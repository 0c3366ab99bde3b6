//! # Business Calendar
//!
//! Decides which calendar day a sale belongs to.
//!
//! Counters reset daily, so "today" has to mean the same thing for every
//! process that shares the database. It is the date in the configured
//! reference time zone, never the host's local zone.
//!
//! ```text
//!   now (UTC) ──► BusinessCalendar (offset, e.g. +05:00) ──► NaiveDate
//!   2025-11-17T20:30Z          +05:00                       2025-11-18
//! ```

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};
use parking_lot::RwLock;

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Clock
// =============================================================================

/// Source of the current instant.
///
/// Implementations are `SystemClock` in production and `FixedClock` in tests.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same instant, so a test can hand one clone to the code
/// under test and advance the other across a day boundary.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl FixedClock {
    /// Creates a clock frozen at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        FixedClock {
            now: Arc::new(RwLock::new(now)),
        }
    }

    /// Moves the clock to `now`.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write() = now;
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

// =============================================================================
// Business Calendar
// =============================================================================

/// The system's reference time zone, as a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessCalendar {
    offset: FixedOffset,
}

impl BusinessCalendar {
    /// Calendar on UTC.
    pub fn utc() -> Self {
        BusinessCalendar {
            offset: Utc.fix(),
        }
    }

    /// Calendar on a fixed offset east of UTC, in minutes (`-300` = UTC-05:00).
    pub fn from_offset_minutes(minutes: i32) -> CoreResult<Self> {
        let offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(CoreError::InvalidUtcOffset { minutes })?;
        Ok(BusinessCalendar { offset })
    }

    /// Returns the reference offset.
    #[inline]
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// The business date of an instant.
    pub fn date_at(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }
}

impl Default for BusinessCalendar {
    fn default() -> Self {
        BusinessCalendar::utc()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
