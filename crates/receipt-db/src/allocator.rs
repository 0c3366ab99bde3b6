//! # Counter Allocator
//!
//! Creates a counter on first use and hands out its next value, serialized
//! per sequence key by a transaction-scoped lock.
//!
//! ## Two Critical Sections
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 allocate(tx, key)   (LockStrategy::TwoPhase)            │
//! │                                                                         │
//! │   caller's transaction ──────────────────────────────────────────┐     │
//! │   │                                                               │     │
//! │   │  1. lock(key.lock_id())        ◄─ waits only for SAME key     │     │
//! │   │  2. create counter if absent   ◄─ at most one creator         │     │
//! │   │  3. lock(key.lock_id())        ◄─ re-entrant, guards step 4   │     │
//! │   │  4. next value                 ◄─ strictly increasing         │     │
//! │   │  ... caller inserts sale, items, payments ...                 │     │
//! │   │                                                               │     │
//! │   └── COMMIT / ROLLBACK ── locks released automatically ──────────┘     │
//! │                                                                         │
//! │   Aborted after step 2 or 4? Counter and value stay: a gap, no reuse.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Strategy History
//! The counter store went through several lock layouts. All three are kept
//! selectable so the question "are locks needed at all once creation is
//! idempotent and increment is atomic" can be answered against a real
//! database instead of by argument:
//!
//! - `TwoPhase` (default): one lock before create, one before increment.
//! - `Single`: one lock spanning both steps. Equivalent, simpler.
//! - `Unlocked`: no lock. Concurrent first allocations of a new key race on
//!   counter creation and surface as `UniqueViolation`.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use receipt_core::{CoreError, SequenceKey};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConfigError;
use crate::error::DbResult;

// =============================================================================
// Transaction Primitives
// =============================================================================

/// The primitives a storage transaction offers the allocator.
///
/// Every method runs inside one open transaction. Implementations must
/// release locks when the transaction ends, however it ends.
#[async_trait]
pub trait CounterTransaction: Send {
    /// Blocks until this transaction holds the named lock.
    ///
    /// Re-acquiring a lock the transaction already holds returns immediately.
    async fn acquire_xact_lock(&mut self, lock_id: i64) -> DbResult<()>;

    /// Creates the counter for `key`, starting before 1, unless it exists.
    ///
    /// The counter outlives the surrounding transaction: a rollback after the
    /// first allocation of a key must not let value 1 be handed out again.
    async fn create_counter_if_absent(&mut self, key: &SequenceKey) -> DbResult<()>;

    /// Atomically increments the counter for `key` and returns the new value.
    ///
    /// The increment survives a rollback of the surrounding transaction.
    async fn next_counter_value(&mut self, key: &SequenceKey) -> DbResult<i64>;
}

// =============================================================================
// Lock Strategy
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockStrategy {
    /// Lock before create-if-absent and again before the increment.
    #[default]
    TwoPhase,
    /// One lock before create-if-absent, held through the increment.
    Single,
    /// No lock: rely on the store alone.
    Unlocked,
}

impl fmt::Display for LockStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockStrategy::TwoPhase => write!(f, "two_phase"),
            LockStrategy::Single => write!(f, "single"),
            LockStrategy::Unlocked => write!(f, "unlocked"),
        }
    }
}

impl FromStr for LockStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "two_phase" | "two-phase" | "twophase" => Ok(LockStrategy::TwoPhase),
            "single" => Ok(LockStrategy::Single),
            "unlocked" | "none" => Ok(LockStrategy::Unlocked),
            other => Err(ConfigError::InvalidValue {
                key: "lock_strategy".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

// =============================================================================
// Allocator
// =============================================================================

/// Allocates counter values inside the caller's transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterAllocator {
    strategy: LockStrategy,
}

impl CounterAllocator {
    pub fn new(strategy: LockStrategy) -> Self {
        CounterAllocator { strategy }
    }

    pub fn strategy(&self) -> LockStrategy {
        self.strategy
    }

    /// Returns the next value of `key`'s counter, creating it on first use.
    ///
    /// ## Errors
    /// - `StorageUnavailable` / `LockTimeout` from the store, unchanged
    /// - `UniqueViolation` if an unlocked creation lost a race
    /// - `FormatInvariantViolation` if the store returned a value below 1
    ///
    /// Any error must abort the caller's transaction.
    pub async fn allocate<T>(&self, tx: &mut T, key: &SequenceKey) -> DbResult<i64>
    where
        T: CounterTransaction + ?Sized,
    {
        let lock_id = key.lock_id();

        match self.strategy {
            LockStrategy::TwoPhase => {
                tx.acquire_xact_lock(lock_id).await?;
                tx.create_counter_if_absent(key).await?;
                tx.acquire_xact_lock(lock_id).await?;
            }
            LockStrategy::Single => {
                tx.acquire_xact_lock(lock_id).await?;
                tx.create_counter_if_absent(key).await?;
            }
            LockStrategy::Unlocked => {
                tx.create_counter_if_absent(key).await?;
            }
        }

        let value = tx.next_counter_value(key).await?;
        if value < 1 {
            return Err(CoreError::invariant(format!(
                "counter {} returned non-positive value {}",
                key.counter_name(),
                value
            ))
            .into());
        }

        debug!(key = %key, lock_id, value, strategy = %self.strategy, "Allocated counter value");
        Ok(value)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
