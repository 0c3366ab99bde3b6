//! # Receipt Configuration
//!
//! Settings for receipt numbering, loaded from environment variables with
//! fallback to defaults.
//!
//! ## Environment Variables
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Variable                        Default     Meaning                    │
//! │  ─────────────────────────────   ─────────   ────────────────────────   │
//! │  RECEIPT_UTC_OFFSET_MINUTES      0           Reference time zone that   │
//! │                                              decides the business date  │
//! │  RECEIPT_LOCK_STRATEGY           two_phase   two_phase | single |       │
//! │                                              unlocked                   │
//! │                                                                         │
//! │  Database settings (DATABASE_URL, pool sizes, timeouts) are read by    │
//! │  DbConfig::from_env in pool.rs.                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every process sharing the database must use the same reference offset,
//! otherwise two processes disagree on "today" around midnight and draw from
//! different counters for the same terminal.

use std::str::FromStr;

use receipt_core::BusinessCalendar;
use serde::{Deserialize, Serialize};

use crate::allocator::LockStrategy;

/// Receipt numbering configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptConfig {
    /// Reference time zone as minutes east of UTC.
    pub utc_offset_minutes: i32,

    /// How the allocator serializes access to a counter.
    pub lock_strategy: LockStrategy,
}

impl Default for ReceiptConfig {
    fn default() -> Self {
        ReceiptConfig {
            utc_offset_minutes: 0,
            lock_strategy: LockStrategy::default(),
        }
    }
}

impl ReceiptConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = ReceiptConfig {
            utc_offset_minutes: parse_or(&lookup, "RECEIPT_UTC_OFFSET_MINUTES", 0)?,
            lock_strategy: parse_or(&lookup, "RECEIPT_LOCK_STRATEGY", LockStrategy::default())?,
        };

        // Reject offsets chrono cannot represent up front, not on first sale.
        config.calendar()?;

        Ok(config)
    }

    /// The business calendar for the configured offset.
    pub fn calendar(&self) -> Result<BusinessCalendar, ConfigError> {
        BusinessCalendar::from_offset_minutes(self.utc_offset_minutes).map_err(|_| {
            ConfigError::InvalidValue {
                key: "RECEIPT_UTC_OFFSET_MINUTES".to_string(),
                value: self.utc_offset_minutes.to_string(),
            }
        })
    }
}

/// Reads `key` through `lookup` and parses it, or returns `default` when unset.
pub(crate) fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

// =============================================================================
// Unit Tests
// =============================================================================
