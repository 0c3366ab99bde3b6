//! # receipt-core: Pure Receipt-Number Logic
//!
//! Everything about a receipt number that can be computed without touching
//! shared state lives here: the display terminal number, the short key that
//! names a counter, the printed format and the business calendar.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Receipt Number Data Flow                             │
//! │                                                                         │
//! │  Sale Persistence Transaction (receipt-db)                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               ★ receipt-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │ calendar  │  │ sequence  │  │ terminal  │  │  receipt  │  │   │
//! │  │   │ date in   │─►│ (tenant,  │  │ id → 1-999│─►│ T42-R-... │  │   │
//! │  │   │ ref. zone │  │ store,..) │  │           │  │           │  │   │
//! │  │   └───────────┘  └─────┬─────┘  └───────────┘  └─────▲─────┘  │   │
//! │  └────────────────────────┼──────────────────────────────┼────────┘   │
//! │                           ▼                              │            │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │      receipt-db: Counter Allocator (lock, create, increment)    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`terminal`] - Terminal Identity Hasher (display number 1-999)
//! - [`sequence`] - Sequence Key Deriver (counter name + lock id)
//! - [`receipt`] - Number Formatter and parser
//! - [`calendar`] - Clock abstraction and reference time zone
//! - [`types`] - Sale, line item and payment records
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::NaiveDate;
//! use receipt_core::{ReceiptNumber, TerminalNumber};
//!
//! let date = NaiveDate::from_ymd_opt(2025, 11, 17).unwrap();
//! let terminal = TerminalNumber::new(42).unwrap();
//!
//! let receipt = ReceiptNumber::format(terminal, date, 7).unwrap();
//! assert_eq!(receipt.as_str(), "T42-R-20251117-0007");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod calendar;
pub mod error;
pub mod receipt;
pub mod sequence;
pub mod terminal;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use calendar::{BusinessCalendar, Clock, FixedClock, SystemClock};
pub use error::{CoreError, CoreResult};
pub use receipt::{ReceiptNumber, ReceiptParts};
pub use sequence::SequenceKey;
pub use terminal::{terminal_number, TerminalNumber};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Size of the terminal display-number space (numbers run 1..=999).
pub const TERMINAL_NUMBER_SPACE: u16 = 999;

/// Minimum width of the counter segment; larger values keep their natural width.
pub const COUNTER_PAD_WIDTH: usize = 4;

/// Length in characters of a [`SequenceKey`] (lowercase hex).
pub const SEQUENCE_KEY_LEN: usize = 20;

/// Prefix of the durable counter object named after a [`SequenceKey`].
pub const COUNTER_NAME_PREFIX: &str = "receipt_seq_";

/// Longest identifier the counter store accepts.
///
/// PostgreSQL truncates identifiers at NAMEDATALEN - 1 = 63 bytes; names built
/// from full UUIDs plus a date blow straight through it.
pub const MAX_COUNTER_NAME_LEN: usize = 63;
