//! # Error Types
//!
//! Domain-specific error types for receipt-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  receipt-core errors (this file)                                       │
//! │  └── CoreError        - Format invariants, parse failures,             │
//! │                         unknown stored column values                   │
//! │                                                                         │
//! │  receipt-db errors (separate crate)                                    │
//! │  └── DbError          - StorageUnavailable, LockTimeout, ...           │
//! │                         wraps CoreError via #[from]                    │
//! │                                                                         │
//! │  Flow: CoreError → DbError → Sale Persistence Transaction (aborts)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! None of these errors are retryable: they point at a defect or at bad
//! input, never at contention.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Receipt-number domain errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// An input that upstream contracts guarantee was violated.
    ///
    /// ## When This Occurs
    /// - The counter store handed back a zero or negative value
    /// - A caller formatted a receipt with a non-positive counter
    ///
    /// Always a logic defect, never a runtime condition. Fatal.
    #[error("Receipt format invariant violated: {reason}")]
    FormatInvariantViolation { reason: String },

    /// A string does not have the `T<n>-R-<YYYYMMDD>-<NNNN>` shape.
    #[error("Malformed receipt number '{input}': {reason}")]
    MalformedReceiptNumber { input: String, reason: String },

    /// A terminal display number outside 1..=999.
    #[error("Terminal number {0} is outside 1..=999")]
    TerminalNumberOutOfRange(u32),

    /// A sequence key that is not 20 lowercase hex characters.
    #[error("Malformed sequence key '{0}'")]
    MalformedSequenceKey(String),

    /// A reference time zone offset chrono cannot represent.
    #[error("Invalid UTC offset: {minutes} minutes")]
    InvalidUtcOffset { minutes: i32 },

    /// A stored column holds a value no enum variant maps to.
    ///
    /// Points at a row written outside this crate, not at a receipt defect.
    #[error("Unknown {column} value '{value}'")]
    UnknownColumnValue { column: &'static str, value: String },
}

impl CoreError {
    /// Creates a FormatInvariantViolation with the given reason.
    pub fn invariant(reason: impl Into<String>) -> Self {
        CoreError::FormatInvariantViolation {
            reason: reason.into(),
        }
    }

    /// Creates an UnknownColumnValue error.
    pub fn unknown_value(column: &'static str, value: impl Into<String>) -> Self {
        CoreError::UnknownColumnValue {
            column,
            value: value.into(),
        }
    }

    /// Creates a MalformedReceiptNumber error.
    pub fn malformed(input: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::MalformedReceiptNumber {
            input: input.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::invariant("counter must be positive, got 0");
        assert_eq!(
            err.to_string(),
            "Receipt format invariant violated: counter must be positive, got 0"
        );

        let err = CoreError::malformed("X1-R-20251117-0001", "missing 'T' prefix");
        assert_eq!(
            err.to_string(),
            "Malformed receipt number 'X1-R-20251117-0001': missing 'T' prefix"
        );
    }

    #[test]
    fn test_terminal_range_message() {
        let err = CoreError::TerminalNumberOutOfRange(1000);
        assert_eq!(err.to_string(), "Terminal number 1000 is outside 1..=999");
    }

    #[test]
    fn test_unknown_column_value_message() {
        let err = CoreError::unknown_value("sales.status", "refunded");
        assert_eq!(err.to_string(), "Unknown sales.status value 'refunded'");
    }
}
