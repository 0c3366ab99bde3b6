//! # Terminal Identity Hasher
//!
//! Compresses a terminal's UUID into the short number printed at the front of
//! every receipt (`T42-...`).
//!
//! ## Display Only
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  terminal_id (UUID, 128 bits)                                           │
//! │       │                                                                 │
//! │       ├──► SHA-256 → first 8 bytes → u64 % 999 + 1 ──► T<1..=999>       │
//! │       │         (lossy: two terminals may print the same T<n>)          │
//! │       │                                                                 │
//! │       └──► SequenceKey (full UUID) ──► the counter that keeps           │
//! │                                        receipt numbers unique           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! SHA-256 is used instead of `std::hash` because the number is printed on
//! paper: it must never change between releases or platforms.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::TERMINAL_NUMBER_SPACE;

// =============================================================================
// Terminal Number
// =============================================================================

/// A terminal's display number, always in `1..=999`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct TerminalNumber(u16);

impl TerminalNumber {
    /// Creates a terminal number, rejecting 0 and anything above 999.
    pub fn new(value: u16) -> CoreResult<Self> {
        if value == 0 || value > TERMINAL_NUMBER_SPACE {
            return Err(CoreError::TerminalNumberOutOfRange(u32::from(value)));
        }
        Ok(TerminalNumber(value))
    }

    /// Returns the raw number.
    #[inline]
    pub const fn get(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for TerminalNumber {
    type Error = CoreError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        TerminalNumber::new(value)
    }
}

impl From<TerminalNumber> for u16 {
    fn from(number: TerminalNumber) -> Self {
        number.0
    }
}

impl fmt::Display for TerminalNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // No leading zeros: T7, T42, T999
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Hasher
// =============================================================================

/// Derives the display number for a terminal.
///
/// Pure and deterministic. Must not be relied upon for uniqueness.
///
/// ## Example
/// ```rust
/// use receipt_core::terminal_number;
/// use uuid::Uuid;
///
/// let id = Uuid::parse_str("936da01f-9abd-4d9d-80c7-02af85c822a8").unwrap();
/// assert_eq!(terminal_number(&id).get(), 95);
/// ```
pub fn terminal_number(terminal_id: &Uuid) -> TerminalNumber {
    let digest = Sha256::digest(terminal_id.as_bytes());

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    let hash = u64::from_be_bytes(prefix);

    // hash % 999 < 999, so the +1 keeps the result inside 1..=999
    let value = (hash % u64::from(TERMINAL_NUMBER_SPACE)) as u16 + 1;
    TerminalNumber(value)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn uuid(s: &str) -> Uuid {
        Uuid::parse_str(s).unwrap()
    }

    #[test]
    fn test_known_terminal_numbers() {
        assert_eq!(terminal_number(&Uuid::nil()).get(), 997);
        assert_eq!(
            terminal_number(&uuid("a1a2a3a4-b1b2-c1c2-d1d2-d3d4d5d6d7d8")).get(),
            308
        );
        assert_eq!(
            terminal_number(&uuid("936da01f-9abd-4d9d-80c7-02af85c822a8")).get(),
            95
        );
    }

    #[test]
    fn test_terminal_number_is_deterministic() {
        let id = Uuid::new_v4();
        assert_eq!(terminal_number(&id), terminal_number(&id));
    }

    #[test]
    fn test_terminal_number_stays_in_range() {
        for _ in 0..2_000 {
            let n = terminal_number(&Uuid::new_v4()).get();
            assert!((1..=999).contains(&n), "out of range: {n}");
        }
    }

    #[test]
    fn test_new_rejects_out_of_range() {
        assert!(TerminalNumber::new(0).is_err());
        assert!(TerminalNumber::new(1000).is_err());
        assert_eq!(TerminalNumber::new(1).unwrap().get(), 1);
        assert_eq!(TerminalNumber::new(999).unwrap().get(), 999);
    }

    #[test]
    fn test_display_has_no_leading_zeros() {
        assert_eq!(TerminalNumber::new(7).unwrap().to_string(), "7");
        assert_eq!(TerminalNumber::new(42).unwrap().to_string(), "42");
    }

    #[test]
    fn test_serde_rejects_zero() {
        let parsed: Result<TerminalNumber, _> = serde_json::from_str("0");
        assert!(parsed.is_err());

        let parsed: TerminalNumber = serde_json::from_str("42").unwrap();
        assert_eq!(parsed.get(), 42);
    }
}
