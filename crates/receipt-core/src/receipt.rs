//! # Number Formatter
//!
//! Builds and parses the printed receipt number.
//!
//! ## Format (bit-exact)
//! ```text
//!   T42-R-20251117-0007
//!   │ │  │ │        │
//!   │ │  │ │        └── counter, zero-padded to 4 digits
//!   │ │  │ │            (10000 and up keep their natural width)
//!   │ │  │ └─────────── business date, YYYYMMDD, reference time zone
//!   │ │  └──────────── literal "-R-"
//!   │ └─────────────── terminal number 1..=999, no leading zeros
//!   └───────────────── literal "T"
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::terminal::TerminalNumber;
use crate::COUNTER_PAD_WIDTH;

// =============================================================================
// Receipt Parts
// =============================================================================

/// The three components a receipt number is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReceiptParts {
    pub terminal_number: TerminalNumber,
    pub date: NaiveDate,
    pub counter: i64,
}

// =============================================================================
// Receipt Number
// =============================================================================

/// A formatted, immutable receipt number.
///
/// Only constructible through [`ReceiptNumber::format`] or parsing, so every
/// value is well formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReceiptNumber {
    text: String,
    parts: ReceiptParts,
}

impl ReceiptNumber {
    /// Composes `T<n>-R-<YYYYMMDD>-<counter>`.
    ///
    /// ## Errors
    /// `FormatInvariantViolation` when `counter < 1`; the counter store never
    /// hands out such a value, so this indicates a defect upstream.
    ///
    /// ## Example
    /// ```rust
    /// use chrono::NaiveDate;
    /// use receipt_core::{ReceiptNumber, TerminalNumber};
    ///
    /// let date = NaiveDate::from_ymd_opt(2025, 11, 17).unwrap();
    /// let n = ReceiptNumber::format(TerminalNumber::new(3).unwrap(), date, 12345).unwrap();
    /// assert_eq!(n.as_str(), "T3-R-20251117-12345");
    /// ```
    pub fn format(terminal_number: TerminalNumber, date: NaiveDate, counter: i64) -> CoreResult<Self> {
        if counter < 1 {
            return Err(CoreError::invariant(format!(
                "counter must be positive, got {counter}"
            )));
        }

        let text = format!(
            "T{}-R-{}-{:0width$}",
            terminal_number,
            date.format("%Y%m%d"),
            counter,
            width = COUNTER_PAD_WIDTH
        );

        Ok(ReceiptNumber {
            text,
            parts: ReceiptParts {
                terminal_number,
                date,
                counter,
            },
        })
    }

    /// Parses a receipt number back into its parts.
    pub fn parse(input: &str) -> CoreResult<ReceiptParts> {
        let rest = input
            .strip_prefix('T')
            .ok_or_else(|| CoreError::malformed(input, "missing 'T' prefix"))?;

        let (terminal, rest) = rest
            .split_once("-R-")
            .ok_or_else(|| CoreError::malformed(input, "missing '-R-' separator"))?;

        let (date, counter) = rest
            .split_once('-')
            .ok_or_else(|| CoreError::malformed(input, "missing counter separator"))?;

        Ok(ReceiptParts {
            terminal_number: parse_terminal(input, terminal)?,
            date: parse_date(input, date)?,
            counter: parse_counter(input, counter)?,
        })
    }

    /// Returns the printed text.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Returns the components this number was built from.
    #[inline]
    pub fn parts(&self) -> ReceiptParts {
        self.parts
    }

    /// Consumes the receipt number, returning the printed text.
    pub fn into_string(self) -> String {
        self.text
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn parse_terminal(input: &str, segment: &str) -> CoreResult<TerminalNumber> {
    if !is_digits(segment) || segment.len() > 3 || segment.starts_with('0') {
        return Err(CoreError::malformed(input, "terminal number must be 1-999 without leading zeros"));
    }
    let value: u16 = segment
        .parse()
        .map_err(|_| CoreError::malformed(input, "terminal number is not a number"))?;
    TerminalNumber::new(value).map_err(|e| CoreError::malformed(input, e.to_string()))
}

fn parse_date(input: &str, segment: &str) -> CoreResult<NaiveDate> {
    if segment.len() != 8 || !is_digits(segment) {
        return Err(CoreError::malformed(input, "date must be YYYYMMDD"));
    }
    NaiveDate::parse_from_str(segment, "%Y%m%d")
        .map_err(|_| CoreError::malformed(input, "date is not a calendar date"))
}

fn parse_counter(input: &str, segment: &str) -> CoreResult<i64> {
    if !is_digits(segment) || segment.len() < COUNTER_PAD_WIDTH {
        return Err(CoreError::malformed(input, "counter must have at least 4 digits"));
    }
    // Past four digits the counter is printed at its natural width, so a
    // leading zero there means the text was not produced by `format`.
    if segment.len() > COUNTER_PAD_WIDTH && segment.starts_with('0') {
        return Err(CoreError::malformed(input, "counter has excess zero padding"));
    }
    let counter: i64 = segment
        .parse()
        .map_err(|_| CoreError::malformed(input, "counter is out of range"))?;
    if counter < 1 {
        return Err(CoreError::malformed(input, "counter must be positive"));
    }
    Ok(counter)
}

impl fmt::Display for ReceiptNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for ReceiptNumber {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        let parts = ReceiptNumber::parse(s)?;
        ReceiptNumber::format(parts.terminal_number, parts.date, parts.counter)
    }
}

impl TryFrom<String> for ReceiptNumber {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ReceiptNumber> for String {
    fn from(number: ReceiptNumber) -> Self {
        number.text
    }
}

impl AsRef<str> for ReceiptNumber {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
