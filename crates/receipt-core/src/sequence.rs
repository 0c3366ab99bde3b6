//! # Sequence Key Deriver
//!
//! Names the counter a receipt number is drawn from.
//!
//! ## Why a Digest
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Naive name (BROKEN):                                                   │
//! │    seq_<tenant uuid>_<store uuid>_<terminal uuid>_20251117              │
//! │    = 4 + 36 + 1 + 36 + 1 + 36 + 1 + 8 = 123 chars                       │
//! │    PostgreSQL silently truncates identifiers at 63 bytes, so two        │
//! │    terminals of the same store collapse onto ONE counter.               │
//! │                                                                         │
//! │  Digest name (THIS MODULE):                                             │
//! │    SHA-256("tenant|store|terminal|YYYYMMDD") → first 10 bytes → hex     │
//! │    key          = 75cda21c5882e38fc994               (20 chars)         │
//! │    counter name = receipt_seq_75cda21c5882e38fc994   (32 chars)         │
//! │    lock id      = first 8 bytes of SHA-256(key) as i64                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! 80 bits of digest keeps accidental collisions between (tenant, store,
//! terminal, day) tuples negligible for the lifetime of the system.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::types::ReceiptScope;
use crate::{COUNTER_NAME_PREFIX, MAX_COUNTER_NAME_LEN, SEQUENCE_KEY_LEN};

// Compile-time guard: the counter name must fit the store's identifier limit.
const _: () = assert!(COUNTER_NAME_PREFIX.len() + SEQUENCE_KEY_LEN <= MAX_COUNTER_NAME_LEN);

/// Short, identifier-safe key of one counter scope: (tenant, store, terminal, day).
///
/// Recomputed on every allocation, never stored.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SequenceKey(String);

impl SequenceKey {
    /// Derives the key for a (tenant, store, terminal, date) tuple.
    ///
    /// Same four inputs, same key, on every call and every process.
    pub fn derive(tenant_id: &Uuid, store_id: &Uuid, terminal_id: &Uuid, date: NaiveDate) -> Self {
        let material = format!(
            "{}|{}|{}|{}",
            tenant_id,
            store_id,
            terminal_id,
            date.format("%Y%m%d")
        );
        let digest = Sha256::digest(material.as_bytes());
        SequenceKey(hex::encode(&digest[..SEQUENCE_KEY_LEN / 2]))
    }

    /// Derives the key for a terminal scope on the given business date.
    pub fn for_scope(scope: &ReceiptScope, date: NaiveDate) -> Self {
        SequenceKey::derive(&scope.tenant_id, &scope.store_id, &scope.terminal_id, date)
    }

    /// Returns the key text.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the durable counter object backing this key.
    ///
    /// Only lowercase hex follows the fixed prefix, so the name is safe to
    /// splice into DDL without quoting.
    pub fn counter_name(&self) -> String {
        format!("{}{}", COUNTER_NAME_PREFIX, self.0)
    }

    /// Id of the transaction-scoped lock guarding this key.
    ///
    /// Derived from the key, never a fixed value, so one terminal's traffic
    /// cannot stall another terminal's allocations.
    pub fn lock_id(&self) -> i64 {
        let digest = Sha256::digest(self.0.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        i64::from_be_bytes(prefix)
    }
}

impl fmt::Display for SequenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SequenceKey {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        let well_formed = s.len() == SEQUENCE_KEY_LEN
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));

        if !well_formed {
            return Err(CoreError::MalformedSequenceKey(s.to_string()));
        }
        Ok(SequenceKey(s.to_string()))
    }
}

impl TryFrom<String> for SequenceKey {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SequenceKey> for String {
    fn from(key: SequenceKey) -> Self {
        key.0
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const TENANT: &str = "00000000-0000-0000-0000-000000000001";
    const STORE: &str = "7d444840-9dc0-11d1-b245-5ffdce74fad2";
    const TERMINAL_X: &str = "a1a2a3a4-b1b2-c1c2-d1d2-d3d4d5d6d7d8";
    const TERMINAL_Y: &str = "936da01f-9abd-4d9d-80c7-02af85c822a8";

    fn uuid(s: &str) -> Uuid {
        Uuid::parse_str(s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn key_for(terminal: &str, day: NaiveDate) -> SequenceKey {
        SequenceKey::derive(&uuid(TENANT), &uuid(STORE), &uuid(terminal), day)
    }

    #[test]
    fn test_known_keys() {
        assert_eq!(
            key_for(TERMINAL_X, date(2025, 11, 17)).as_str(),
            "75cda21c5882e38fc994"
        );
        assert_eq!(
            key_for(TERMINAL_X, date(2025, 11, 18)).as_str(),
            "2ad352719bed24bd28c6"
        );
        assert_eq!(
            key_for(TERMINAL_Y, date(2025, 11, 17)).as_str(),
            "0d5bf7ff08fd299acd29"
        );
    }

    #[test]
    fn test_known_lock_ids() {
        assert_eq!(
            key_for(TERMINAL_X, date(2025, 11, 17)).lock_id(),
            7_242_800_117_551_723_964
        );
        assert_eq!(
            key_for(TERMINAL_Y, date(2025, 11, 17)).lock_id(),
            -1_904_234_712_301_602_800
        );
    }

    #[test]
    fn test_key_is_deterministic() {
        let day = date(2025, 11, 17);
        assert_eq!(key_for(TERMINAL_X, day), key_for(TERMINAL_X, day));
    }

    #[test]
    fn test_every_input_changes_the_key() {
        let day = date(2025, 11, 17);
        let base = key_for(TERMINAL_X, day);

        let other_tenant = SequenceKey::derive(&Uuid::new_v4(), &uuid(STORE), &uuid(TERMINAL_X), day);
        let other_store = SequenceKey::derive(&uuid(TENANT), &Uuid::new_v4(), &uuid(TERMINAL_X), day);

        assert_ne!(base, other_tenant);
        assert_ne!(base, other_store);
        assert_ne!(base, key_for(TERMINAL_Y, day));
        assert_ne!(base, key_for(TERMINAL_X, date(2025, 11, 18)));
    }

    #[test]
    fn test_counter_name_fits_identifier_limit() {
        let key = key_for(TERMINAL_X, date(2025, 11, 17));
        let name = key.counter_name();

        assert_eq!(name, "receipt_seq_75cda21c5882e38fc994");
        assert!(name.len() <= MAX_COUNTER_NAME_LEN);
        assert!(name.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_'));
    }

    #[test]
    fn test_parse_round_trip() {
        let key = key_for(TERMINAL_Y, date(2025, 11, 17));
        let parsed: SequenceKey = key.as_str().parse().unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn test_parse_rejects_unsafe_text() {
        assert!("".parse::<SequenceKey>().is_err());
        assert!("75CDA21C5882E38FC994".parse::<SequenceKey>().is_err());
        assert!("75cda21c5882e38fc99".parse::<SequenceKey>().is_err());
        assert!("x; DROP TABLE sales;".parse::<SequenceKey>().is_err());
    }
}
