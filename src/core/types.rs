use super::error::{HistoryError, Result};
use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const KEY_LENGTH: usize = 20;

/// Address-like identifier of a singleton record slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey([u8; KEY_LENGTH]);

impl RecordKey {
    pub const fn new(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Parse a `0x`-prefixed (or bare) 40 character hex string.
    pub fn from_hex(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.len() != KEY_LENGTH * 2 {
            return Err(HistoryError::InvalidKey(format!(
                "expected {} hex digits, got {} in '{}'",
                KEY_LENGTH * 2,
                digits.len(),
                input
            )));
        }

        let mut bytes = [0u8; KEY_LENGTH];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| HistoryError::InvalidKey(format!("'{}': {}", input, e)))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for RecordKey {
    type Err = HistoryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

/// The deployment-wide statistics record for one tracked token.
///
/// `name`, `symbol` and `total_supply` are a snapshot taken when the record
/// is first created. The counters belong to event handlers and only change
/// through the mutators below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateRecord {
    pub key: RecordKey,
    pub name: String,
    pub symbol: String,
    pub total_supply: BigInt,
    pub transfer_count: BigInt,
    pub holder_count: BigInt,
    pub address_count: BigInt,
}

impl AggregateRecord {
    /// Build a fresh record with all counters at zero.
    pub fn new(key: RecordKey, name: String, symbol: String, total_supply: BigInt) -> Self {
        Self {
            key,
            name,
            symbol,
            total_supply,
            transfer_count: BigInt::zero(),
            holder_count: BigInt::zero(),
            address_count: BigInt::zero(),
        }
    }

    pub fn record_transfer(&mut self) {
        self.transfer_count += 1u32;
    }

    pub fn holder_gained(&mut self) {
        self.holder_count += 1u32;
    }

    /// Decrement the holder count, never going below zero.
    pub fn holder_lost(&mut self) {
        if self.holder_count.is_positive() {
            self.holder_count -= 1u32;
        }
    }

    pub fn address_discovered(&mut self) {
        self.address_count += 1u32;
    }

    pub fn counters_are_zero(&self) -> bool {
        self.transfer_count.is_zero() && self.holder_count.is_zero() && self.address_count.is_zero()
    }
}

/// Reference to the transaction that triggered an access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRef {
    pub hash: String,
    pub index: Option<u64>,
}

/// Optional caller context for an access.
///
/// Carried for tracing only; record creation never reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationContext {
    pub transaction: Option<TransactionRef>,
    pub block: Option<u64>,
}

impl InvocationContext {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_transaction(mut self, hash: &str) -> Self {
        self.transaction = Some(TransactionRef { hash: hash.to_string(), index: None });
        self
    }

    pub fn with_block(mut self, block: u64) -> Self {
        self.block = Some(block);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "0x6b175474e89094c44da98b954eedeac495271d0f";

    #[test]
    fn test_key_parse_and_display() {
        let key = RecordKey::from_hex(TOKEN).unwrap();
        assert_eq!(key.to_string(), TOKEN);

        let bare: RecordKey = TOKEN.trim_start_matches("0x").parse().unwrap();
        assert_eq!(bare, key);

        let upper = RecordKey::from_hex(&TOKEN.to_uppercase().replacen("0X", "0x", 1)).unwrap();
        assert_eq!(upper, key);
    }

    #[test]
    fn test_key_rejects_bad_input() {
        assert!(matches!(RecordKey::from_hex("0x1234"), Err(HistoryError::InvalidKey(_))));
        assert!(matches!(
            RecordKey::from_hex("0xzz175474e89094c44da98b954eedeac495271d0f"),
            Err(HistoryError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_new_record_has_zero_counters() {
        let record = AggregateRecord::new(
            RecordKey::new([7; KEY_LENGTH]),
            "Token".to_string(),
            "TKN".to_string(),
            BigInt::from(1_000_000u64),
        );
        assert!(record.counters_are_zero());
        assert_eq!(record.total_supply, BigInt::from(1_000_000u64));
    }

    #[test]
    fn test_counter_mutators() {
        let mut record = AggregateRecord::new(
            RecordKey::new([1; KEY_LENGTH]),
            "Token".to_string(),
            "TKN".to_string(),
            BigInt::from(10),
        );
        record.record_transfer();
        record.record_transfer();
        record.holder_gained();
        record.holder_lost();
        record.holder_lost();
        record.address_discovered();

        assert_eq!(record.transfer_count, BigInt::from(2));
        assert_eq!(record.holder_count, BigInt::zero());
        assert_eq!(record.address_count, BigInt::from(1));
        assert_eq!(record.total_supply, BigInt::from(10));
    }
}
