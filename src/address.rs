//! Arbitrary-precision addresses.
//!
//! Addresses come out of free-form diagnostic text as hex strings of any
//! length, so they are kept as `BigUint` rather than a native word. Derived
//! addresses are always new values.

use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use num_traits::{One, Zero};
use serde::{Serialize, Serializer};

use crate::error::AddressParseError;

/// An unsigned address of unbounded width.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(BigUint);

impl Address {
    pub fn zero() -> Self {
        Address(BigUint::zero())
    }

    /// Parse base-16 digits, with or without a `0x` prefix.
    pub fn parse_hex(text: &str) -> Result<Self, AddressParseError> {
        let trimmed = text.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AddressParseError(text.to_string()));
        }
        BigUint::parse_bytes(digits.as_bytes(), 16)
            .map(Address)
            .ok_or_else(|| AddressParseError(text.to_string()))
    }

    pub fn checked_sub(&self, delta: u64) -> Option<Self> {
        let delta = BigUint::from(delta);
        if delta > self.0 {
            None
        } else {
            Some(Address(&self.0 - delta))
        }
    }

    pub fn saturating_sub(&self, delta: u64) -> Self {
        self.checked_sub(delta).unwrap_or_else(Address::zero)
    }

    pub fn offset(&self, delta: u64) -> Self {
        Address(&self.0 + BigUint::from(delta))
    }

    pub fn next(&self) -> Self {
        Address(&self.0 + BigUint::one())
    }
}

impl From<u64> for Address {
    fn from(value: u64) -> Self {
        Address(BigUint::from(value))
    }
}

impl From<BigUint> for Address {
    fn from(value: BigUint) -> Self {
        Address(value)
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse_hex(s)
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// Renders as `0x` followed by unpadded lowercase hex, e.g. `0x0`, `0x1a2b3c`.
impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
