//! Value Objects for the storefront

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;

/// Money in whole currency units (rupees). There is no fractional subunit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn new(amount: u64) -> Self { Self(amount) }
    pub const fn amount(&self) -> u64 { self.0 }

    pub fn add(&self, other: Money) -> Money { Money(self.0.saturating_add(other.0)) }
    pub fn multiply(&self, qty: Quantity) -> Money { Money(self.0.saturating_mul(u64::from(qty.value()))) }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self { iter.fold(Money::ZERO, |acc, m| acc.add(m)) }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Rs. {}", self.0) }
}

/// Cart line quantity, always within `1..=99`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u8);

impl Quantity {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 99;

    /// Clamps `value` to the upper bound. Zero has no quantity.
    pub fn clamped(value: u32) -> Option<Self> {
        if value < Self::MIN { return None; }
        // MAX fits in a u8
        Some(Self(value.min(Self::MAX) as u8))
    }

    pub fn one() -> Self { Self(1) }
    pub fn value(&self) -> u32 { u32::from(self.0) }

    /// Adds `more`, saturating at the upper bound.
    pub fn increment(&self, more: u32) -> Self {
        Self(self.value().saturating_add(more).min(Self::MAX) as u8)
    }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;
    fn try_from(value: u32) -> Result<Self, Self::Error> { Self::clamped(value).ok_or(QuantityError::Zero) }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> u32 { q.value() }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuantityError {
    #[error("quantity must be at least 1")]
    Zero,
}

/// Payment transaction reference supplied by the shopper or collected by staff.
///
/// Always trimmed and never empty, so "absent" is expressed as `Option::None`
/// rather than a blank string.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(value: impl AsRef<str>) -> Result<Self, TransactionIdError> {
        let value = value.as_ref().trim();
        if value.is_empty() { return Err(TransactionIdError::Blank); }
        Ok(Self(value.to_string()))
    }

    /// Blank input is treated as "no transaction id".
    pub fn parse_optional(value: Option<&str>) -> Option<Self> { value.and_then(|v| Self::new(v).ok()) }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for TransactionId {
    type Error = TransactionIdError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<TransactionId> for String {
    fn from(id: TransactionId) -> String { id.0 }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransactionIdError {
    #[error("transaction id must not be blank")]
    Blank,
}
