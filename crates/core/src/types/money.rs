//! Integer money amounts in minor currency units.
//!
//! All prices and totals are stored as whole cents in a `BIGINT` column.
//! Floating point never touches an amount; [`Money::display`] goes through
//! `rust_decimal` only to render the value for humans.

use core::fmt;
use core::iter::Sum;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An amount of money in minor currency units (e.g. cents).
///
/// The engine is single-currency, so no currency code is carried.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(transparent))]
pub struct Money(i64);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Create an amount from minor units.
    #[must_use]
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Amount in minor units.
    #[must_use]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Whether the amount is below zero.
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Checked addition; `None` on overflow.
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Checked multiplication by a quantity; `None` on overflow.
    #[must_use]
    pub const fn checked_mul(self, quantity: i64) -> Option<Self> {
        match self.0.checked_mul(quantity) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Format for display with two decimal places (e.g. `$25.00`).
    #[must_use]
    pub fn display(&self) -> String {
        format!("${}", Decimal::new(self.0, 2))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Self(iter.map(|m| m.0).sum())
    }
}

impl From<i64> for Money {
    fn from(minor: i64) -> Self {
        Self(minor)
    }
}
