//! Decimal column types
//!
//! Every amount and percentage that crosses the SQLite boundary goes through
//! [`Money`] or [`Rate`]. Values are written as decimal text and decoded here,
//! in one place, with these rules:
//!
//! - `NULL` or blank text → zero
//! - INTEGER / REAL → converted exactly (REAL via its shortest representation)
//! - malformed text or BLOB → decode error (never a silent zero)

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Scale used for averages and percentages
pub const DECIMAL_PLACES: u32 = 2;

/// Round to [`DECIMAL_PLACES`], half away from zero
#[inline]
pub fn round(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

fn decode_decimal(value: ValueRef<'_>) -> FromSqlResult<Decimal> {
    match value {
        ValueRef::Null => Ok(Decimal::ZERO),
        ValueRef::Integer(i) => Ok(Decimal::from(i)),
        ValueRef::Real(f) => Decimal::from_f64(f).ok_or(FromSqlError::OutOfRange(f as i64)),
        ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes).map_err(|e| FromSqlError::Other(Box::new(e)))?;
            let text = text.trim();
            if text.is_empty() {
                return Ok(Decimal::ZERO);
            }
            Decimal::from_str(text).map_err(|e| FromSqlError::Other(Box::new(e)))
        }
        ValueRef::Blob(_) => Err(FromSqlError::InvalidType),
    }
}

macro_rules! decimal_column {
    ($name:ident) => {
        impl $name {
            pub const ZERO: $name = $name(Decimal::ZERO);

            pub fn new(value: Decimal) -> Self {
                Self(value)
            }

            pub fn value(&self) -> Decimal {
                self.0
            }

            pub fn is_positive(&self) -> bool {
                self.0 > Decimal::ZERO
            }
        }

        impl From<Decimal> for $name {
            fn from(value: Decimal) -> Self {
                Self(value)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(Decimal::from(value))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.0.to_string()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                decode_decimal(value).map(Self)
            }
        }
    };
}

/// Currency amount (order values, discounts, revenue)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

/// Percentage in the 0..=100 range, two decimal places
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rate(Decimal);

decimal_column!(Money);
decimal_column!(Rate);

impl Money {
    /// Mean of `total` over `count` items, zero when `count` is zero
    pub fn average(total: Money, count: i64) -> Money {
        if count == 0 {
            return Money::ZERO;
        }
        Money(round(total.0 / Decimal::from(count)))
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl Rate {
    /// `numerator / denominator * 100`, zero when the denominator is zero
    pub fn percent(numerator: i64, denominator: i64) -> Rate {
        if denominator == 0 {
            return Rate::ZERO;
        }
        let ratio = Decimal::from(numerator) * Decimal::ONE_HUNDRED / Decimal::from(denominator);
        Rate(round(ratio))
    }
}
