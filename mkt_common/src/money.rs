use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const TZS_CURRENCY_CODE: &str = "TZS";
pub const TZS_CURRENCY_CODE_LOWER: &str = "tzs";

/// The number of minor units (cents) in one whole shilling.
pub const CENTS_PER_UNIT: i64 = 100;

//--------------------------------------       Money         ---------------------------------------------------------
/// A monetary amount in minor units (cents) of Tanzanian shillings.
///
/// All arithmetic in the checkout pipeline happens on this integer representation. Fractional values only appear at
/// the wire boundary (provider APIs and webhooks report amounts in whole units) and are converted with
/// [`Money::from_major_f64`] / [`Money::to_major_f64`].
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a monetary amount: {0}")]
pub struct MoneyConversionError(pub String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Money {}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MoneyConversionError(format!("Value {} is too large to convert to Money", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let units = self.0 as f64 / CENTS_PER_UNIT as f64;
        write!(f, "TSh {units:0.2}")
    }
}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    /// An amount of whole shillings.
    pub fn from_units(units: i64) -> Self {
        Self(units * CENTS_PER_UNIT)
    }

    /// Converts an amount expressed in whole units (e.g. `1500.50` TZS) into minor units, rounding half-up to the
    /// nearest cent.
    pub fn from_major_f64(value: f64) -> Result<Self, MoneyConversionError> {
        if !value.is_finite() {
            return Err(MoneyConversionError(format!("{value} is not a finite amount")));
        }
        let cents = (value * CENTS_PER_UNIT as f64).round();
        if cents.abs() > i64::MAX as f64 {
            return Err(MoneyConversionError(format!("{value} overflows the minor-unit representation")));
        }
        Ok(Self(cents as i64))
    }

    pub fn to_major_f64(&self) -> f64 {
        self.0 as f64 / CENTS_PER_UNIT as f64
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// The absolute difference between two amounts, in minor units.
    pub fn abs_diff(&self, other: Money) -> i64 {
        (self.0 - other.0).abs()
    }

    /// Rounds a fractional minor-unit value half-up, away from zero.
    ///
    /// This is the rounding rule for tax and discount amounts. It is applied exactly once per computed charge so
    /// repeated recomputation from the same inputs is stable.
    pub fn round_half_up(value: f64) -> Self {
        let rounded = if value >= 0.0 { (value + 0.5).floor() } else { (value - 0.5).ceil() };
        Self(rounded as i64)
    }

    /// Rounds a fractional minor-unit value to the nearest whole currency unit (used for shipping).
    pub fn round_to_unit(value: f64) -> Self {
        let units = (value / CENTS_PER_UNIT as f64).round() as i64;
        Self(units * CENTS_PER_UNIT)
    }
}
