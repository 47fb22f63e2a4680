use std::{fmt::Display, iter::Sum, ops::Add};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

/// Number of stored units in one bonus point.
pub const UNITS_PER_POINT: i64 = 100;

//--------------------------------------        Points        ---------------------------------------------------------
/// An amount of loyalty bonus, stored as an integer number of hundredths of a point.
///
/// The accrual service reports amounts as decimal JSON numbers (e.g. `729.98`). Use [`Points::from_decimal`] to convert
/// them; floating point values never touch the balance arithmetic.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Points(i64);

op!(Points => Add::add, Sub::sub);
op!(Points assign AddAssign::add_assign, SubAssign::sub_assign);
op!(Points neg);

impl Sum for Points {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("Value cannot be represented in points: {0}")]
pub struct PointsConversionError(String);

impl From<i64> for Points {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for Points {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per_point = UNITS_PER_POINT.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / per_point, abs % per_point)
    }
}

impl Points {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_points(points: i64) -> Self {
        Self(points * UNITS_PER_POINT)
    }

    /// Converts a decimal amount, rounding to the nearest hundredth.
    pub fn from_decimal(amount: f64) -> Result<Self, PointsConversionError> {
        if !amount.is_finite() {
            return Err(PointsConversionError(format!("{amount} is not a finite number")));
        }
        let units = (amount * UNITS_PER_POINT as f64).round();
        if units.abs() >= i64::MAX as f64 {
            return Err(PointsConversionError(format!("{amount} is too large")));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self(units as i64))
    }

    pub fn as_decimal(&self) -> f64 {
        self.0 as f64 / UNITS_PER_POINT as f64
    }
}
