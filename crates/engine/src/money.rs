use std::{fmt, iter::Sum, ops::Add};

use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

/// Money amount represented as **integer minor units** (cents).
///
/// Every monetary value the engine persists (rates, totals, payments, cached
/// paid/remaining) is an `i64` of minor units. This wrapper is used where the
/// engine does arithmetic on them so overflow surfaces as an error instead of
/// wrapping.
///
/// ```rust
/// use engine::MoneyCents;
///
/// let amount = MoneyCents::new(150_000);
/// assert_eq!(amount.cents(), 150_000);
/// assert_eq!(amount.to_string(), "1500.00");
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
#[repr(transparent)]
pub struct MoneyCents(i64);

impl MoneyCents {
    pub const ZERO: MoneyCents = MoneyCents(0);

    #[must_use]
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Addition that reports overflow as [`EngineError::InvalidAmount`].
    pub fn try_add(self, rhs: MoneyCents) -> ResultEngine<MoneyCents> {
        self.0
            .checked_add(rhs.0)
            .map(MoneyCents)
            .ok_or_else(|| EngineError::InvalidAmount("amount too large".to_string()))
    }

    /// Multiplies a unit rate by a count of units (days, weeks, months).
    pub fn try_times(self, units: i64) -> ResultEngine<MoneyCents> {
        self.0
            .checked_mul(units)
            .map(MoneyCents)
            .ok_or_else(|| EngineError::InvalidAmount("amount too large".to_string()))
    }

    /// Renders the amount followed by a currency label, e.g. `"1500.00 MAD"`.
    #[must_use]
    pub fn with_currency(self, code: &str) -> String {
        format!("{self} {code}")
    }
}

impl fmt::Display for MoneyCents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl From<i64> for MoneyCents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<MoneyCents> for i64 {
    fn from(value: MoneyCents) -> Self {
        value.0
    }
}

impl Add for MoneyCents {
    type Output = MoneyCents;

    fn add(self, rhs: MoneyCents) -> Self::Output {
        MoneyCents(self.0 + rhs.0)
    }
}

impl Sum for MoneyCents {
    fn sum<I: Iterator<Item = MoneyCents>>(iter: I) -> Self {
        iter.fold(MoneyCents::ZERO, Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_two_decimals() {
        assert_eq!(MoneyCents::new(0).to_string(), "0.00");
        assert_eq!(MoneyCents::new(7).to_string(), "0.07");
        assert_eq!(MoneyCents::new(30_050).to_string(), "300.50");
        assert_eq!(MoneyCents::new(-1050).to_string(), "-10.50");
        assert_eq!(MoneyCents::new(30_000).with_currency("MAD"), "300.00 MAD");
    }

    #[test]
    fn checked_arithmetic_reports_overflow() {
        assert_eq!(
            MoneyCents::new(30_000).try_times(3).unwrap(),
            MoneyCents::new(90_000)
        );
        assert!(MoneyCents::new(i64::MAX).try_times(2).is_err());
        assert!(MoneyCents::new(i64::MAX).try_add(MoneyCents::new(1)).is_err());
    }

    #[test]
    fn sums_amounts() {
        let total: MoneyCents = [100, 250, 650].into_iter().map(MoneyCents::new).sum();
        assert_eq!(total.cents(), 1000);
    }
}
