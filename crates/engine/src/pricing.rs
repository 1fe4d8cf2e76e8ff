//! Booking price estimation.
//!
//! A booking is billed per started day, with optional monthly (30 days) and
//! weekly (7 days) tiers applied greedily from the largest block down. A total
//! given explicitly by the agent wins over the computed one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EngineError, MoneyCents, ResultEngine};

const SECONDS_PER_DAY: i64 = 86_400;
const DAYS_PER_WEEK: i64 = 7;
const DAYS_PER_MONTH: i64 = 30;

/// Unit rates in minor units. A missing or zero tier rate disables the tier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rates {
    pub per_day_minor: i64,
    pub per_week_minor: Option<i64>,
    pub per_month_minor: Option<i64>,
}

impl Rates {
    #[must_use]
    pub fn daily(per_day_minor: i64) -> Self {
        Self {
            per_day_minor,
            per_week_minor: None,
            per_month_minor: None,
        }
    }

    #[must_use]
    pub fn per_week(mut self, per_week_minor: i64) -> Self {
        self.per_week_minor = Some(per_week_minor);
        self
    }

    #[must_use]
    pub fn per_month(mut self, per_month_minor: i64) -> Self {
        self.per_month_minor = Some(per_month_minor);
        self
    }

    pub(crate) fn validate(&self) -> ResultEngine<()> {
        let negative = [
            Some(self.per_day_minor),
            self.per_week_minor,
            self.per_month_minor,
        ]
        .into_iter()
        .flatten()
        .any(|rate| rate < 0);
        if negative {
            return Err(EngineError::InvalidAmount("rates must be >= 0".to_string()));
        }
        Ok(())
    }

    /// Prices `days` billable days.
    pub fn price_days(&self, days: i64) -> ResultEngine<MoneyCents> {
        let mut left = days;
        let mut total = MoneyCents::ZERO;

        if let Some(rate) = self.per_month_minor.filter(|r| *r > 0) {
            let months = left / DAYS_PER_MONTH;
            total = total.try_add(MoneyCents::new(rate).try_times(months)?)?;
            left -= months * DAYS_PER_MONTH;
        }
        if let Some(rate) = self.per_week_minor.filter(|r| *r > 0) {
            let weeks = left / DAYS_PER_WEEK;
            total = total.try_add(MoneyCents::new(rate).try_times(weeks)?)?;
            left -= weeks * DAYS_PER_WEEK;
        }
        total.try_add(MoneyCents::new(self.per_day_minor).try_times(left)?)
    }
}

/// Number of started days in the period, never less than one.
pub fn billable_days(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let seconds = (end - start).num_seconds();
    if seconds <= 0 {
        return 1;
    }
    ((seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY).max(1)
}

/// Result of pricing a booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub days: i64,
    pub total_minor: i64,
}

/// Prices a booking period. `explicit_total_minor` takes precedence over the
/// tiered computation.
pub fn quote(
    rates: &Rates,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    explicit_total_minor: Option<i64>,
) -> ResultEngine<Quote> {
    rates.validate()?;
    let days = billable_days(start, end);
    let total_minor = match explicit_total_minor {
        Some(total) if total < 0 => {
            return Err(EngineError::InvalidAmount("total must be >= 0".to_string()));
        }
        Some(total) => total,
        None => rates.price_days(days)?.cents(),
    };
    Ok(Quote { days, total_minor })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn partial_days_round_up() {
        assert_eq!(billable_days(at(1, 10), at(4, 10)), 3);
        assert_eq!(billable_days(at(1, 10), at(4, 11)), 4);
        assert_eq!(billable_days(at(1, 10), at(1, 12)), 1);
        assert_eq!(billable_days(at(1, 10), at(1, 10)), 1);
    }

    #[test]
    fn three_days_at_daily_rate() {
        let q = quote(&Rates::daily(30_000), at(1, 10), at(4, 10), None).unwrap();
        assert_eq!(q, Quote { days: 3, total_minor: 90_000 });
    }

    #[test]
    fn ten_days_uses_week_then_days() {
        let rates = Rates::daily(30_000).per_week(180_000);
        let start = at(1, 9);
        let q = quote(&rates, start, start + Duration::days(10), None).unwrap();
        assert_eq!(q.total_minor, 180_000 + 3 * 30_000);
    }

    #[test]
    fn forty_days_uses_month_week_and_days() {
        let rates = Rates::daily(30_000).per_week(180_000).per_month(600_000);
        let start = at(1, 9);
        let q = quote(&rates, start, start + Duration::days(40), None).unwrap();
        // 30 + 7 + 3
        assert_eq!(q.total_minor, 600_000 + 180_000 + 3 * 30_000);
    }

    #[test]
    fn zero_tier_rate_disables_the_tier() {
        let rates = Rates::daily(10_000).per_week(0);
        let start = at(1, 9);
        let q = quote(&rates, start, start + Duration::days(8), None).unwrap();
        assert_eq!(q.total_minor, 80_000);
    }

    #[test]
    fn explicit_total_wins() {
        let q = quote(&Rates::daily(30_000), at(1, 10), at(4, 10), Some(75_000)).unwrap();
        assert_eq!(q.total_minor, 75_000);
    }

    #[test]
    fn negative_values_are_rejected() {
        assert!(matches!(
            quote(&Rates::daily(-1), at(1, 10), at(2, 10), None),
            Err(EngineError::InvalidAmount(_))
        ));
        assert!(matches!(
            quote(&Rates::daily(100), at(1, 10), at(2, 10), Some(-5)),
            Err(EngineError::InvalidAmount(_))
        ));
    }
}
