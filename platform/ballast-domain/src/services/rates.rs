use crate::repositories::rates::RateSource;
use crate::services::calendar::month_key;
use crate::value_objects::rate_point::RatePoint;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Same annual rate for every date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedRate(pub f64);

impl RateSource for FixedRate {
    fn annual_rate(&self, _date: NaiveDate) -> f64 {
        self.0
    }
}

/// Month-keyed rate table loaded once per run.
///
/// A month without its own entry uses the latest earlier month, then the
/// earliest later month, then `default_annual_rate` when the table is empty.
#[derive(Debug, Clone, Default)]
pub struct MonthlyRateTable {
    by_month: BTreeMap<(i32, u32), f64>,
    default_annual_rate: f64,
}

impl MonthlyRateTable {
    /// Later points for the same month overwrite earlier ones; non-finite rates are skipped.
    pub fn new(points: &[RatePoint], default_annual_rate: f64) -> Self {
        let by_month = points
            .iter()
            .filter(|p| p.annual_rate.is_finite())
            .map(|p| (month_key(p.date), p.annual_rate))
            .collect();
        Self {
            by_month,
            default_annual_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.by_month.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_month.is_empty()
    }

    pub fn lookup(&self, date: NaiveDate) -> f64 {
        let key = month_key(date);
        if let Some(rate) = self.by_month.get(&key) {
            return *rate;
        }
        if let Some((_, rate)) = self.by_month.range(..key).next_back() {
            return *rate;
        }
        if let Some((_, rate)) = self.by_month.range(key..).next() {
            return *rate;
        }
        self.default_annual_rate
    }
}

impl RateSource for MonthlyRateTable {
    fn annual_rate(&self, date: NaiveDate) -> f64 {
        self.lookup(date)
    }
}
