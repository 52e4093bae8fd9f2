use crate::services::series::SeriesReport;
use crate::value_objects::rate_point::RatePoint;
use chrono::NaiveDate;

/// Supplies interest rates by date. Lookups are by calendar month; any fallback for
/// months without data is the implementation's business, not the caller's.
pub trait RateSource {
    /// Annual rate as a decimal fraction.
    fn annual_rate(&self, date: NaiveDate) -> f64;

    fn monthly_rate(&self, date: NaiveDate) -> f64 {
        self.annual_rate(date) / 12.0
    }
}

#[derive(Debug, Clone)]
pub struct RateQuery {
    pub location: String,
}

pub trait RateRepository {
    fn load_rates(&self, query: &RateQuery) -> Result<(Vec<RatePoint>, SeriesReport), String>;
}
