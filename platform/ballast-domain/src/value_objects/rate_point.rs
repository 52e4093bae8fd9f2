use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Annual rate observed for the calendar month containing `date`.
/// `annual_rate` is a decimal fraction (0.03 = 3%).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatePoint {
    pub date: NaiveDate,
    pub annual_rate: f64,
}
