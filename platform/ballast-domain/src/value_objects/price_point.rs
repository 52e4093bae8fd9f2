use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One traded day of a single instrument. Any field but the date may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close_price: Option<f64>,
    /// P/E ratio.
    pub valuation_metric: Option<f64>,
    pub market_cap: Option<f64>,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close_price: f64) -> Self {
        Self {
            date,
            close_price: Some(close_price),
            valuation_metric: None,
            market_cap: None,
        }
    }

    pub fn with_valuation(mut self, pe: f64) -> Self {
        self.valuation_metric = Some(pe);
        self
    }

    /// Close price, only when it is usable for marking and trading.
    pub fn usable_close(&self) -> Option<f64> {
        self.close_price.filter(|p| p.is_finite() && *p > 0.0)
    }

    pub fn usable_valuation(&self) -> Option<f64> {
        self.valuation_metric.filter(|v| v.is_finite() && *v > 0.0)
    }
}
