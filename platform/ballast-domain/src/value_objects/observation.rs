use crate::value_objects::price_point::PricePoint;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Quotes of every instrument that traded on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub quotes: BTreeMap<String, PricePoint>,
}

impl Observation {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            quotes: BTreeMap::new(),
        }
    }

    pub fn single(instrument_id: impl Into<String>, point: PricePoint) -> Self {
        let mut quotes = BTreeMap::new();
        quotes.insert(instrument_id.into(), point);
        Self {
            date: point.date,
            quotes,
        }
    }

    pub fn with_quote(mut self, instrument_id: impl Into<String>, point: PricePoint) -> Self {
        self.quotes.insert(instrument_id.into(), point);
        self
    }

    pub fn quote(&self, instrument_id: &str) -> Option<&PricePoint> {
        self.quotes.get(instrument_id)
    }

    pub fn close(&self, instrument_id: &str) -> Option<f64> {
        self.quote(instrument_id).and_then(PricePoint::usable_close)
    }

    pub fn valuation(&self, instrument_id: &str) -> Option<f64> {
        self.quote(instrument_id)
            .and_then(PricePoint::usable_valuation)
    }
}

/// Merges per-instrument series into one observation per distinct date, ascending.
///
/// A date present in only some series yields an observation quoting only those
/// instruments; the simulator keeps the previous price for the others. When a
/// series repeats a date, its later point wins.
pub fn align_series(series: &[(String, Vec<PricePoint>)]) -> Vec<Observation> {
    let mut by_date: BTreeMap<NaiveDate, Observation> = BTreeMap::new();
    for (instrument_id, points) in series {
        for point in points {
            by_date
                .entry(point.date)
                .or_insert_with(|| Observation::new(point.date))
                .quotes
                .insert(instrument_id.clone(), *point);
        }
    }
    by_date.into_values().collect()
}
