use crate::value_objects::observation::Observation;
use crate::value_objects::price_point::PricePoint;
use crate::value_objects::rate_point::RatePoint;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeriesReport {
    pub rows: usize,
    pub duplicates: usize,
    pub out_of_order: usize,
    pub missing_close: usize,
    pub missing_valuation: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub first_duplicate: Option<NaiveDate>,
    pub first_out_of_order: Option<NaiveDate>,
}

impl SeriesReport {
    pub fn is_clean(&self) -> bool {
        self.duplicates == 0 && self.out_of_order == 0
    }
}

/// Tracks row dates in file order. A date seen anywhere earlier is a
/// duplicate; a date before the previous row is out of order.
#[derive(Default)]
struct DateOrder {
    seen: BTreeSet<NaiveDate>,
    prev: Option<NaiveDate>,
}

impl DateOrder {
    fn observe(&mut self, report: &mut SeriesReport, date: NaiveDate) {
        if let Some(prev) = self.prev {
            if date < prev {
                report.out_of_order += 1;
                report.first_out_of_order.get_or_insert(date);
            }
        }
        self.prev = Some(date);
        if !self.seen.insert(date) {
            report.duplicates += 1;
            report.first_duplicate.get_or_insert(date);
        }
    }
}

/// Quality report for a series in the order it was received.
pub fn price_report(points: &[PricePoint]) -> SeriesReport {
    let mut report = SeriesReport {
        rows: points.len(),
        ..SeriesReport::default()
    };

    let mut order = DateOrder::default();
    for point in points {
        if point.usable_close().is_none() {
            report.missing_close += 1;
        }
        if point.usable_valuation().is_none() {
            report.missing_valuation += 1;
        }
        order.observe(&mut report, point.date);
        report.first_date = Some(report.first_date.map_or(point.date, |d| d.min(point.date)));
        report.last_date = Some(report.last_date.map_or(point.date, |d| d.max(point.date)));
    }

    report
}

/// Same checks as [`price_report`] for a rate series. A non-finite rate counts
/// as a missing value.
pub fn rate_report(points: &[RatePoint]) -> SeriesReport {
    let mut report = SeriesReport {
        rows: points.len(),
        ..SeriesReport::default()
    };

    let mut order = DateOrder::default();
    for point in points {
        if !point.annual_rate.is_finite() {
            report.missing_close += 1;
        }
        order.observe(&mut report, point.date);
        report.first_date = Some(report.first_date.map_or(point.date, |d| d.min(point.date)));
        report.last_date = Some(report.last_date.map_or(point.date, |d| d.max(point.date)));
    }

    report
}

/// Keeps observations within `[start, end]` (both inclusive, both optional).
pub fn clip_observations(
    observations: Vec<Observation>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Vec<Observation> {
    observations
        .into_iter()
        .filter(|obs| start.map_or(true, |s| obs.date >= s))
        .filter(|obs| end.map_or(true, |e| obs.date <= e))
        .collect()
}
