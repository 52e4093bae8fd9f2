use ballast_domain::repositories::rates::{RateQuery, RateRepository};
use ballast_domain::services::calendar::parse_date;
use ballast_domain::services::series::{rate_report, SeriesReport};
use ballast_domain::value_objects::rate_point::RatePoint;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct RateRecord {
    pub date: String,
    #[serde(alias = "rate")]
    pub annual_rate: f64,
}

/// Reads `date,annual_rate` with rates as decimal fractions. Rows are returned
/// date-sorted; when a date repeats the last row wins.
pub fn load_csv(path: &Path) -> Result<(Vec<RatePoint>, SeriesReport), String> {
    let file = File::open(path)
        .map_err(|err| format!("failed to open rates CSV {}: {}", path.display(), err))?;
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);

    let mut raw = Vec::new();
    for (line, result) in reader.deserialize::<RateRecord>().enumerate() {
        let record = result.map_err(|err| format!("failed to parse rates row: {}", err))?;
        let date = parse_date(&record.date)
            .map_err(|err| format!("{} row {}: {err}", path.display(), line + 1))?;
        raw.push(RatePoint {
            date,
            annual_rate: record.annual_rate,
        });
    }

    let report = rate_report(&raw);
    let by_date: BTreeMap<NaiveDate, RatePoint> = raw.into_iter().map(|p| (p.date, p)).collect();
    let points: Vec<RatePoint> = by_date.into_values().collect();
    metrics::counter!("ballast.rates.rows").increment(report.rows as u64);
    Ok((points, report))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemRateRepository;

impl FilesystemRateRepository {
    pub fn new() -> Self {
        Self
    }
}

impl RateRepository for FilesystemRateRepository {
    fn load_rates(&self, query: &RateQuery) -> Result<(Vec<RatePoint>, SeriesReport), String> {
        load_csv(Path::new(&query.location))
    }
}
