use ballast_domain::repositories::market_data::{PriceQuery, PriceRepository};
use ballast_domain::services::calendar::parse_date;
use ballast_domain::services::series::{price_report, SeriesReport};
use ballast_domain::value_objects::price_point::PricePoint;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

/// One CSV row. Empty cells are missing values.
#[derive(Debug, Deserialize)]
pub struct PriceRecord {
    pub date: String,
    #[serde(alias = "close_price")]
    pub close: Option<f64>,
    #[serde(default, alias = "pe_ratio", alias = "valuation_metric")]
    pub pe: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
}

/// Reads `date,close[,pe][,market_cap]` and returns the series sorted by date.
/// The report describes the file as written; when a date repeats the last row wins.
pub fn load_csv(path: &Path) -> Result<(Vec<PricePoint>, SeriesReport), String> {
    let file = File::open(path)
        .map_err(|err| format!("failed to open price CSV {}: {}", path.display(), err))?;
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);

    let mut raw = Vec::new();
    for (line, result) in reader.deserialize::<PriceRecord>().enumerate() {
        let record = result.map_err(|err| format!("failed to parse CSV row: {}", err))?;
        let date = parse_date(&record.date)
            .map_err(|err| format!("{} row {}: {err}", path.display(), line + 1))?;
        raw.push(PricePoint {
            date,
            close_price: record.close,
            valuation_metric: record.pe,
            market_cap: record.market_cap,
        });
    }

    let report = price_report(&raw);
    let by_date: BTreeMap<NaiveDate, PricePoint> = raw.into_iter().map(|p| (p.date, p)).collect();
    let points: Vec<PricePoint> = by_date.into_values().collect();

    metrics::counter!("ballast.market_data.rows").increment(report.rows as u64);
    if !report.is_clean() {
        tracing::warn!(
            path = %path.display(),
            duplicates = report.duplicates,
            out_of_order = report.out_of_order,
            "price file needed canonicalization"
        );
    }
    Ok((points, report))
}

/// Price series stored as one CSV file per instrument.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemPriceRepository;

impl FilesystemPriceRepository {
    pub fn new() -> Self {
        Self
    }
}

impl PriceRepository for FilesystemPriceRepository {
    fn load_prices(&self, query: &PriceQuery) -> Result<(Vec<PricePoint>, SeriesReport), String> {
        load_csv(Path::new(&query.location))
            .map_err(|err| format!("{}: {err}", query.instrument_id))
    }
}
