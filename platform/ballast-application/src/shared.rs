use crate::config::Config;
use ballast_domain::repositories::market_data::{PriceQuery, PriceRepository};
use ballast_domain::repositories::rates::{RateQuery, RateRepository};
use ballast_domain::services::aggregator::AggregateOptions;
use ballast_domain::services::audit::AuditEvent;
use ballast_domain::services::calendar::parse_date;
use ballast_domain::services::rates::MonthlyRateTable;
use ballast_domain::services::series::{clip_observations, SeriesReport};
use ballast_domain::value_objects::observation::{align_series, Observation};
use ballast_domain::value_objects::rate_point::RatePoint;
use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use std::time::Instant;

pub const DEFAULT_OUT_DIR: &str = "runs";
pub const DEFAULT_MAX_CHART_POINTS: usize = 500;

pub fn resolve_date_range(config: &Config) -> Result<(Option<NaiveDate>, Option<NaiveDate>), String> {
    let start = config
        .run
        .start
        .as_deref()
        .map(parse_date)
        .transpose()
        .map_err(|err| format!("run.start: {err}"))?;
    let end = config
        .run
        .end
        .as_deref()
        .map(parse_date)
        .transpose()
        .map_err(|err| format!("run.end: {err}"))?;
    Ok((start, end))
}

pub fn default_annual_rate(config: &Config) -> f64 {
    config.data.default_annual_rate.unwrap_or(0.0)
}

pub fn aggregate_options(config: &Config) -> AggregateOptions {
    let report = config.report.as_ref();
    AggregateOptions {
        include_positions: report.and_then(|r| r.include_positions).unwrap_or(true),
        include_cash: report.and_then(|r| r.include_cash).unwrap_or(true),
        include_invested_amount: report
            .and_then(|r| r.include_invested_amount)
            .unwrap_or(true),
    }
}

pub fn include_control(config: &Config) -> bool {
    config
        .report
        .as_ref()
        .and_then(|r| r.include_control)
        .unwrap_or(true)
}

pub fn out_dir(config: &Config) -> String {
    config
        .report
        .as_ref()
        .and_then(|r| r.out_dir.clone())
        .unwrap_or_else(|| DEFAULT_OUT_DIR.to_string())
}

/// Everything a run reads, materialized and date-sorted before the simulation starts.
#[derive(Debug, Clone)]
pub struct MarketData {
    pub observations: Vec<Observation>,
    pub price_reports: Vec<(String, SeriesReport)>,
    pub rates: Vec<RatePoint>,
    pub rate_report: Option<SeriesReport>,
    pub timings: Vec<AuditEvent>,
}

impl MarketData {
    pub fn rate_table(&self, default_annual_rate: f64) -> MonthlyRateTable {
        MonthlyRateTable::new(&self.rates, default_annual_rate)
    }
}

pub fn load_market_data(
    config: &Config,
    prices: &dyn PriceRepository,
    rates: &dyn RateRepository,
) -> Result<MarketData, String> {
    let mut timings = Vec::new();
    let mut series = Vec::with_capacity(config.data.prices.len());
    let mut price_reports = Vec::with_capacity(config.data.prices.len());

    for source in &config.data.prices {
        let stage_start = Instant::now();
        let (points, report) = prices
            .load_prices(&PriceQuery {
                instrument_id: source.instrument_id.clone(),
                location: source.path.clone(),
            })
            .map_err(|err| format!("failed to load prices for {}: {err}", source.instrument_id))?;
        let elapsed = stage_start.elapsed();
        metrics::histogram!("ballast.backtest.load_prices_ms").record(elapsed.as_millis() as f64);
        timings.push(timing_event(
            &config.run.run_id,
            "load_prices",
            elapsed.as_millis() as u64,
            serde_json::json!({
                "instrument_id": source.instrument_id,
                "report": series_report_json(&report),
            }),
        ));
        tracing::debug!(
            instrument_id = %source.instrument_id,
            rows = points.len(),
            "loaded price series"
        );
        series.push((source.instrument_id.clone(), points));
        price_reports.push((source.instrument_id.clone(), report));
    }

    let (rate_points, rate_report) = match &config.data.rates_path {
        Some(path) => {
            let stage_start = Instant::now();
            let (points, report) = rates
                .load_rates(&RateQuery {
                    location: path.clone(),
                })
                .map_err(|err| format!("failed to load rates: {err}"))?;
            let elapsed = stage_start.elapsed();
            metrics::histogram!("ballast.backtest.load_rates_ms")
                .record(elapsed.as_millis() as f64);
            timings.push(timing_event(
                &config.run.run_id,
                "load_rates",
                elapsed.as_millis() as u64,
                serde_json::json!({ "report": series_report_json(&report) }),
            ));
            (points, Some(report))
        }
        None => (Vec::new(), None),
    };

    let (start, end) = resolve_date_range(config)?;
    let observations = clip_observations(align_series(&series), start, end);

    Ok(MarketData {
        observations,
        price_reports,
        rates: rate_points,
        rate_report,
        timings,
    })
}

pub fn series_report_json(report: &SeriesReport) -> serde_json::Value {
    serde_json::json!({
        "rows": report.rows,
        "duplicates": report.duplicates,
        "out_of_order": report.out_of_order,
        "missing_close": report.missing_close,
        "missing_valuation": report.missing_valuation,
        "first_date": report.first_date,
        "last_date": report.last_date,
        "first_duplicate": report.first_duplicate,
        "first_out_of_order": report.first_out_of_order,
    })
}

pub fn timing_event(
    run_id: &str,
    action: &str,
    duration_ms: u64,
    details: serde_json::Value,
) -> AuditEvent {
    AuditEvent {
        run_id: run_id.to_string(),
        date: None,
        stage: "timing".to_string(),
        action: action.to_string(),
        error: None,
        details: serde_json::json!({
            "duration_ms": duration_ms,
            "details": details,
        }),
    }
}

/// Short sha256 of the raw config text, stored with every run's results.
pub fn config_fingerprint(config_toml: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(config_toml.as_bytes());
    let bytes = hasher.finalize();
    to_hex_short(&bytes[..], 16)
}

fn to_hex_short(bytes: &[u8], chars: usize) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(chars);
    for b in bytes {
        out.push(HEX[(b >> 4) as usize] as char);
        if out.len() >= chars {
            break;
        }
        out.push(HEX[(b & 0x0f) as usize] as char);
        if out.len() >= chars {
            break;
        }
    }
    out
}
