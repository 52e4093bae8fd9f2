use crate::config::{Config, StrategyKind};
use crate::shared::{load_market_data, resolve_date_range, series_report_json};
use crate::strategies::{build_dca_policy, build_valuation_policy, build_weighted_policy};
use ballast_domain::repositories::market_data::PriceRepository;
use ballast_domain::repositories::rates::RateRepository;
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::info_span;

/// Static checks on a config; runs before any data is read.
pub fn validate_config(config: &Config) -> Result<(), String> {
    if config.run.run_id.trim().is_empty() {
        return Err("run.run_id must not be empty".to_string());
    }
    let capital = config.run.initial_capital;
    if !capital.is_finite() || capital <= 0.0 {
        return Err(format!("run.initial_capital must be > 0 (got {capital})"));
    }
    if let (Some(start), Some(end)) = resolve_date_range(config)? {
        if start > end {
            return Err(format!("run.start ({start}) is after run.end ({end})"));
        }
    }

    if config.data.prices.is_empty() {
        return Err("data.prices must list at least one price file".to_string());
    }
    let mut instruments = BTreeSet::new();
    for source in &config.data.prices {
        if source.instrument_id.trim().is_empty() {
            return Err("data.prices.instrument_id must not be empty".to_string());
        }
        if source.path.trim().is_empty() {
            return Err(format!(
                "data.prices.path for {} must not be empty",
                source.instrument_id
            ));
        }
        if !instruments.insert(source.instrument_id.as_str()) {
            return Err(format!(
                "data.prices lists {} more than once",
                source.instrument_id
            ));
        }
    }
    if let Some(rate) = config.data.default_annual_rate {
        if !rate.is_finite() || rate <= -1.0 || rate >= 1.0 {
            return Err(format!(
                "data.default_annual_rate must be a decimal fraction within (-1, 1) (got {rate})"
            ));
        }
    }

    let require_priced = |instrument_id: &str| {
        if instruments.contains(instrument_id) {
            Ok(())
        } else {
            Err(format!("strategy instrument {instrument_id} has no entry in data.prices"))
        }
    };
    match config.strategy.kind {
        StrategyKind::ValuationBalance => {
            let valuation = config.strategy.valuation.as_ref().ok_or_else(|| {
                "strategy.kind=valuation_balance requires [strategy.valuation]".to_string()
            })?;
            build_valuation_policy(valuation)
                .map_err(|err| format!("strategy.valuation: {err}"))?;
            require_priced(&valuation.instrument_id)?;
        }
        StrategyKind::Dca => {
            let policy = build_dca_policy(config).map_err(|err| format!("strategy.dca: {err}"))?;
            require_priced(policy.instrument_id())?;
        }
        StrategyKind::Portfolio => {
            let policy =
                build_weighted_policy(config).map_err(|err| format!("strategy.portfolio: {err}"))?;
            for target in policy.weights() {
                require_priced(&target.instrument_id)?;
            }
        }
        StrategyKind::CashBonds => {}
    }

    if let Some(report) = &config.report {
        if let Some(points) = report.max_chart_points {
            if points < 2 {
                return Err(format!("report.max_chart_points must be >= 2 (got {points})"));
            }
        }
    }
    Ok(())
}

/// Validates the config, loads every series and reports data quality as JSON.
/// In strict mode duplicate or out-of-order rows fail the validation.
pub fn validate(
    config: &Config,
    strict: bool,
    prices: &dyn PriceRepository,
    rates: &dyn RateRepository,
) -> Result<serde_json::Value, String> {
    let _span = info_span!(
        "validate",
        strict = strict,
        run_id = %config.run.run_id,
        strategy = config.strategy.kind.label()
    )
    .entered();

    validate_config(config)?;

    let stage_start = Instant::now();
    let data = load_market_data(config, prices, rates)?;
    metrics::histogram!("ballast.validate.load_ms")
        .record(stage_start.elapsed().as_millis() as f64);

    let duplicates: usize = data
        .price_reports
        .iter()
        .map(|(_, r)| r.duplicates)
        .chain(data.rate_report.iter().map(|r| r.duplicates))
        .sum();
    let out_of_order: usize = data
        .price_reports
        .iter()
        .map(|(_, r)| r.out_of_order)
        .chain(data.rate_report.iter().map(|r| r.out_of_order))
        .sum();
    let missing_close: usize = data.price_reports.iter().map(|(_, r)| r.missing_close).sum();

    metrics::gauge!("ballast.validate.duplicates").set(duplicates as f64);
    metrics::gauge!("ballast.validate.out_of_order").set(out_of_order as f64);
    metrics::gauge!("ballast.validate.missing_close").set(missing_close as f64);

    if strict && (duplicates > 0 || out_of_order > 0) {
        return Err(format!(
            "strict validation failed: {duplicates} duplicate and {out_of_order} out-of-order rows"
        ));
    }
    if data.observations.is_empty() {
        tracing::warn!("no observations in the selected date range");
    }

    let prices_json: serde_json::Map<String, serde_json::Value> = data
        .price_reports
        .iter()
        .map(|(id, report)| (id.clone(), series_report_json(report)))
        .collect();

    Ok(serde_json::json!({
        "prices": prices_json,
        "rates": data.rate_report.as_ref().map(series_report_json),
        "observations": data.observations.len(),
        "first_date": data.observations.first().map(|o| o.date),
        "last_date": data.observations.last().map(|o| o.date),
        "totals": {
            "duplicates": duplicates,
            "out_of_order": out_of_order,
            "missing_close": missing_close,
        },
        "strict": strict,
    }))
}

#[cfg(test)]
mod tests {
    use super::validate_config;
    use crate::config::Config;

    fn config(body: &str) -> Config {
        toml::from_str(body).expect("config should parse")
    }

    const BASE: &str = r#"
[run]
run_id = "v"
initial_capital = 1000.0

[data]
[[data.prices]]
instrument_id = "IDX"
path = "idx.csv"
"#;

    fn with_strategy(strategy: &str) -> Config {
        config(&format!("{BASE}\n{strategy}"))
    }

    #[test]
    fn accepts_a_complete_valuation_config() {
        let cfg = with_strategy(
            r#"
[strategy]
kind = "valuation_balance"
[strategy.valuation]
instrument_id = "IDX"
signal = "pe_ratio"
min_ratio = 0.1
max_ratio = 0.6
low_bound = 11.0
high_bound = 16.0
levels = 6
review_interval_months = 6.0
"#,
        );
        validate_config(&cfg).expect("valid");
    }

    #[test]
    fn rejects_inverted_band() {
        let cfg = with_strategy(
            r#"
[strategy]
kind = "valuation_balance"
[strategy.valuation]
instrument_id = "IDX"
signal = "pe_ratio"
min_ratio = 0.6
max_ratio = 0.1
low_bound = 11.0
high_bound = 16.0
levels = 6
review_interval_months = 6.0
"#,
        );
        let err = validate_config(&cfg).expect_err("invalid band");
        assert!(err.starts_with("strategy.valuation"));
    }

    #[test]
    fn rejects_weights_above_one_and_unknown_instruments() {
        let cfg = with_strategy(
            r#"
[strategy]
kind = "portfolio"
[strategy.portfolio]
weights = [{ instrument_id = "IDX", weight = 0.8 }, { instrument_id = "BND", weight = 0.4 }]
"#,
        );
        let err = validate_config(&cfg).expect_err("weights");
        assert!(err.contains("above 1"));

        let cfg = with_strategy(
            r#"
[strategy]
kind = "portfolio"
[strategy.portfolio]
weights = [{ instrument_id = "IDX", weight = 0.5 }, { instrument_id = "BND", weight = 0.4 }]
"#,
        );
        let err = validate_config(&cfg).expect_err("unknown instrument");
        assert!(err.contains("BND"));
    }

    #[test]
    fn rejects_bad_run_section() {
        let mut cfg = with_strategy("[strategy]\nkind = \"cash_bonds\"");
        validate_config(&cfg).expect("valid");

        cfg.run.initial_capital = 0.0;
        assert!(validate_config(&cfg).is_err());

        cfg.run.initial_capital = 10.0;
        cfg.run.start = Some("2021-01-01".to_string());
        cfg.run.end = Some("2020-01-01".to_string());
        let err = validate_config(&cfg).expect_err("range");
        assert!(err.contains("after"));
    }

    #[test]
    fn rejects_missing_strategy_section() {
        let cfg = with_strategy("[strategy]\nkind = \"dca\"");
        let err = validate_config(&cfg).expect_err("missing dca");
        assert!(err.contains("[strategy.dca]"));
    }
}
