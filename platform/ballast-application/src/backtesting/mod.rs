use crate::charting::{chart_series, ChartOptions, ChartPoint};
use crate::config::{Config, StrategyKind};
use crate::shared::{
    aggregate_options, config_fingerprint, default_annual_rate, include_control,
    load_market_data, out_dir, series_report_json, timing_event, MarketData,
};
use crate::strategies::{build_strategy, control_plan, StrategyPlan};
use crate::validation::validate_config;
use ballast_domain::entities::performance::{ControlGroupResult, StrategyResult};
use ballast_domain::repositories::artifacts::ArtifactWriter;
use ballast_domain::repositories::market_data::PriceRepository;
use ballast_domain::repositories::rates::{RateRepository, RateSource};
use ballast_domain::services::aggregator::aggregate;
use ballast_domain::services::audit::AuditEvent;
use ballast_domain::services::engine::Simulation;
use ballast_domain::value_objects::observation::Observation;
use ballast_domain::value_objects::trade::TradeRecord;
use chrono::NaiveDate;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info_span;

/// Everything one strategy run produces before it is written anywhere.
#[derive(Debug, Clone)]
pub struct BacktestOutcome {
    pub kind: StrategyKind,
    pub strategy: StrategyResult,
    pub control: Option<ControlGroupResult>,
    pub chart: Vec<ChartPoint>,
    pub control_chart: Vec<ChartPoint>,
    pub policies: Vec<String>,
    /// Observations actually simulated.
    pub observations: usize,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub audit_events: Vec<AuditEvent>,
}

/// Simulates the configured strategy, and the cash-in-bonds control group when
/// enabled, over already-loaded observations. Performs no I/O.
pub fn run_strategy(
    config: &Config,
    observations: &[Observation],
    rates: &dyn RateSource,
) -> Result<BacktestOutcome, String> {
    let capital = config.run.initial_capital;
    let kind = config.strategy.kind;
    let options = aggregate_options(config);
    let chart_options = ChartOptions::from_config(config);
    let with_control = include_control(config) && kind != StrategyKind::CashBonds;

    if observations.is_empty() {
        tracing::warn!(run_id = %config.run.run_id, "no observations; returning neutral result");
        return Ok(BacktestOutcome {
            kind,
            strategy: StrategyResult::neutral(capital),
            control: with_control.then(|| StrategyResult::neutral(capital)),
            chart: Vec::new(),
            control_chart: Vec::new(),
            policies: Vec::new(),
            observations: 0,
            start_date: None,
            end_date: None,
            audit_events: Vec::new(),
        });
    }

    let StrategyPlan {
        policies,
        initial,
        start_index,
        ..
    } = build_strategy(config, observations, rates)?;
    let window = &observations[start_index..];
    let mut audit_events = Vec::new();

    let stage_start = Instant::now();
    let simulation = Simulation::new(rates).with_boxed(policies);
    let policy_names = simulation.policy_names();
    let output = simulation.run(window, initial)?;
    let elapsed = stage_start.elapsed();
    metrics::histogram!("ballast.backtest.simulate_ms").record(elapsed.as_millis() as f64);
    audit_events.push(timing_event(
        &config.run.run_id,
        "simulate",
        elapsed.as_millis() as u64,
        serde_json::json!({
            "steps": output.timeline.len(),
            "skipped": start_index,
            "trades": output.trades.len(),
        }),
    ));

    let stage_start = Instant::now();
    audit_events.extend(
        output
            .trades
            .iter()
            .map(|trade| trade_event(&config.run.run_id, trade)),
    );
    metrics::counter!("ballast.backtest.trades").increment(output.trades.len() as u64);
    let strategy = aggregate(&output.timeline, capital, options).with_trades(output.trades);

    let control = if with_control {
        let plan = control_plan(config, observations, start_index);
        let control_output = Simulation::new(rates).run(window, plan.initial)?;
        Some(aggregate(&control_output.timeline, capital, options))
    } else {
        None
    };
    let elapsed = stage_start.elapsed();
    metrics::histogram!("ballast.backtest.aggregate_ms").record(elapsed.as_millis() as f64);
    audit_events.push(timing_event(
        &config.run.run_id,
        "aggregate",
        elapsed.as_millis() as u64,
        serde_json::json!({
            "years": strategy.yearly_details.len(),
            "control": control.is_some(),
        }),
    ));

    let stage_start = Instant::now();
    let chart = chart_series(&strategy, chart_options);
    let control_chart = control
        .as_ref()
        .map(|result| chart_series(result, chart_options))
        .unwrap_or_default();
    metrics::histogram!("ballast.backtest.chart_ms")
        .record(stage_start.elapsed().as_millis() as f64);

    tracing::info!(
        final_value = strategy.final_value,
        total_return_pct = strategy.total_return_pct,
        max_drawdown_pct = strategy.max_drawdown_pct,
        trades = strategy.trade_count(),
        "strategy simulated"
    );

    Ok(BacktestOutcome {
        kind,
        strategy,
        control,
        chart,
        control_chart,
        policies: policy_names,
        observations: window.len(),
        start_date: window.first().map(|o| o.date),
        end_date: window.last().map(|o| o.date),
        audit_events,
    })
}

/// Loads data, runs the strategy and writes the run directory `<out>/<run_id>`.
pub fn run_backtest(
    config: &Config,
    config_toml: &str,
    out: Option<PathBuf>,
    prices: &dyn PriceRepository,
    rates: &dyn RateRepository,
    artifacts: &dyn ArtifactWriter,
) -> Result<PathBuf, String> {
    let _span = info_span!(
        "run_backtest",
        run_id = %config.run.run_id,
        strategy = config.strategy.kind.label()
    )
    .entered();

    validate_config(config)?;

    let data = load_market_data(config, prices, rates)?;
    let rate_table = data.rate_table(default_annual_rate(config));
    let outcome = run_strategy(config, &data.observations, &rate_table)?;

    let stage_start = Instant::now();
    let run_dir = write_outputs(config, config_toml, out, &data, outcome, artifacts)?;
    metrics::histogram!("ballast.backtest.write_ms")
        .record(stage_start.elapsed().as_millis() as f64);

    tracing::info!(run_dir = %run_dir.display(), "backtest artifacts written");
    Ok(run_dir)
}

fn trade_event(run_id: &str, trade: &TradeRecord) -> AuditEvent {
    AuditEvent {
        run_id: run_id.to_string(),
        date: Some(trade.date),
        stage: "trade".to_string(),
        action: trade.kind.label().to_string(),
        error: None,
        details: serde_json::json!({
            "target": trade.target,
            "signal_value": trade.signal_value,
            "value_before": trade.value_before,
            "value_after": trade.value_after,
        }),
    }
}

fn run_event(config: &Config, date: Option<NaiveDate>, action: &str, details: serde_json::Value) -> AuditEvent {
    AuditEvent {
        run_id: config.run.run_id.clone(),
        date,
        stage: "run".to_string(),
        action: action.to_string(),
        error: None,
        details,
    }
}

fn result_meta(config: &Config, config_toml: &str, outcome: &BacktestOutcome) -> serde_json::Value {
    serde_json::json!({
        "run_id": config.run.run_id,
        "strategy": outcome.kind.label(),
        "policies": outcome.policies,
        "initial_capital": config.run.initial_capital,
        "start_date": outcome.start_date,
        "end_date": outcome.end_date,
        "observations": outcome.observations,
        "config_fingerprint": config_fingerprint(config_toml),
        "engine_version": env!("CARGO_PKG_VERSION"),
    })
}

fn write_outputs(
    config: &Config,
    config_toml: &str,
    out: Option<PathBuf>,
    data: &MarketData,
    outcome: BacktestOutcome,
    artifacts: &dyn ArtifactWriter,
) -> Result<PathBuf, String> {
    let base_dir = out.unwrap_or_else(|| PathBuf::from(out_dir(config)));
    let run_dir = base_dir.join(&config.run.run_id);
    artifacts.ensure_dir(&run_dir)?;

    let meta = result_meta(config, config_toml, &outcome);
    let data_quality: serde_json::Map<String, serde_json::Value> = data
        .price_reports
        .iter()
        .map(|(id, report)| (id.clone(), series_report_json(report)))
        .collect();
    let strategy_json = serde_json::to_value(&outcome.strategy)
        .map_err(|err| format!("failed to serialize strategy result: {err}"))?;
    let control_json = outcome
        .control
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|err| format!("failed to serialize control result: {err}"))?;
    let result = serde_json::json!({
        "meta": meta,
        "strategy": strategy_json,
        "control": control_json,
        "chart": outcome.chart,
        "control_chart": outcome.control_chart,
        "data_quality": {
            "prices": data_quality,
            "rates": data.rate_report.as_ref().map(series_report_json),
        },
    });
    artifacts.write_result_json(run_dir.join("result.json").as_path(), &result)?;

    artifacts.write_daily_csv(
        run_dir.join("daily.csv").as_path(),
        &outcome.strategy.daily_values,
    )?;
    artifacts.write_trades_csv(run_dir.join("trades.csv").as_path(), &outcome.strategy.trades)?;
    artifacts.write_yearly_csv(
        run_dir.join("yearly.csv").as_path(),
        &outcome.strategy.yearly_details,
    )?;
    if let Some(control) = &outcome.control {
        artifacts.write_daily_csv(
            run_dir.join("control_daily.csv").as_path(),
            &control.daily_values,
        )?;
    }

    let mut audit_events = data.timings.clone();
    audit_events.push(run_event(
        config,
        outcome.start_date,
        "start",
        serde_json::json!({
            "strategy": outcome.kind.label(),
            "policies": outcome.policies,
            "initial_capital": config.run.initial_capital,
        }),
    ));
    audit_events.extend(outcome.audit_events);
    audit_events.push(run_event(
        config,
        outcome.end_date,
        "complete",
        serde_json::json!({
            "final_value": outcome.strategy.final_value,
            "total_return_pct": outcome.strategy.total_return_pct,
            "annualized_return_pct": outcome.strategy.annualized_return_pct,
            "max_drawdown_pct": outcome.strategy.max_drawdown_pct,
            "trades": outcome.strategy.trades.len(),
        }),
    ));
    audit_events.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.stage.cmp(&b.stage))
            .then_with(|| a.action.cmp(&b.action))
    });
    artifacts.write_audit_jsonl(run_dir.join("logs.jsonl").as_path(), &audit_events)?;

    artifacts
        .write_config_snapshot_toml(run_dir.join("config_snapshot.toml").as_path(), config_toml)?;

    Ok(run_dir)
}
