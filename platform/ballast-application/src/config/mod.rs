use ballast_domain::services::policies::ratio::BandDirection;
use ballast_domain::services::policies::signal::SignalKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    ValuationBalance,
    Dca,
    Portfolio,
    CashBonds,
}

impl StrategyKind {
    pub fn label(&self) -> &'static str {
        match self {
            StrategyKind::ValuationBalance => "valuation_balance",
            StrategyKind::Dca => "dca",
            StrategyKind::Portfolio => "portfolio",
            StrategyKind::CashBonds => "cash_bonds",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChartMode {
    #[default]
    Uniform,
    Shape,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub run: RunConfig,
    pub data: DataConfig,
    pub strategy: StrategyConfig,
    pub report: Option<ReportConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub run_id: String,
    pub initial_capital: f64,
    /// Inclusive, `YYYY-MM-DD`.
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct DataConfig {
    pub prices: Vec<PriceSourceConfig>,
    pub rates_path: Option<String>,
    /// Annual rate used when no rate file is given or it has no rows.
    pub default_annual_rate: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct PriceSourceConfig {
    pub instrument_id: String,
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct StrategyConfig {
    pub kind: StrategyKind,
    pub valuation: Option<ValuationConfig>,
    pub dca: Option<DcaConfig>,
    pub portfolio: Option<PortfolioConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ValuationConfig {
    pub instrument_id: String,
    pub signal: SignalKind,
    /// Defaults to the signal's natural direction.
    pub direction: Option<BandDirection>,
    pub min_ratio: f64,
    pub max_ratio: f64,
    pub low_bound: f64,
    pub high_bound: f64,
    pub levels: u32,
    pub review_interval_months: f64,
    pub deadband: Option<f64>,
    pub drift_threshold: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct DcaConfig {
    pub instrument_id: String,
    pub months: u32,
    /// Defaults to `run.initial_capital`.
    pub budget: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct PortfolioConfig {
    pub weights: Vec<WeightConfig>,
    /// Omit for buy-and-hold.
    pub rebalance_interval_months: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct WeightConfig {
    pub instrument_id: String,
    pub weight: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    pub out_dir: Option<String>,
    pub include_positions: Option<bool>,
    pub include_cash: Option<bool>,
    pub include_invested_amount: Option<bool>,
    pub include_control: Option<bool>,
    pub max_chart_points: Option<usize>,
    pub chart_mode: Option<ChartMode>,
}

pub fn load_config(path: &Path) -> Result<Config, String> {
    let (config, _source) = load_config_with_source(path)?;
    Ok(config)
}

pub fn load_config_with_source(path: &Path) -> Result<(Config, String), String> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read config {}: {}", path.display(), err))?;
    let config = toml::from_str(&contents)
        .map_err(|err| format!("failed to parse TOML {}: {}", path.display(), err))?;
    Ok((config, contents))
}

pub fn to_toml_pretty(config: &Config) -> Result<String, String> {
    toml::to_string_pretty(config)
        .map_err(|err| format!("failed to serialize config as TOML: {err}"))
}

#[cfg(test)]
mod tests {
    use super::{to_toml_pretty, ChartMode, Config, StrategyKind};
    use ballast_domain::services::policies::signal::SignalKind;

    fn parse_config(toml_str: &str) -> Config {
        toml::from_str(toml_str).expect("config should parse")
    }

    const VALUATION: &str = r#"
[run]
run_id = "pe_balance"
initial_capital = 1000000.0
start = "2012-01-01"

[data]
rates_path = "data/rates.csv"
default_annual_rate = 0.02

[[data.prices]]
instrument_id = "CSI300"
path = "data/csi300.csv"

[strategy]
kind = "valuation_balance"

[strategy.valuation]
instrument_id = "CSI300"
signal = "pe_ratio"
min_ratio = 0.1
max_ratio = 0.6
low_bound = 11.0
high_bound = 16.0
levels = 6
review_interval_months = 6.0

[report]
out_dir = "runs"
chart_mode = "shape"
max_chart_points = 300
"#;

    #[test]
    fn parse_config_rejects_malformed_toml() {
        let err = toml::from_str::<Config>("[run\nrun_id = 1").expect_err("malformed");
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn parse_valuation_config() {
        let config = parse_config(VALUATION);
        assert_eq!(config.strategy.kind, StrategyKind::ValuationBalance);
        let valuation = config.strategy.valuation.as_ref().expect("valuation");
        assert_eq!(valuation.signal, SignalKind::PeRatio);
        assert!(valuation.direction.is_none());
        assert_eq!(config.data.prices.len(), 1);
        let report = config.report.as_ref().expect("report");
        assert_eq!(report.chart_mode, Some(ChartMode::Shape));
        assert_eq!(report.max_chart_points, Some(300));
    }

    #[test]
    fn parse_config_rejects_unknown_fields() {
        let toml_str = VALUATION.replace("levels = 6", "levels = 6\nstep_size = 0.1");
        let err = toml::from_str::<Config>(&toml_str).expect_err("unknown field should fail");
        assert!(err.to_string().to_lowercase().contains("unknown field"));
    }

    #[test]
    fn parse_portfolio_config() {
        let toml_str = r#"
[run]
run_id = "mix"
initial_capital = 50000.0

[data]
[[data.prices]]
instrument_id = "AAA"
path = "a.csv"
[[data.prices]]
instrument_id = "BBB"
path = "b.csv"

[strategy]
kind = "portfolio"

[strategy.portfolio]
rebalance_interval_months = 12
weights = [
  { instrument_id = "AAA", weight = 0.7 },
  { instrument_id = "BBB", weight = 0.3 },
]
"#;
        let config = parse_config(toml_str);
        let portfolio = config.strategy.portfolio.as_ref().expect("portfolio");
        assert_eq!(portfolio.weights.len(), 2);
        assert_eq!(portfolio.rebalance_interval_months, Some(12));
        assert!(config.report.is_none());
        assert!(config.data.rates_path.is_none());
    }

    #[test]
    fn config_round_trips_through_pretty_toml() {
        let config = parse_config(VALUATION);
        let text = to_toml_pretty(&config).expect("serialize");
        let reparsed = parse_config(&text);
        assert_eq!(reparsed.run.run_id, "pe_balance");
        assert_eq!(reparsed.strategy.kind, StrategyKind::ValuationBalance);
    }
}
