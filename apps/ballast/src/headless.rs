use ballast_application::config::{load_config_with_source, Config};
use ballast_application::shared::out_dir;
use ballast_domain::repositories::market_data::PriceRepository;
use ballast_domain::repositories::rates::RateRepository;
use ballast_infrastructure::artifacts::FilesystemArtifactWriter;
use ballast_infrastructure::market_data::FilesystemPriceRepository;
use ballast_infrastructure::rates::FilesystemRateRepository;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadlessMode {
    Validate,
    Backtest,
}

pub struct HeadlessArgs {
    pub mode: HeadlessMode,
    pub config_path: PathBuf,
    pub strict: bool,
    pub out: Option<PathBuf>,
}

pub fn run_headless(args: HeadlessArgs) -> Result<serde_json::Value, String> {
    let (config, config_toml) = load_config_with_source(&args.config_path)?;
    let base = args.config_path.parent().unwrap_or_else(|| Path::new(""));
    let config = resolve_data_paths(config, base);
    match args.mode {
        HeadlessMode::Validate => run_validate(&config, args.strict),
        HeadlessMode::Backtest => run_backtest(&config, &config_toml, args.out),
    }
}

/// Relative data paths are read relative to the config file.
fn resolve_data_paths(mut config: Config, base: &Path) -> Config {
    let resolve = |raw: &str| {
        let path = Path::new(raw);
        if path.is_absolute() {
            raw.to_string()
        } else {
            base.join(path).display().to_string()
        }
    };
    for source in &mut config.data.prices {
        source.path = resolve(&source.path);
    }
    config.data.rates_path = config.data.rates_path.as_deref().map(resolve);
    config
}

fn build_price_repo() -> Box<dyn PriceRepository> {
    Box::new(FilesystemPriceRepository::new())
}

fn build_rate_repo() -> Box<dyn RateRepository> {
    Box::new(FilesystemRateRepository::new())
}

fn artifacts_for_run(run_dir: &Path) -> serde_json::Value {
    serde_json::json!({
        "run_dir": run_dir.display().to_string(),
        "result_json": run_dir.join("result.json").display().to_string(),
        "daily_csv": run_dir.join("daily.csv").display().to_string(),
        "trades_csv": run_dir.join("trades.csv").display().to_string(),
        "yearly_csv": run_dir.join("yearly.csv").display().to_string(),
        "logs_jsonl": run_dir.join("logs.jsonl").display().to_string(),
        "config_snapshot_toml": run_dir.join("config_snapshot.toml").display().to_string(),
    })
}

fn run_validate(config: &Config, strict: bool) -> Result<serde_json::Value, String> {
    let prices = build_price_repo();
    let rates = build_rate_repo();
    let report =
        ballast_application::validation::validate(config, strict, prices.as_ref(), rates.as_ref())?;
    Ok(serde_json::json!({
        "status": "ok",
        "mode": "validate",
        "strict": strict,
        "run_id": config.run.run_id,
        "report": report,
    }))
}

fn run_backtest(
    config: &Config,
    config_toml: &str,
    out: Option<PathBuf>,
) -> Result<serde_json::Value, String> {
    let prices = build_price_repo();
    let rates = build_rate_repo();
    let artifacts = FilesystemArtifactWriter::new();

    let out_dir = out
        .clone()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| out_dir(config));
    let run_dir = ballast_application::backtesting::run_backtest(
        config,
        config_toml,
        out,
        prices.as_ref(),
        rates.as_ref(),
        &artifacts,
    )?;
    Ok(serde_json::json!({
        "status": "ok",
        "mode": "backtest",
        "run_id": config.run.run_id,
        "strategy": config.strategy.kind.label(),
        "out_dir": out_dir,
        "artifacts": artifacts_for_run(&run_dir),
    }))
}
