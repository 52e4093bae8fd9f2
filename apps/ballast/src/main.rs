use ballast::headless::{HeadlessArgs, HeadlessMode};
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ballast")]
#[command(about = "Ballast portfolio backtester (headless).", version)]
struct Cli {
    /// validate | backtest
    #[arg(long, default_value = "backtest")]
    mode: Mode,

    /// Config file path (TOML). If omitted, uses env BALLAST_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fail validation on duplicate or out-of-order rows (validate mode only).
    #[arg(long)]
    strict: bool,

    /// Base directory for run artifacts; overrides report.out_dir.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Mode {
    Validate,
    Backtest,
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = init_tracing() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
    if let Err(err) = init_metrics() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }

    let mode = match cli.mode {
        Mode::Validate => HeadlessMode::Validate,
        Mode::Backtest => HeadlessMode::Backtest,
    };

    let config_path = cli
        .config
        .or_else(|| {
            std::env::var("BALLAST_CONFIG")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
        })
        .unwrap_or_else(|| {
            eprintln!("error: missing --config and env BALLAST_CONFIG is not set");
            std::process::exit(1);
        });

    let result = ballast::headless::run_headless(HeadlessArgs {
        mode,
        config_path,
        strict: cli.strict,
        out: cli.out,
    });

    match result {
        Ok(json) => {
            println!(
                "{}",
                serde_json::to_string(&json)
                    .unwrap_or_else(|_| "{\"status\":\"error\",\"error\":\"json\"}".to_string())
            );
        }
        Err(err) => {
            let lower = err.to_lowercase();
            let code = if lower.contains("strict validation failed") {
                2
            } else {
                1
            };
            eprintln!("error: {err}");
            std::process::exit(code);
        }
    }
}

fn init_tracing() -> Result<(), String> {
    let filter = std::env::var("BALLAST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .map_err(|err| format!("invalid log filter: {err}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

#[cfg(feature = "prometheus")]
fn init_metrics() -> Result<Option<SocketAddr>, String> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let Some(raw) = std::env::var("BALLAST_METRICS_ADDR").ok() else {
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }

    let addr: SocketAddr = raw
        .parse()
        .map_err(|err| format!("invalid BALLAST_METRICS_ADDR (expected host:port): {err}"))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|err| format!("failed to install prometheus exporter: {err}"))?;

    tracing::info!(metrics_addr = %addr, "prometheus metrics exporter enabled");
    Ok(Some(addr))
}

#[cfg(not(feature = "prometheus"))]
fn init_metrics() -> Result<Option<SocketAddr>, String> {
    Ok(None)
}
