use crate::reporting;
use ballast_domain::entities::performance::{DailyValue, YearlyDetail};
use ballast_domain::repositories::artifacts::ArtifactWriter;
use ballast_domain::services::audit::AuditEvent;
use ballast_domain::value_objects::trade::TradeRecord;
use std::fs;
use std::path::Path;

#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemArtifactWriter;

impl FilesystemArtifactWriter {
    pub fn new() -> Self {
        Self
    }
}

fn counted(kind: &'static str, result: Result<(), String>) -> Result<(), String> {
    let outcome = if result.is_ok() { "ok" } else { "error" };
    metrics::counter!("ballast.artifacts.writes", "kind" => kind, "result" => outcome)
        .increment(1);
    result
}

impl ArtifactWriter for FilesystemArtifactWriter {
    fn ensure_dir(&self, path: &Path) -> Result<(), String> {
        fs::create_dir_all(path)
            .map_err(|err| format!("failed to create dir {}: {}", path.display(), err))
    }

    fn write_result_json(&self, path: &Path, value: &serde_json::Value) -> Result<(), String> {
        counted("result_json", reporting::write_result_json(path, value))
    }

    fn write_daily_csv(&self, path: &Path, values: &[DailyValue]) -> Result<(), String> {
        counted("daily_csv", reporting::write_daily_csv(path, values))
    }

    fn write_trades_csv(&self, path: &Path, trades: &[TradeRecord]) -> Result<(), String> {
        counted("trades_csv", reporting::write_trades_csv(path, trades))
    }

    fn write_yearly_csv(&self, path: &Path, details: &[YearlyDetail]) -> Result<(), String> {
        counted("yearly_csv", reporting::write_yearly_csv(path, details))
    }

    fn write_audit_jsonl(&self, path: &Path, events: &[AuditEvent]) -> Result<(), String> {
        counted("audit_jsonl", reporting::write_audit_jsonl(path, events))
    }

    fn write_config_snapshot_toml(&self, path: &Path, contents: &str) -> Result<(), String> {
        let result = fs::write(path, contents).map_err(|err| {
            format!(
                "failed to write config snapshot {}: {}",
                path.display(),
                err
            )
        });
        counted("config_snapshot", result)
    }
}
