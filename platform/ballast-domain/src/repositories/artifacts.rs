use crate::entities::performance::{DailyValue, YearlyDetail};
use crate::services::audit::AuditEvent;
use crate::value_objects::trade::TradeRecord;
use std::path::Path;

pub trait ArtifactWriter {
    fn ensure_dir(&self, path: &Path) -> Result<(), String>;
    fn write_result_json(&self, path: &Path, value: &serde_json::Value) -> Result<(), String>;
    fn write_daily_csv(&self, path: &Path, values: &[DailyValue]) -> Result<(), String>;
    fn write_trades_csv(&self, path: &Path, trades: &[TradeRecord]) -> Result<(), String>;
    fn write_yearly_csv(&self, path: &Path, details: &[YearlyDetail]) -> Result<(), String>;
    fn write_audit_jsonl(&self, path: &Path, events: &[AuditEvent]) -> Result<(), String>;
    fn write_config_snapshot_toml(&self, path: &Path, contents: &str) -> Result<(), String>;
}
