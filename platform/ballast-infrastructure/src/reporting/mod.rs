use ballast_domain::entities::performance::{DailyValue, YearlyDetail};
use ballast_domain::services::audit::AuditEvent;
use ballast_domain::value_objects::trade::{TradeRecord, TradeTarget, CASH_ASSET};
use std::fs;
use std::io::Write;
use std::path::Path;

fn opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn write_audit_jsonl(path: &Path, events: &[AuditEvent]) -> Result<(), String> {
    let mut file =
        fs::File::create(path).map_err(|err| format!("failed to create logs: {}", err))?;
    for event in events {
        let line = serde_json::to_string(event)
            .map_err(|err| format!("failed to serialize audit event: {}", err))?;
        file.write_all(line.as_bytes())
            .and_then(|_| file.write_all(b"\n"))
            .map_err(|err| format!("failed to write audit event: {}", err))?;
    }
    Ok(())
}

pub fn write_result_json(path: &Path, value: &serde_json::Value) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|err| format!("failed to serialize result: {}", err))?;
    fs::write(path, json)
        .map_err(|err| format!("failed to write result {}: {}", path.display(), err))
}

pub fn write_daily_csv(path: &Path, values: &[DailyValue]) -> Result<(), String> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|err| format!("failed to create daily csv {}: {}", path.display(), err))?;
    wtr.write_record(["date", "value", "change_percent"])
        .map_err(|err| format!("failed to write daily csv header: {}", err))?;

    for value in values {
        wtr.write_record([
            value.date.to_string(),
            value.value.to_string(),
            value.change_percent.to_string(),
        ])
        .map_err(|err| format!("failed to write daily row: {}", err))?;
    }

    wtr.flush()
        .map_err(|err| format!("failed to flush daily csv: {}", err))
}

pub fn write_trades_csv(path: &Path, trades: &[TradeRecord]) -> Result<(), String> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|err| format!("failed to create trades csv {}: {}", path.display(), err))?;
    wtr.write_record([
        "date",
        "kind",
        "target",
        "target_value",
        "signal_value",
        "cash_before",
        "cash_after",
        "value_before",
        "value_after",
    ])
    .map_err(|err| format!("failed to write trades csv header: {}", err))?;

    for trade in trades {
        let (target, target_value) = match trade.target {
            TradeTarget::Ratio(ratio) => ("ratio", Some(ratio)),
            TradeTarget::Amount(amount) => ("amount", Some(amount)),
            TradeTarget::Weights => ("weights", None),
        };
        let value_before = serde_json::to_string(&trade.value_before)
            .map_err(|err| format!("failed to serialize trade values: {}", err))?;
        let value_after = serde_json::to_string(&trade.value_after)
            .map_err(|err| format!("failed to serialize trade values: {}", err))?;
        wtr.write_record([
            trade.date.to_string(),
            trade.kind.label().to_string(),
            target.to_string(),
            opt(target_value),
            opt(trade.signal_value),
            opt(trade.value_before.get(CASH_ASSET).copied()),
            opt(trade.value_after.get(CASH_ASSET).copied()),
            value_before,
            value_after,
        ])
        .map_err(|err| format!("failed to write trades row: {}", err))?;
    }

    wtr.flush()
        .map_err(|err| format!("failed to flush trades csv: {}", err))
}

pub fn write_yearly_csv(path: &Path, details: &[YearlyDetail]) -> Result<(), String> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|err| format!("failed to create yearly csv {}: {}", path.display(), err))?;
    wtr.write_record([
        "year",
        "start_value",
        "end_value",
        "return_pct",
        "cash_start",
        "cash_end",
        "interest",
        "bought_amount",
        "sold_amount",
        "invested_amount",
        "trade_count",
    ])
    .map_err(|err| format!("failed to write yearly csv header: {}", err))?;

    for detail in details {
        wtr.write_record([
            detail.year.to_string(),
            detail.start_value.to_string(),
            detail.end_value.to_string(),
            detail.return_pct.to_string(),
            opt(detail.cash_start),
            opt(detail.cash_end),
            opt(detail.interest),
            detail.bought_amount.to_string(),
            detail.sold_amount.to_string(),
            opt(detail.invested_amount),
            detail.trade_count.to_string(),
        ])
        .map_err(|err| format!("failed to write yearly row: {}", err))?;
    }

    wtr.flush()
        .map_err(|err| format!("failed to flush yearly csv: {}", err))
}

#[cfg(test)]
mod tests {
    use super::{write_audit_jsonl, write_daily_csv, write_trades_csv, write_yearly_csv};
    use ballast_domain::entities::performance::{DailyValue, YearlyDetail};
    use ballast_domain::services::audit::AuditEvent;
    use ballast_domain::value_objects::trade::{TradeKind, TradeRecord, TradeTarget, CASH_ASSET};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_tmp_dir(prefix: &str) -> PathBuf {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!("ballast_{prefix}_{}_{}", std::process::id(), now))
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 3, 1).expect("date")
    }

    #[test]
    fn writes_report_files() {
        let dir = unique_tmp_dir("report_test");
        fs::create_dir_all(&dir).expect("dir");

        let trade = TradeRecord {
            date: date(),
            kind: TradeKind::Sell,
            target: TradeTarget::Ratio(0.25),
            value_before: BTreeMap::from([(CASH_ASSET.to_string(), 100.0), ("IDX".to_string(), 300.0)]),
            value_after: BTreeMap::from([(CASH_ASSET.to_string(), 300.0), ("IDX".to_string(), 100.0)]),
            signal_value: Some(17.5),
        };
        let daily = vec![DailyValue {
            date: date(),
            value: 400.0,
            change_percent: 0.0,
        }];
        let yearly = vec![YearlyDetail {
            year: 2022,
            start_value: 400.0,
            end_value: 400.0,
            return_pct: 0.0,
            positions_start: None,
            positions_end: None,
            cash_start: Some(100.0),
            cash_end: None,
            interest: None,
            bought_amount: 0.0,
            sold_amount: 200.0,
            invested_amount: None,
            trade_count: 1,
        }];
        let events = vec![AuditEvent {
            run_id: "r".to_string(),
            date: Some(date()),
            stage: "trade".to_string(),
            action: "sell".to_string(),
            error: None,
            details: serde_json::json!({}),
        }];

        write_trades_csv(dir.join("trades.csv").as_path(), &[trade]).expect("trades");
        write_daily_csv(dir.join("daily.csv").as_path(), &daily).expect("daily");
        write_yearly_csv(dir.join("yearly.csv").as_path(), &yearly).expect("yearly");
        write_audit_jsonl(dir.join("logs.jsonl").as_path(), &events).expect("logs");

        let trades = fs::read_to_string(dir.join("trades.csv")).expect("read trades");
        let row = trades.lines().nth(1).expect("trade row");
        assert!(row.starts_with("2022-03-01,sell,ratio,0.25,17.5,100,300,"));

        let yearly = fs::read_to_string(dir.join("yearly.csv")).expect("read yearly");
        assert_eq!(yearly.lines().nth(1), Some("2022,400,400,0,100,,,0,200,,1"));

        let logs = fs::read_to_string(dir.join("logs.jsonl")).expect("read logs");
        let event: serde_json::Value =
            serde_json::from_str(logs.lines().next().expect("line")).expect("json");
        assert_eq!(event["stage"], "trade");
        assert_eq!(event["date"], "2022-03-01");
        assert!(event.get("error").is_none());
    }
}
