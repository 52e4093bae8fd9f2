use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key used for the cash leg in the value-by-asset maps of a [`TradeRecord`].
pub const CASH_ASSET: &str = "cash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeKind {
    Buy,
    Sell,
    Rebalance,
    Contribution,
}

impl TradeKind {
    pub fn label(&self) -> &'static str {
        match self {
            TradeKind::Buy => "buy",
            TradeKind::Sell => "sell",
            TradeKind::Rebalance => "rebalance",
            TradeKind::Contribution => "contribution",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type", content = "value")]
pub enum TradeTarget {
    /// Fraction of total value held in the risk asset after the trade.
    Ratio(f64),
    /// Currency amount moved from cash into the instrument.
    Amount(f64),
    /// Weighted reset of every tracked instrument.
    Weights,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub date: NaiveDate,
    pub kind: TradeKind,
    pub target: TradeTarget,
    pub value_before: BTreeMap<String, f64>,
    pub value_after: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_value: Option<f64>,
}

impl TradeRecord {
    /// Net change of the cash leg; negative when cash was spent.
    pub fn cash_change(&self) -> f64 {
        let before = self.value_before.get(CASH_ASSET).copied().unwrap_or(0.0);
        let after = self.value_after.get(CASH_ASSET).copied().unwrap_or(0.0);
        after - before
    }
}

/// Concatenates trade streams from several policies into one date-ordered list.
/// The sort is stable, so same-day trades keep pipeline order.
pub fn merge_trades(streams: Vec<Vec<TradeRecord>>) -> Vec<TradeRecord> {
    let mut trades: Vec<TradeRecord> = streams.into_iter().flatten().collect();
    trades.sort_by_key(|t| t.date);
    trades
}

#[cfg(test)]
mod tests {
    use super::{merge_trades, TradeKind, TradeRecord, TradeTarget, CASH_ASSET};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn record(day: u32, kind: TradeKind, cash_before: f64, cash_after: f64) -> TradeRecord {
        TradeRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, day).expect("date"),
            kind,
            target: TradeTarget::Amount(cash_before - cash_after),
            value_before: BTreeMap::from([(CASH_ASSET.to_string(), cash_before)]),
            value_after: BTreeMap::from([(CASH_ASSET.to_string(), cash_after)]),
            signal_value: None,
        }
    }

    #[test]
    fn merge_trades_orders_by_date_and_keeps_ties_stable() {
        let merged = merge_trades(vec![
            vec![record(3, TradeKind::Buy, 10.0, 5.0)],
            vec![
                record(1, TradeKind::Contribution, 10.0, 9.0),
                record(3, TradeKind::Sell, 5.0, 8.0),
            ],
        ]);
        let kinds: Vec<TradeKind> = merged.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![TradeKind::Contribution, TradeKind::Buy, TradeKind::Sell]
        );
        assert!((merged[1].cash_change() + 5.0).abs() < 1e-12);
    }
}
