use crate::value_objects::trade::TradeRecord;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyValue {
    pub date: NaiveDate,
    pub value: f64,
    /// Change versus initial capital, in percent.
    pub change_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub shares: f64,
    pub price: f64,
    pub value: f64,
}

/// Year-by-year decomposition of a timeline. Optional fields are filled only
/// when the matching aggregate option is enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyDetail {
    pub year: i32,
    pub start_value: f64,
    pub end_value: f64,
    pub return_pct: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub positions_start: Option<BTreeMap<String, PositionSnapshot>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub positions_end: Option<BTreeMap<String, PositionSnapshot>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cash_start: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cash_end: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interest: Option<f64>,
    pub bought_amount: f64,
    pub sold_amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invested_amount: Option<f64>,
    pub trade_count: usize,
}

/// Terminal output of one strategy run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyResult {
    pub trades: Vec<TradeRecord>,
    pub daily_values: Vec<DailyValue>,
    pub final_value: f64,
    pub total_return_pct: f64,
    pub annualized_return_pct: f64,
    pub max_drawdown_pct: f64,
    pub yearly_details: Vec<YearlyDetail>,
}

/// Cash-in-bonds baseline. Same shape, never carries trades.
pub type ControlGroupResult = StrategyResult;

impl StrategyResult {
    /// Result for a run that simulated nothing: capital untouched, every ratio zero.
    pub fn neutral(initial_capital: f64) -> Self {
        Self {
            trades: Vec::new(),
            daily_values: Vec::new(),
            final_value: initial_capital,
            total_return_pct: 0.0,
            annualized_return_pct: 0.0,
            max_drawdown_pct: 0.0,
            yearly_details: Vec::new(),
        }
    }

    pub fn with_trades(mut self, trades: Vec<TradeRecord>) -> Self {
        self.trades = trades;
        self
    }

    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }
}
