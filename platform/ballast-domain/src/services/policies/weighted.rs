use crate::entities::net_worth::NetWorthState;
use crate::services::calendar::calendar_months_between;
use crate::services::policies::{Policy, StepContext};
use crate::value_objects::observation::Observation;
use crate::value_objects::trade::{TradeKind, TradeRecord, TradeTarget};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetWeight {
    pub instrument_id: String,
    pub weight: f64,
}

/// Multi-instrument portfolio reset to fixed weights every `interval_months`
/// calendar months. Weights may sum to less than one; the remainder stays in cash.
/// Without an interval the opening allocation is held untouched.
#[derive(Debug, Clone)]
pub struct WeightedRebalance {
    weights: Vec<TargetWeight>,
    interval_months: Option<u32>,
    last_rebalance: Option<NaiveDate>,
    trades: Vec<TradeRecord>,
}

pub fn validate_weights(weights: &[TargetWeight]) -> Result<(), String> {
    if weights.is_empty() {
        return Err("portfolio needs at least one instrument".to_string());
    }
    let mut seen = BTreeSet::new();
    let mut sum = 0.0;
    for target in weights {
        if target.instrument_id.trim().is_empty() {
            return Err("portfolio instrument id must not be empty".to_string());
        }
        if !seen.insert(target.instrument_id.as_str()) {
            return Err(format!(
                "portfolio lists {} more than once",
                target.instrument_id
            ));
        }
        if !target.weight.is_finite() || !(0.0..=1.0).contains(&target.weight) {
            return Err(format!(
                "weight for {} must be within [0, 1] (got {})",
                target.instrument_id, target.weight
            ));
        }
        sum += target.weight;
    }
    if sum > 1.0 + WEIGHT_SUM_TOLERANCE {
        return Err(format!("portfolio weights sum to {sum:.6}, above 1"));
    }
    Ok(())
}

impl WeightedRebalance {
    pub fn new(weights: Vec<TargetWeight>, interval_months: Option<u32>) -> Result<Self, String> {
        validate_weights(&weights)?;
        if interval_months == Some(0) {
            return Err("rebalance interval must be at least one month".to_string());
        }
        Ok(Self {
            weights,
            interval_months,
            last_rebalance: None,
            trades: Vec::new(),
        })
    }

    pub fn weights(&self) -> &[TargetWeight] {
        &self.weights
    }

    fn prices(&self, observation: &Observation) -> Option<Vec<f64>> {
        self.weights
            .iter()
            .map(|target| observation.close(&target.instrument_id))
            .collect()
    }

    /// Index of the first observation quoting every instrument, the earliest a
    /// weighted portfolio can be opened.
    pub fn first_fully_quoted(&self, observations: &[Observation]) -> Option<usize> {
        observations
            .iter()
            .position(|obs| self.prices(obs).is_some())
    }

    pub fn initial_state(&self, capital: f64, first: &Observation) -> Result<NetWorthState, String> {
        if !capital.is_finite() || capital <= 0.0 {
            return Err(format!("initial capital must be > 0 (got {capital})"));
        }
        let prices = self.prices(first).ok_or_else(|| {
            format!(
                "cannot open portfolio on {}: not every instrument has a price",
                first.date
            )
        })?;
        let mut state = NetWorthState::with_cash(first.date, capital);
        for (target, price) in self.weights.iter().zip(prices) {
            state.set_position_value(&target.instrument_id, price, capital * target.weight)?;
        }
        Ok(state)
    }

    fn due(&self, date: NaiveDate) -> bool {
        match (self.interval_months, self.last_rebalance) {
            (Some(interval), Some(last)) => {
                calendar_months_between(last, date) >= i32::try_from(interval).unwrap_or(i32::MAX)
            }
            _ => false,
        }
    }
}

impl Policy for WeightedRebalance {
    fn name(&self) -> &str {
        "weighted_rebalance"
    }

    fn apply(
        &mut self,
        ctx: &StepContext<'_>,
        mut state: NetWorthState,
    ) -> Result<NetWorthState, String> {
        if self.last_rebalance.is_none() {
            self.last_rebalance = Some(ctx.date());
            return Ok(state);
        }
        if !self.due(ctx.date()) {
            return Ok(state);
        }
        let Some(prices) = self.prices(ctx.observation) else {
            return Ok(state);
        };

        let value_before = state.value_by_asset();
        let total = state.total_value;
        let mut orders: Vec<(&TargetWeight, f64, f64)> = self
            .weights
            .iter()
            .zip(prices)
            .map(|(target, price)| {
                let delta = total * target.weight - state.shares(&target.instrument_id) * price;
                (target, price, delta)
            })
            .collect();
        // Sells settle before buys so cash never dips below what the buys need.
        orders.sort_by(|a, b| a.2.total_cmp(&b.2));
        for (target, price, _) in orders {
            state.set_position_value(&target.instrument_id, price, total * target.weight)?;
        }

        self.last_rebalance = Some(ctx.date());
        self.trades.push(TradeRecord {
            date: ctx.date(),
            kind: TradeKind::Rebalance,
            target: TradeTarget::Weights,
            value_before,
            value_after: state.value_by_asset(),
            signal_value: None,
        });
        Ok(state)
    }

    fn drain_trades(&mut self) -> Vec<TradeRecord> {
        std::mem::take(&mut self.trades)
    }
}
