use crate::value_objects::position::{AssetPosition, PositionDelta};
use crate::value_objects::trade::CASH_ASSET;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Absolute tolerance (currency units) for `total_value == positions + cash`.
pub const VALUE_TOLERANCE: f64 = 1e-2;

/// Portfolio snapshot for one simulated day.
///
/// Policies move value between cash and positions through the helpers below,
/// which keep `total_value` consistent. Writing the fields directly is allowed,
/// but the simulator rejects a state whose total drifts from its parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetWorthState {
    pub date: NaiveDate,
    pub positions: Vec<AssetPosition>,
    pub cash: f64,
    pub total_value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cash_interest_this_step: Option<f64>,
    pub cash_delta: f64,
    pub position_deltas: Vec<PositionDelta>,
}

impl NetWorthState {
    pub fn with_cash(date: NaiveDate, cash: f64) -> Self {
        Self {
            date,
            positions: Vec::new(),
            cash,
            total_value: cash,
            cash_interest_this_step: None,
            cash_delta: 0.0,
            position_deltas: Vec::new(),
        }
    }

    /// Next day's state: same holdings, step-local fields cleared.
    pub fn carry_forward(&self, date: NaiveDate) -> Self {
        Self {
            date,
            positions: self.positions.clone(),
            cash: self.cash,
            total_value: self.total_value,
            cash_interest_this_step: None,
            cash_delta: 0.0,
            position_deltas: Vec::new(),
        }
    }

    pub fn positions_value(&self) -> f64 {
        self.positions.iter().map(AssetPosition::value).sum()
    }

    pub fn recompute_total(&mut self) {
        self.total_value = self.positions_value() + self.cash;
    }

    pub fn invariant_gap(&self) -> f64 {
        (self.total_value - (self.positions_value() + self.cash)).abs()
    }

    pub fn check_invariant(&self) -> Result<(), String> {
        let gap = self.invariant_gap();
        if !gap.is_finite() || !self.cash.is_finite() {
            return Err(format!(
                "non-finite portfolio value on {} (cash={}, total={})",
                self.date, self.cash, self.total_value
            ));
        }
        if gap >= VALUE_TOLERANCE {
            return Err(format!(
                "total value {:.4} differs from positions + cash {:.4} on {}",
                self.total_value,
                self.positions_value() + self.cash,
                self.date
            ));
        }
        Ok(())
    }

    pub fn position(&self, instrument_id: &str) -> Option<&AssetPosition> {
        self.positions
            .iter()
            .find(|pos| pos.instrument_id == instrument_id)
    }

    pub fn shares(&self, instrument_id: &str) -> f64 {
        self.position(instrument_id)
            .map(|pos| pos.shares)
            .unwrap_or(0.0)
    }

    pub fn position_value(&self, instrument_id: &str) -> f64 {
        self.position(instrument_id)
            .map(AssetPosition::value)
            .unwrap_or(0.0)
    }

    /// Fraction of total value held in `instrument_id`.
    pub fn holding_ratio(&self, instrument_id: &str) -> f64 {
        if self.total_value <= 0.0 {
            return 0.0;
        }
        self.position_value(instrument_id) / self.total_value
    }

    pub fn value_by_asset(&self) -> BTreeMap<String, f64> {
        let mut values: BTreeMap<String, f64> = self
            .positions
            .iter()
            .map(|pos| (pos.instrument_id.clone(), pos.value()))
            .collect();
        values.insert(CASH_ASSET.to_string(), self.cash);
        values
    }

    fn position_entry(&mut self, instrument_id: &str, price: f64) -> &mut AssetPosition {
        let idx = match self
            .positions
            .iter()
            .position(|pos| pos.instrument_id == instrument_id)
        {
            Some(idx) => idx,
            None => {
                self.positions
                    .push(AssetPosition::new(instrument_id, 0.0, price));
                self.positions.len() - 1
            }
        };
        &mut self.positions[idx]
    }

    /// Resizes `instrument_id` so it is worth `target_value` at `price`, settling the
    /// difference against cash. Total value is unchanged (beyond repricing the position).
    pub fn set_position_value(
        &mut self,
        instrument_id: &str,
        price: f64,
        target_value: f64,
    ) -> Result<(), String> {
        if !price.is_finite() || price <= 0.0 {
            return Err(format!(
                "cannot trade {instrument_id} at non-positive price {price}"
            ));
        }
        if !target_value.is_finite() || target_value < 0.0 {
            return Err(format!(
                "invalid target value {target_value} for {instrument_id}"
            ));
        }

        let position = self.position_entry(instrument_id, price);
        position.last_price = price;
        let before = position.value();
        position.shares = target_value / price;
        let after = position.value();
        self.cash -= after - before;
        self.recompute_total();
        Ok(())
    }

    /// Moves up to `amount` of cash into `instrument_id`. Returns the amount spent.
    pub fn buy_with_cash(
        &mut self,
        instrument_id: &str,
        price: f64,
        amount: f64,
    ) -> Result<f64, String> {
        let spend = amount.min(self.cash).max(0.0);
        if spend <= 0.0 {
            return Ok(0.0);
        }
        let target = self.position(instrument_id).map_or(0.0, |pos| pos.shares * price) + spend;
        self.set_position_value(instrument_id, price, target)?;
        Ok(spend)
    }
}

#[cfg(test)]
mod tests {
    use super::NetWorthState;
    use chrono::NaiveDate;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).expect("date")
    }

    #[test]
    fn set_position_value_conserves_total() {
        let mut state = NetWorthState::with_cash(day(), 1_000.0);
        state
            .set_position_value("AAA", 20.0, 600.0)
            .expect("buy");
        assert!((state.shares("AAA") - 30.0).abs() < 1e-9);
        assert!((state.cash - 400.0).abs() < 1e-9);
        assert!((state.total_value - 1_000.0).abs() < 1e-9);
        state.check_invariant().expect("invariant");

        state
            .set_position_value("AAA", 20.0, 100.0)
            .expect("sell");
        assert!((state.cash - 900.0).abs() < 1e-9);
        assert!((state.holding_ratio("AAA") - 0.1).abs() < 1e-12);
    }

    #[test]
    fn buy_with_cash_never_overdraws() {
        let mut state = NetWorthState::with_cash(day(), 50.0);
        let spent = state.buy_with_cash("AAA", 10.0, 80.0).expect("buy");
        assert!((spent - 50.0).abs() < 1e-12);
        assert!(state.cash.abs() < 1e-9);
        assert!((state.shares("AAA") - 5.0).abs() < 1e-12);
    }

    #[test]
    fn check_invariant_flags_tampered_totals() {
        let mut state = NetWorthState::with_cash(day(), 100.0);
        state.cash += 1.0;
        let err = state.check_invariant().expect_err("drifted");
        assert!(err.contains("differs"));
    }

    #[test]
    fn set_position_value_rejects_bad_price() {
        let mut state = NetWorthState::with_cash(day(), 100.0);
        assert!(state.set_position_value("AAA", 0.0, 10.0).is_err());
        assert!(state.set_position_value("AAA", f64::NAN, 10.0).is_err());
    }
}
