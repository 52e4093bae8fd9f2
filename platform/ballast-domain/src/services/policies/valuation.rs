use crate::entities::net_worth::NetWorthState;
use crate::repositories::rates::RateSource;
use crate::services::calendar::fractional_months_between;
use crate::services::policies::ratio::RatioBand;
use crate::services::policies::signal::SignalKind;
use crate::services::policies::{Policy, StepContext};
use crate::value_objects::observation::Observation;
use crate::value_objects::trade::{TradeKind, TradeRecord, TradeTarget};
use chrono::NaiveDate;

/// Smallest ratio change (fraction of total value) worth trading on.
pub const DEFAULT_DEADBAND: f64 = 0.01;

/// Periodic review of a single risk asset against cash.
///
/// Every `review_interval_months` the signal is mapped through the band; the
/// position is resized when the new level differs from the held one by at least
/// `deadband`. The interval is measured as a fractional month difference from
/// the previous review, so a review lands on the first observation at or after
/// the same day-of-month N months later.
#[derive(Debug, Clone)]
pub struct ValuationRebalance {
    instrument_id: String,
    signal: SignalKind,
    band: RatioBand,
    review_interval_months: f64,
    deadband: f64,
    drift_threshold: Option<f64>,
    last_review: Option<NaiveDate>,
    held_ratio: f64,
    trades: Vec<TradeRecord>,
}

impl ValuationRebalance {
    pub fn new(
        instrument_id: impl Into<String>,
        signal: SignalKind,
        band: RatioBand,
        review_interval_months: f64,
    ) -> Result<Self, String> {
        let instrument_id = instrument_id.into();
        if instrument_id.trim().is_empty() {
            return Err("valuation rebalance needs an instrument id".to_string());
        }
        band.validate()?;
        if !review_interval_months.is_finite() || review_interval_months <= 0.0 {
            return Err(format!(
                "review interval must be > 0 months (got {review_interval_months})"
            ));
        }
        Ok(Self {
            instrument_id,
            signal,
            band,
            review_interval_months,
            deadband: DEFAULT_DEADBAND,
            drift_threshold: None,
            last_review: None,
            held_ratio: 0.0,
            trades: Vec::new(),
        })
    }

    pub fn with_deadband(mut self, deadband: f64) -> Result<Self, String> {
        if !deadband.is_finite() || !(0.0..1.0).contains(&deadband) {
            return Err(format!("deadband must be within [0, 1) (got {deadband})"));
        }
        self.deadband = deadband;
        Ok(self)
    }

    /// Also rebalance on review when the actual holding has drifted at least
    /// `threshold` away from the unchanged target level.
    pub fn with_drift_threshold(mut self, threshold: f64) -> Result<Self, String> {
        if !threshold.is_finite() || threshold <= 0.0 || threshold >= 1.0 {
            return Err(format!(
                "drift threshold must be within (0, 1) (got {threshold})"
            ));
        }
        self.drift_threshold = Some(threshold);
        Ok(self)
    }

    pub fn instrument_id(&self) -> &str {
        &self.instrument_id
    }

    pub fn band(&self) -> &RatioBand {
        &self.band
    }

    pub fn held_ratio(&self) -> f64 {
        self.held_ratio
    }

    pub fn last_review(&self) -> Option<NaiveDate> {
        self.last_review
    }

    /// Opening allocation: `capital * target_ratio(signal)` in the instrument, the rest
    /// in cash. Without a usable price or signal on `first` the run starts all in cash.
    pub fn initial_state(
        &self,
        capital: f64,
        first: &Observation,
        rates: &dyn RateSource,
    ) -> Result<NetWorthState, String> {
        if !capital.is_finite() || capital <= 0.0 {
            return Err(format!("initial capital must be > 0 (got {capital})"));
        }
        let mut state = NetWorthState::with_cash(first.date, capital);
        let price = first.close(&self.instrument_id);
        let signal = self.signal.read(&self.instrument_id, first, rates);
        if let (Some(price), Some(signal)) = (price, signal) {
            let ratio = self.band.target_ratio(signal);
            state.set_position_value(&self.instrument_id, price, capital * ratio)?;
        }
        Ok(state)
    }

    fn drift_exceeded(&self, state: &NetWorthState, target: f64) -> bool {
        self.drift_threshold
            .is_some_and(|t| (state.holding_ratio(&self.instrument_id) - target).abs() >= t)
    }
}

impl Policy for ValuationRebalance {
    fn name(&self) -> &str {
        "valuation_rebalance"
    }

    fn apply(
        &mut self,
        ctx: &StepContext<'_>,
        mut state: NetWorthState,
    ) -> Result<NetWorthState, String> {
        let Some(signal) = self
            .signal
            .read(&self.instrument_id, ctx.observation, ctx.rates)
        else {
            return Ok(state);
        };
        let Some(price) = ctx.observation.close(&self.instrument_id) else {
            return Ok(state);
        };

        let Some(last_review) = self.last_review else {
            self.last_review = Some(ctx.date());
            self.held_ratio = state.holding_ratio(&self.instrument_id);
            return Ok(state);
        };
        if fractional_months_between(last_review, ctx.date()) < self.review_interval_months {
            return Ok(state);
        }
        self.last_review = Some(ctx.date());

        let target = self.band.target_ratio(signal);
        let kind = if (target - self.held_ratio).abs() >= self.deadband {
            if target < self.held_ratio {
                TradeKind::Sell
            } else {
                TradeKind::Buy
            }
        } else if self.drift_exceeded(&state, target) {
            TradeKind::Rebalance
        } else {
            return Ok(state);
        };

        let value_before = state.value_by_asset();
        let target_value = state.total_value * target;
        state.set_position_value(&self.instrument_id, price, target_value)?;
        self.held_ratio = target;
        self.trades.push(TradeRecord {
            date: ctx.date(),
            kind,
            target: TradeTarget::Ratio(target),
            value_before,
            value_after: state.value_by_asset(),
            signal_value: Some(signal),
        });
        Ok(state)
    }

    fn drain_trades(&mut self) -> Vec<TradeRecord> {
        std::mem::take(&mut self.trades)
    }
}

#[cfg(test)]
mod tests {
    use super::ValuationRebalance;
    use crate::entities::net_worth::NetWorthState;
    use crate::services::policies::ratio::{BandDirection, RatioBand};
    use crate::services::policies::signal::SignalKind;
    use crate::services::policies::{Policy, StepContext};
    use crate::services::rates::FixedRate;
    use crate::value_objects::observation::Observation;
    use crate::value_objects::price_point::PricePoint;
    use crate::value_objects::trade::{TradeKind, TradeTarget};
    use chrono::NaiveDate;

    fn band() -> RatioBand {
        RatioBand {
            min: 0.1,
            max: 0.6,
            low_bound: 11.0,
            high_bound: 16.0,
            levels: 6,
            direction: BandDirection::Inverse,
        }
    }

    fn obs(y: i32, m: u32, d: u32, pe: Option<f64>) -> Observation {
        let mut point = PricePoint::new(NaiveDate::from_ymd_opt(y, m, d).expect("date"), 10.0);
        point.valuation_metric = pe;
        Observation::single("IDX", point)
    }

    fn step(
        policy: &mut ValuationRebalance,
        observation: &Observation,
        state: NetWorthState,
    ) -> NetWorthState {
        let rates = FixedRate(0.0);
        let ctx = StepContext {
            index: 0,
            observation,
            previous_date: None,
            rates: &rates,
        };
        let mut state = state.carry_forward(observation.date);
        state.recompute_total();
        policy.apply(&ctx, state).expect("apply")
    }

    #[test]
    fn first_observation_only_seeds() {
        let mut policy =
            ValuationRebalance::new("IDX", SignalKind::PeRatio, band(), 6.0).expect("policy");
        let first = obs(2021, 1, 1, Some(16.0));
        let state = policy
            .initial_state(1_000.0, &first, &FixedRate(0.0))
            .expect("initial");
        let state = step(&mut policy, &first, state);

        assert!(policy.drain_trades().is_empty());
        assert_eq!(policy.last_review(), Some(first.date));
        assert!((policy.held_ratio() - 0.1).abs() < 1e-12);
        assert!((state.position_value("IDX") - 100.0).abs() < 1e-9);
    }

    #[test]
    fn review_trades_only_after_interval() {
        let mut policy =
            ValuationRebalance::new("IDX", SignalKind::PeRatio, band(), 6.0).expect("policy");
        let first = obs(2021, 1, 1, Some(12.0));
        let state = policy
            .initial_state(1_000.0, &first, &FixedRate(0.0))
            .expect("initial");
        let state = step(&mut policy, &first, state);
        let state = step(&mut policy, &obs(2021, 6, 30, Some(16.0)), state);
        assert!(policy.drain_trades().is_empty());

        let state = step(&mut policy, &obs(2021, 7, 1, Some(16.0)), state);
        let trades = policy.drain_trades();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].kind, TradeKind::Sell);
        assert_eq!(trades[0].target, TradeTarget::Ratio(0.1));
        assert_eq!(trades[0].signal_value, Some(16.0));
        assert!((state.holding_ratio("IDX") - 0.1).abs() < 1e-12);
        state.check_invariant().expect("invariant");
    }

    #[test]
    fn deadband_suppresses_small_moves() {
        let mut policy = ValuationRebalance::new("IDX", SignalKind::PeRatio, band(), 1.0)
            .expect("policy")
            .with_deadband(0.15)
            .expect("deadband");
        let first = obs(2021, 1, 1, Some(12.0));
        let state = policy
            .initial_state(1_000.0, &first, &FixedRate(0.0))
            .expect("initial");
        let state = step(&mut policy, &first, state);
        // 13.0 maps to 0.4, one level (0.1) away from 0.5.
        let state = step(&mut policy, &obs(2021, 2, 1, Some(13.0)), state);
        assert!(policy.drain_trades().is_empty());
        assert!((state.holding_ratio("IDX") - 0.5).abs() < 1e-12);
    }

    #[test]
    fn missing_signal_skips_without_consuming_review() {
        let mut policy =
            ValuationRebalance::new("IDX", SignalKind::PeRatio, band(), 1.0).expect("policy");
        let first = obs(2021, 1, 1, Some(12.0));
        let state = policy
            .initial_state(1_000.0, &first, &FixedRate(0.0))
            .expect("initial");
        let state = step(&mut policy, &first, state);
        let state = step(&mut policy, &obs(2021, 2, 1, None), state);
        assert!(policy.drain_trades().is_empty());
        assert_eq!(policy.last_review(), Some(first.date));

        step(&mut policy, &obs(2021, 2, 2, Some(9.0)), state);
        let trades = policy.drain_trades();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].kind, TradeKind::Buy);
    }

    #[test]
    fn drift_threshold_restores_target() {
        let mut policy = ValuationRebalance::new("IDX", SignalKind::PeRatio, band(), 1.0)
            .expect("policy")
            .with_drift_threshold(0.05)
            .expect("drift");
        let first = obs(2021, 1, 1, Some(12.0));
        let state = policy
            .initial_state(1_000.0, &first, &FixedRate(0.0))
            .expect("initial");
        let mut state = step(&mut policy, &first, state);

        // Price doubles: holding drifts from 0.5 to 2/3.
        let mut rallied = obs(2021, 2, 1, Some(12.0));
        if let Some(quote) = rallied.quotes.get_mut("IDX") {
            quote.close_price = Some(20.0);
        }
        state.positions[0].last_price = 20.0;
        let state = step(&mut policy, &rallied, state);
        let trades = policy.drain_trades();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].kind, TradeKind::Rebalance);
        assert!((state.holding_ratio("IDX") - 0.5).abs() < 1e-9);
    }

    #[test]
    fn constructor_rejects_bad_parameters() {
        assert!(ValuationRebalance::new("IDX", SignalKind::PeRatio, band(), 0.0).is_err());
        assert!(ValuationRebalance::new("", SignalKind::PeRatio, band(), 6.0).is_err());
        let bad_band = RatioBand { levels: 1, ..band() };
        assert!(ValuationRebalance::new("IDX", SignalKind::PeRatio, bad_band, 6.0).is_err());
        let policy =
            ValuationRebalance::new("IDX", SignalKind::PeRatio, band(), 6.0).expect("policy");
        assert!(policy.with_deadband(1.5).is_err());
    }
}
