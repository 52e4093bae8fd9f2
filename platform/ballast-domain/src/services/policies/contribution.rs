use crate::entities::net_worth::NetWorthState;
use crate::services::calendar::month_key;
use crate::services::policies::{Policy, StepContext};
use crate::value_objects::trade::{TradeKind, TradeRecord, TradeTarget};

/// Dollar-cost averaging: moves `budget / months` from cash into one instrument
/// on the first priced observation of each calendar month, until `months`
/// contributions were made or the budget is spent.
#[derive(Debug, Clone)]
pub struct ScheduledContribution {
    instrument_id: String,
    months: u32,
    budget: f64,
    monthly_amount: f64,
    invested: f64,
    months_done: u32,
    last_month: Option<(i32, u32)>,
    trades: Vec<TradeRecord>,
}

impl ScheduledContribution {
    pub fn new(instrument_id: impl Into<String>, months: u32, budget: f64) -> Result<Self, String> {
        let instrument_id = instrument_id.into();
        if instrument_id.trim().is_empty() {
            return Err("scheduled contribution needs an instrument id".to_string());
        }
        if months == 0 {
            return Err("scheduled contribution needs at least one month".to_string());
        }
        if !budget.is_finite() || budget <= 0.0 {
            return Err(format!("contribution budget must be > 0 (got {budget})"));
        }
        Ok(Self {
            instrument_id,
            months,
            budget,
            monthly_amount: budget / f64::from(months),
            invested: 0.0,
            months_done: 0,
            last_month: None,
            trades: Vec::new(),
        })
    }

    pub fn instrument_id(&self) -> &str {
        &self.instrument_id
    }

    pub fn monthly_amount(&self) -> f64 {
        self.monthly_amount
    }

    pub fn invested(&self) -> f64 {
        self.invested
    }

    pub fn months_done(&self) -> u32 {
        self.months_done
    }

    pub fn is_finished(&self) -> bool {
        self.months_done >= self.months || self.budget - self.invested <= 0.0
    }
}

impl Policy for ScheduledContribution {
    fn name(&self) -> &str {
        "scheduled_contribution"
    }

    fn apply(
        &mut self,
        ctx: &StepContext<'_>,
        mut state: NetWorthState,
    ) -> Result<NetWorthState, String> {
        if self.is_finished() {
            return Ok(state);
        }
        let month = month_key(ctx.date());
        if self.last_month == Some(month) {
            return Ok(state);
        }
        // An unpriced day leaves the month open for the next observation.
        let Some(price) = ctx.observation.close(&self.instrument_id) else {
            return Ok(state);
        };

        let amount = self
            .monthly_amount
            .min(self.budget - self.invested)
            .min(state.cash);
        self.last_month = Some(month);
        if amount <= 0.0 {
            return Ok(state);
        }

        let value_before = state.value_by_asset();
        let spent = state.buy_with_cash(&self.instrument_id, price, amount)?;
        self.invested += spent;
        self.months_done += 1;
        self.trades.push(TradeRecord {
            date: ctx.date(),
            kind: TradeKind::Contribution,
            target: TradeTarget::Amount(spent),
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

#[cfg(test)]
mod tests {
    use super::ScheduledContribution;
    use crate::entities::net_worth::NetWorthState;
    use crate::services::policies::{Policy, StepContext};
    use crate::services::rates::FixedRate;
    use crate::value_objects::observation::Observation;
    use crate::value_objects::price_point::PricePoint;
    use chrono::NaiveDate;

    fn run(policy: &mut ScheduledContribution, days: &[(u32, u32, Option<f64>)]) -> NetWorthState {
        let rates = FixedRate(0.0);
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).expect("date");
        let mut state = NetWorthState::with_cash(start, 300.0);
        for (m, d, close) in days {
            let date = NaiveDate::from_ymd_opt(2020, *m, *d).expect("date");
            let mut point = PricePoint::new(date, 1.0);
            point.close_price = *close;
            let observation = Observation::single("FUND", point);
            let ctx = StepContext {
                index: 0,
                observation: &observation,
                previous_date: None,
                rates: &rates,
            };
            state = policy
                .apply(&ctx, state.carry_forward(date))
                .expect("apply");
        }
        state
    }

    #[test]
    fn contributes_once_per_calendar_month() {
        let mut policy = ScheduledContribution::new("FUND", 3, 300.0).expect("policy");
        let state = run(
            &mut policy,
            &[(1, 1, Some(1.0)), (1, 15, Some(1.0)), (2, 3, Some(2.0))],
        );
        assert_eq!(policy.months_done(), 2);
        assert!((policy.invested() - 200.0).abs() < 1e-9);
        assert!((state.cash - 100.0).abs() < 1e-9);
        assert!((state.shares("FUND") - 150.0).abs() < 1e-9);
        assert_eq!(policy.drain_trades().len(), 2);
    }

    #[test]
    fn stops_after_schedule_completes() {
        let mut policy = ScheduledContribution::new("FUND", 2, 200.0).expect("policy");
        let state = run(
            &mut policy,
            &[(1, 1, Some(1.0)), (2, 1, Some(1.0)), (3, 1, Some(1.0))],
        );
        assert!(policy.is_finished());
        assert!((state.cash - 100.0).abs() < 1e-9);
        assert_eq!(policy.drain_trades().len(), 2);
    }

    #[test]
    fn unpriced_day_defers_contribution_within_month() {
        let mut policy = ScheduledContribution::new("FUND", 3, 300.0).expect("policy");
        run(&mut policy, &[(1, 1, None), (1, 2, Some(1.0))]);
        let trades = policy.drain_trades();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].date, NaiveDate::from_ymd_opt(2020, 1, 2).expect("date"));
    }

    #[test]
    fn rejects_empty_schedule() {
        assert!(ScheduledContribution::new("FUND", 0, 100.0).is_err());
        assert!(ScheduledContribution::new("FUND", 12, -1.0).is_err());
    }
}
