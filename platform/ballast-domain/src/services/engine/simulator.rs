use crate::entities::net_worth::NetWorthState;
use crate::repositories::rates::RateSource;
use crate::services::calendar::same_month;
use crate::services::policies::{Policy, StepContext};
use crate::value_objects::observation::Observation;
use crate::value_objects::position::PositionDelta;
use crate::value_objects::trade::{merge_trades, TradeRecord};
use chrono::NaiveDate;

const SHARE_EPSILON: f64 = 1e-9;

/// Advances `initial` through `observations` (date-ascending), one state per observation.
///
/// Each step marks positions to the day's close, accrues one month of cash interest
/// when the calendar month changed, then runs `policies` in order, each receiving
/// the previous one's output. The value invariant is checked before the policies
/// and after each of them; a violation or a policy error aborts the run.
pub fn simulate<P: Policy>(
    observations: &[Observation],
    initial: NetWorthState,
    policies: &mut [P],
    rates: &dyn RateSource,
) -> Result<Vec<NetWorthState>, String> {
    let mut timeline: Vec<NetWorthState> = Vec::with_capacity(observations.len());
    let mut previous_date: Option<NaiveDate> = None;

    for (index, observation) in observations.iter().enumerate() {
        let mut state = match timeline.last() {
            Some(prev) => prev.carry_forward(observation.date),
            None => initial.carry_forward(observation.date),
        };

        for position in &mut state.positions {
            if let Some(price) = observation.close(&position.instrument_id) {
                position.last_price = price;
            }
        }

        if let Some(prev) = previous_date {
            if !same_month(prev, observation.date) {
                let interest = state.cash * rates.monthly_rate(observation.date);
                state.cash += interest;
                state.cash_interest_this_step = Some(interest);
            }
        }

        state.recompute_total();
        state.check_invariant()?;
        let before = state.clone();

        let ctx = StepContext {
            index,
            observation,
            previous_date,
            rates,
        };
        for policy in policies.iter_mut() {
            state = policy.apply(&ctx, state).map_err(|err| {
                format!("policy {} failed on {}: {err}", policy.name(), observation.date)
            })?;
            state.check_invariant().map_err(|err| {
                format!("policy {} broke the portfolio: {err}", policy.name())
            })?;
        }

        state.recompute_total();
        state.cash_delta = state.cash - before.cash;
        state.position_deltas = position_deltas(&before, &state);
        previous_date = Some(observation.date);
        timeline.push(state);
    }

    Ok(timeline)
}

fn position_deltas(before: &NetWorthState, after: &NetWorthState) -> Vec<PositionDelta> {
    let mut deltas: Vec<PositionDelta> = after
        .positions
        .iter()
        .map(|pos| PositionDelta {
            instrument_id: pos.instrument_id.clone(),
            shares: pos.shares - before.shares(&pos.instrument_id),
            price: pos.last_price,
        })
        .collect();
    deltas.extend(
        before
            .positions
            .iter()
            .filter(|pos| after.position(&pos.instrument_id).is_none())
            .map(|pos| PositionDelta {
                instrument_id: pos.instrument_id.clone(),
                shares: -pos.shares,
                price: pos.last_price,
            }),
    );
    deltas.retain(|delta| delta.shares.abs() > SHARE_EPSILON);
    deltas
}

pub struct SimulationOutput {
    pub timeline: Vec<NetWorthState>,
    pub trades: Vec<TradeRecord>,
}

/// Owns a policy pipeline for one run and collects its trades afterwards.
pub struct Simulation<'a> {
    rates: &'a dyn RateSource,
    policies: Vec<Box<dyn Policy + 'a>>,
}

impl<'a> Simulation<'a> {
    pub fn new(rates: &'a dyn RateSource) -> Self {
        Self {
            rates,
            policies: Vec::new(),
        }
    }

    pub fn with_policy(mut self, policy: impl Policy + 'a) -> Self {
        self.policies.push(Box::new(policy));
        self
    }

    pub fn with_boxed(mut self, policies: Vec<Box<dyn Policy + 'a>>) -> Self {
        self.policies.extend(policies);
        self
    }

    pub fn policy_names(&self) -> Vec<String> {
        self.policies.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn run(
        mut self,
        observations: &[Observation],
        initial: NetWorthState,
    ) -> Result<SimulationOutput, String> {
        let timeline = simulate(observations, initial, &mut self.policies, self.rates)?;
        let trades = merge_trades(
            self.policies
                .iter_mut()
                .map(|policy| policy.drain_trades())
                .collect(),
        );
        Ok(SimulationOutput { timeline, trades })
    }
}
