use crate::config::{Config, StrategyKind, ValuationConfig};
use ballast_domain::entities::net_worth::NetWorthState;
use ballast_domain::repositories::rates::RateSource;
use ballast_domain::services::policies::contribution::ScheduledContribution;
use ballast_domain::services::policies::ratio::RatioBand;
use ballast_domain::services::policies::valuation::ValuationRebalance;
use ballast_domain::services::policies::weighted::{TargetWeight, WeightedRebalance};
use ballast_domain::services::policies::Policy;
use ballast_domain::value_objects::observation::Observation;

/// A configured strategy ready to simulate.
pub struct StrategyPlan {
    pub kind: StrategyKind,
    pub policies: Vec<Box<dyn Policy>>,
    pub initial: NetWorthState,
    /// First observation the run simulates; earlier ones cannot open the strategy.
    pub start_index: usize,
}

impl StrategyPlan {
    pub fn policy_names(&self) -> Vec<String> {
        self.policies.iter().map(|p| p.name().to_string()).collect()
    }
}

pub fn build_band(valuation: &ValuationConfig) -> RatioBand {
    RatioBand {
        min: valuation.min_ratio,
        max: valuation.max_ratio,
        low_bound: valuation.low_bound,
        high_bound: valuation.high_bound,
        levels: valuation.levels,
        direction: valuation
            .direction
            .unwrap_or_else(|| valuation.signal.default_direction()),
    }
}

pub fn build_valuation_policy(valuation: &ValuationConfig) -> Result<ValuationRebalance, String> {
    let mut policy = ValuationRebalance::new(
        valuation.instrument_id.clone(),
        valuation.signal,
        build_band(valuation),
        valuation.review_interval_months,
    )?;
    if let Some(deadband) = valuation.deadband {
        policy = policy.with_deadband(deadband)?;
    }
    if let Some(threshold) = valuation.drift_threshold {
        policy = policy.with_drift_threshold(threshold)?;
    }
    Ok(policy)
}

pub fn build_dca_policy(config: &Config) -> Result<ScheduledContribution, String> {
    let dca = config
        .strategy
        .dca
        .as_ref()
        .ok_or_else(|| "strategy.kind=dca requires [strategy.dca]".to_string())?;
    let budget = dca.budget.unwrap_or(config.run.initial_capital);
    ScheduledContribution::new(dca.instrument_id.clone(), dca.months, budget)
}

pub fn build_weighted_policy(config: &Config) -> Result<WeightedRebalance, String> {
    let portfolio = config
        .strategy
        .portfolio
        .as_ref()
        .ok_or_else(|| "strategy.kind=portfolio requires [strategy.portfolio]".to_string())?;
    let weights = portfolio
        .weights
        .iter()
        .map(|w| TargetWeight {
            instrument_id: w.instrument_id.clone(),
            weight: w.weight,
        })
        .collect();
    WeightedRebalance::new(weights, portfolio.rebalance_interval_months)
}

fn first_priced(observations: &[Observation], instrument_id: &str) -> Result<usize, String> {
    observations
        .iter()
        .position(|obs| obs.close(instrument_id).is_some())
        .ok_or_else(|| format!("no usable close price for {instrument_id} in the selected range"))
}

/// Turns the `[strategy]` section into policies plus the opening portfolio.
/// `observations` must be non-empty.
pub fn build_strategy(
    config: &Config,
    observations: &[Observation],
    rates: &dyn RateSource,
) -> Result<StrategyPlan, String> {
    if observations.is_empty() {
        return Err("cannot build a strategy without observations".to_string());
    }
    let capital = config.run.initial_capital;
    let kind = config.strategy.kind;

    match kind {
        StrategyKind::ValuationBalance => {
            let valuation = config.strategy.valuation.as_ref().ok_or_else(|| {
                "strategy.kind=valuation_balance requires [strategy.valuation]".to_string()
            })?;
            let policy = build_valuation_policy(valuation)?;
            let start_index = first_priced(observations, &valuation.instrument_id)?;
            let initial = policy.initial_state(capital, &observations[start_index], rates)?;
            Ok(StrategyPlan {
                kind,
                policies: vec![Box::new(policy)],
                initial,
                start_index,
            })
        }
        StrategyKind::Dca => {
            let policy = build_dca_policy(config)?;
            Ok(StrategyPlan {
                kind,
                policies: vec![Box::new(policy)],
                initial: NetWorthState::with_cash(observations[0].date, capital),
                start_index: 0,
            })
        }
        StrategyKind::Portfolio => {
            let policy = build_weighted_policy(config)?;
            let start_index = policy.first_fully_quoted(observations).ok_or_else(|| {
                "no date has a usable price for every portfolio instrument".to_string()
            })?;
            let initial = policy.initial_state(capital, &observations[start_index])?;
            Ok(StrategyPlan {
                kind,
                policies: vec![Box::new(policy)],
                initial,
                start_index,
            })
        }
        StrategyKind::CashBonds => Ok(control_plan(config, observations, 0)),
    }
}

/// Cash-in-bonds baseline over the same window: all cash, interest only.
pub fn control_plan(config: &Config, observations: &[Observation], start_index: usize) -> StrategyPlan {
    let date = observations
        .get(start_index)
        .or_else(|| observations.first())
        .map(|obs| obs.date)
        .unwrap_or_default();
    StrategyPlan {
        kind: StrategyKind::CashBonds,
        policies: Vec::new(),
        initial: NetWorthState::with_cash(date, config.run.initial_capital),
        start_index,
    }
}
