//! Rebalancing policies.
//!
//! A policy pairs a decision trigger (when to act) with an allocation rule
//! (what to hold). Policies run as a pipeline inside the simulator: each one
//! receives the state produced by the previous one and may keep its own
//! bookkeeping across the whole run.

pub mod contribution;
pub mod ratio;
pub mod signal;
pub mod valuation;
pub mod weighted;

use crate::entities::net_worth::NetWorthState;
use crate::repositories::rates::RateSource;
use crate::value_objects::observation::Observation;
use crate::value_objects::trade::TradeRecord;
use chrono::NaiveDate;

/// Read-only view of the step being simulated.
pub struct StepContext<'a> {
    pub index: usize,
    pub observation: &'a Observation,
    pub previous_date: Option<NaiveDate>,
    pub rates: &'a dyn RateSource,
}

impl StepContext<'_> {
    pub fn date(&self) -> NaiveDate {
        self.observation.date
    }

    pub fn is_first(&self) -> bool {
        self.previous_date.is_none()
    }
}

pub trait Policy {
    fn name(&self) -> &str;

    /// Returns the state after this policy's decision for the step. Skipping the
    /// step means returning `state` untouched.
    fn apply(
        &mut self,
        ctx: &StepContext<'_>,
        state: NetWorthState,
    ) -> Result<NetWorthState, String>;

    fn drain_trades(&mut self) -> Vec<TradeRecord> {
        Vec::new()
    }
}

impl<P: Policy + ?Sized> Policy for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn apply(
        &mut self,
        ctx: &StepContext<'_>,
        state: NetWorthState,
    ) -> Result<NetWorthState, String> {
        (**self).apply(ctx, state)
    }

    fn drain_trades(&mut self) -> Vec<TradeRecord> {
        (**self).drain_trades()
    }
}
