//! Summary statistics and the per-year breakdown of a simulated timeline.
//!
//! Everything is computed in one forward pass. Percent outputs are scaled by 100.

use crate::entities::net_worth::NetWorthState;
use crate::entities::performance::{DailyValue, PositionSnapshot, StrategyResult, YearlyDetail};
use chrono::Datelike;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateOptions {
    pub include_positions: bool,
    pub include_cash: bool,
    pub include_invested_amount: bool,
}

impl AggregateOptions {
    pub fn all() -> Self {
        Self {
            include_positions: true,
            include_cash: true,
            include_invested_amount: true,
        }
    }
}

/// Running peak and deepest fall below it, as a fraction of the peak.
#[derive(Debug, Clone, Copy, Default)]
pub struct DrawdownTracker {
    peak: f64,
    max_drawdown: f64,
}

impl DrawdownTracker {
    pub fn record(&mut self, value: f64) {
        if value > self.peak {
            self.peak = value;
        } else if self.peak > 0.0 {
            let drawdown = (self.peak - value) / self.peak;
            if drawdown > self.max_drawdown {
                self.max_drawdown = drawdown;
            }
        }
    }

    pub fn max_drawdown(&self) -> f64 {
        self.max_drawdown
    }

    pub fn max_drawdown_pct(&self) -> f64 {
        self.max_drawdown * 100.0
    }
}

fn percent_change(value: f64, base: f64) -> f64 {
    if base <= 0.0 || !base.is_finite() {
        return 0.0;
    }
    let change = (value / base - 1.0) * 100.0;
    if change.is_finite() {
        change
    } else {
        0.0
    }
}

/// `((final / initial)^(365 / days) - 1) * 100`; 0 when no time elapsed or a value is not positive.
pub fn annualized_return_pct(initial: f64, final_value: f64, days: i64) -> f64 {
    if days <= 0 || initial <= 0.0 || final_value <= 0.0 {
        return 0.0;
    }
    let annualized = ((final_value / initial).powf(365.0 / days as f64) - 1.0) * 100.0;
    if annualized.is_finite() {
        annualized
    } else {
        0.0
    }
}

pub fn max_drawdown_pct(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut tracker = DrawdownTracker::default();
    for value in values {
        tracker.record(value);
    }
    tracker.max_drawdown_pct()
}

fn snapshot(state: &NetWorthState) -> BTreeMap<String, PositionSnapshot> {
    state
        .positions
        .iter()
        .map(|pos| {
            (
                pos.instrument_id.clone(),
                PositionSnapshot {
                    shares: pos.shares,
                    price: pos.last_price,
                    value: pos.value(),
                },
            )
        })
        .collect()
}

struct YearAccumulator<'a> {
    year: i32,
    first: &'a NetWorthState,
    last: &'a NetWorthState,
    interest: f64,
    bought: f64,
    sold: f64,
    trade_count: usize,
}

impl<'a> YearAccumulator<'a> {
    fn open(state: &'a NetWorthState) -> Self {
        let mut acc = Self {
            year: state.date.year(),
            first: state,
            last: state,
            interest: 0.0,
            bought: 0.0,
            sold: 0.0,
            trade_count: 0,
        };
        acc.absorb_flows(state);
        acc
    }

    fn push(&mut self, state: &'a NetWorthState) {
        self.last = state;
        self.absorb_flows(state);
    }

    fn absorb_flows(&mut self, state: &NetWorthState) {
        self.interest += state.cash_interest_this_step.unwrap_or(0.0);
        if state.position_deltas.is_empty() {
            return;
        }
        self.trade_count += 1;
        for delta in &state.position_deltas {
            let value = delta.value();
            if value > 0.0 {
                self.bought += value;
            } else {
                self.sold -= value;
            }
        }
    }

    fn finish(self, initial_capital: f64, options: AggregateOptions) -> YearlyDetail {
        let start_value = self.first.total_value;
        let end_value = self.last.total_value;
        let invested = (initial_capital - self.last.cash) - (initial_capital - self.first.cash);
        YearlyDetail {
            year: self.year,
            start_value,
            end_value,
            return_pct: percent_change(end_value, start_value),
            positions_start: options.include_positions.then(|| snapshot(self.first)),
            positions_end: options.include_positions.then(|| snapshot(self.last)),
            cash_start: options.include_cash.then_some(self.first.cash),
            cash_end: options.include_cash.then_some(self.last.cash),
            interest: options.include_cash.then_some(self.interest),
            bought_amount: self.bought,
            sold_amount: self.sold,
            invested_amount: options.include_invested_amount.then_some(invested.max(0.0)),
            trade_count: self.trade_count,
        }
    }
}

/// One entry per calendar year present in `timeline`, in order.
pub fn yearly_details(
    timeline: &[NetWorthState],
    initial_capital: f64,
    options: AggregateOptions,
) -> Vec<YearlyDetail> {
    let mut details = Vec::new();
    let mut current: Option<YearAccumulator<'_>> = None;
    for state in timeline {
        if let Some(acc) = current.as_mut() {
            if acc.year == state.date.year() {
                acc.push(state);
                continue;
            }
        }
        if let Some(done) = current.replace(YearAccumulator::open(state)) {
            details.push(done.finish(initial_capital, options));
        }
    }
    if let Some(done) = current {
        details.push(done.finish(initial_capital, options));
    }
    details
}

/// Derives the result of a run. Trades are attached separately with
/// [`StrategyResult::with_trades`]; an empty timeline gives the neutral result.
pub fn aggregate(
    timeline: &[NetWorthState],
    initial_capital: f64,
    options: AggregateOptions,
) -> StrategyResult {
    let (Some(first), Some(last)) = (timeline.first(), timeline.last()) else {
        return StrategyResult::neutral(initial_capital);
    };

    let mut drawdown = DrawdownTracker::default();
    let daily_values: Vec<DailyValue> = timeline
        .iter()
        .map(|state| {
            drawdown.record(state.total_value);
            DailyValue {
                date: state.date,
                value: state.total_value,
                change_percent: percent_change(state.total_value, initial_capital),
            }
        })
        .collect();

    let final_value = last.total_value;
    let days = (last.date - first.date).num_days();
    StrategyResult {
        trades: Vec::new(),
        daily_values,
        final_value,
        total_return_pct: percent_change(final_value, initial_capital),
        annualized_return_pct: annualized_return_pct(initial_capital, final_value, days),
        max_drawdown_pct: drawdown.max_drawdown_pct(),
        yearly_details: yearly_details(timeline, initial_capital, options),
    }
}

#[cfg(test)]
mod tests {
    use super::{aggregate, annualized_return_pct, max_drawdown_pct, AggregateOptions};
    use crate::entities::net_worth::NetWorthState;
    use crate::value_objects::position::PositionDelta;
    use chrono::NaiveDate;

    fn state(y: i32, m: u32, d: u32, cash: f64) -> NetWorthState {
        NetWorthState::with_cash(NaiveDate::from_ymd_opt(y, m, d).expect("date"), cash)
    }

    #[test]
    fn drawdown_tracks_running_peak() {
        let dd = max_drawdown_pct([100.0, 120.0, 90.0, 130.0, 117.0]);
        assert!((dd - 25.0).abs() < 1e-9);
        assert_eq!(max_drawdown_pct([100.0, 110.0, 120.0]), 0.0);
    }

    #[test]
    fn annualized_return_guards_degenerate_inputs() {
        assert_eq!(annualized_return_pct(100.0, 150.0, 0), 0.0);
        assert_eq!(annualized_return_pct(0.0, 150.0, 10), 0.0);
        let doubled = annualized_return_pct(100.0, 200.0, 730);
        assert!((doubled - (2f64.sqrt() - 1.0) * 100.0).abs() < 1e-9);
    }

    #[test]
    fn single_state_timeline_is_one_flat_year() {
        let result = aggregate(&[state(2020, 5, 5, 1_000.0)], 1_000.0, AggregateOptions::all());
        assert_eq!(result.daily_values.len(), 1);
        assert_eq!(result.annualized_return_pct, 0.0);
        assert_eq!(result.yearly_details.len(), 1);
        let year = &result.yearly_details[0];
        assert_eq!(year.return_pct, 0.0);
        assert_eq!(year.invested_amount, Some(0.0));
        assert_eq!(year.trade_count, 0);
    }

    #[test]
    fn invested_amount_is_measured_from_the_first_recorded_state() {
        // Day one already holds the opening contribution; only later spending counts.
        let timeline = [
            state(2021, 1, 4, 900.0),
            state(2021, 2, 1, 800.0),
            state(2021, 3, 1, 700.0),
        ];
        let result = aggregate(&timeline, 1_000.0, AggregateOptions::all());
        let year = &result.yearly_details[0];
        assert!((year.invested_amount.expect("invested") - 200.0).abs() < 1e-12);
        assert_eq!(year.cash_start, Some(900.0));
    }

    #[test]
    fn yearly_details_sum_interest_and_split_flows() {
        let mut a = state(2020, 12, 30, 1_000.0);
        a.cash_interest_this_step = Some(1.0);
        let mut b = state(2020, 12, 31, 900.0);
        b.cash_interest_this_step = Some(2.0);
        b.position_deltas = vec![PositionDelta {
            instrument_id: "FUND".to_string(),
            shares: 10.0,
            price: 10.0,
        }];
        b.set_position_value("FUND", 10.0, 0.0).expect("noop");
        b.positions[0].shares = 10.0;
        b.recompute_total();
        let mut c = b.carry_forward(NaiveDate::from_ymd_opt(2021, 1, 4).expect("date"));
        c.position_deltas = vec![PositionDelta {
            instrument_id: "FUND".to_string(),
            shares: -4.0,
            price: 10.0,
        }];

        let result = aggregate(&[a, b, c], 1_000.0, AggregateOptions::all());
        assert_eq!(result.yearly_details.len(), 2);
        let y2020 = &result.yearly_details[0];
        assert_eq!(y2020.year, 2020);
        assert!((y2020.interest.expect("interest") - 3.0).abs() < 1e-12);
        assert!((y2020.bought_amount - 100.0).abs() < 1e-12);
        assert_eq!(y2020.trade_count, 1);
        assert!((y2020.invested_amount.expect("invested") - 100.0).abs() < 1e-12);
        assert!(y2020.positions_end.as_ref().expect("positions").contains_key("FUND"));

        let y2021 = &result.yearly_details[1];
        assert!((y2021.sold_amount - 40.0).abs() < 1e-12);
        assert_eq!(y2021.interest, Some(0.0));
    }

    #[test]
    fn optional_sections_follow_options() {
        let result = aggregate(
            &[state(2020, 1, 1, 10.0), state(2020, 1, 2, 11.0)],
            10.0,
            AggregateOptions::default(),
        );
        let year = &result.yearly_details[0];
        assert!(year.positions_start.is_none());
        assert!(year.cash_end.is_none());
        assert!(year.interest.is_none());
        assert!(year.invested_amount.is_none());
        assert!((year.return_pct - 10.0).abs() < 1e-9);
        assert!((result.total_return_pct - 10.0).abs() < 1e-9);
    }

    #[test]
    fn empty_timeline_is_neutral() {
        let result = aggregate(&[], 500.0, AggregateOptions::all());
        assert_eq!(result.final_value, 500.0);
        assert_eq!(result.max_drawdown_pct, 0.0);
        assert!(result.daily_values.is_empty());
    }
}
