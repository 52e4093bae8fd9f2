use ballast_domain::entities::net_worth::NetWorthState;
use ballast_domain::services::aggregator::{aggregate, max_drawdown_pct, AggregateOptions};
use ballast_domain::services::downsample::{downsample_indices, DownsampleOptions};
use ballast_domain::services::engine::Simulation;
use ballast_domain::services::policies::contribution::ScheduledContribution;
use ballast_domain::services::policies::ratio::{BandDirection, RatioBand};
use ballast_domain::services::policies::signal::SignalKind;
use ballast_domain::services::policies::valuation::ValuationRebalance;
use ballast_domain::services::rates::FixedRate;
use ballast_domain::value_objects::observation::Observation;
use ballast_domain::value_objects::price_point::PricePoint;
use chrono::{Days, NaiveDate};
use proptest::prelude::*;

fn observations(rows: &[(f64, f64)]) -> Vec<Observation> {
    let start = NaiveDate::from_ymd_opt(2019, 12, 20).expect("date");
    rows.iter()
        .enumerate()
        .map(|(idx, (close, pe))| {
            let date = start + Days::new(idx as u64 * 3);
            Observation::single("IDX", PricePoint::new(date, *close).with_valuation(*pe))
        })
        .collect()
}

fn pe_band() -> RatioBand {
    RatioBand {
        min: 0.1,
        max: 0.6,
        low_bound: 11.0,
        high_bound: 16.0,
        levels: 6,
        direction: BandDirection::Inverse,
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn every_state_satisfies_the_value_invariant(
        rows in prop::collection::vec((0.5f64..500.0, 5.0f64..25.0), 1..150),
        rate in 0.0f64..0.1,
    ) {
        let obs = observations(&rows);
        let rates = FixedRate(rate);
        let policy = ValuationRebalance::new("IDX", SignalKind::PeRatio, pe_band(), 1.0)
            .expect("policy");
        let initial = policy
            .initial_state(1_000_000.0, &obs[0], &rates)
            .expect("initial");
        let output = Simulation::new(&rates)
            .with_policy(policy)
            .with_policy(ScheduledContribution::new("IDX", 24, 200_000.0).expect("dca"))
            .run(&obs, initial)
            .expect("run");

        prop_assert_eq!(output.timeline.len(), obs.len());
        for state in &output.timeline {
            let parts: f64 = state.positions.iter().map(|p| p.shares * p.last_price).sum::<f64>()
                + state.cash;
            prop_assert!((state.total_value - parts).abs() < 0.01);
            prop_assert!(state.cash >= -1e-6);
        }

        let result = aggregate(&output.timeline, 1_000_000.0, AggregateOptions::all())
            .with_trades(output.trades);
        prop_assert!(result.daily_values.windows(2).all(|w| w[0].date <= w[1].date));
        prop_assert!(result.trades.windows(2).all(|w| w[0].date <= w[1].date));
    }

    #[test]
    fn target_ratio_is_always_an_allowed_level(
        signal in -50.0f64..80.0,
        min in 0.0f64..0.5,
        width in 0.05f64..0.5,
        low in 0.0f64..20.0,
        span in 0.5f64..20.0,
        levels in 2u32..12,
        direct in any::<bool>(),
    ) {
        let band = RatioBand {
            min,
            max: min + width,
            low_bound: low,
            high_bound: low + span,
            levels,
            direction: if direct { BandDirection::Direct } else { BandDirection::Inverse },
        };
        prop_assume!(band.validate().is_ok());
        let ratio = band.target_ratio(signal);
        prop_assert!(band.levels().contains(&ratio));
    }

    #[test]
    fn downsample_is_idempotent(
        len in 0usize..400,
        max_points in 0usize..60,
        key_every in 1usize..50,
        keep_ends in any::<bool>(),
    ) {
        let options = DownsampleOptions { max_points, keep_ends };
        let series: Vec<usize> = (0..len).collect();
        let is_key = |v: &usize| v % key_every == 0;

        let once: Vec<usize> = downsample_indices(len, options, |i| is_key(&series[i]))
            .into_iter()
            .map(|i| series[i])
            .collect();
        let twice: Vec<usize> = downsample_indices(once.len(), options, |i| is_key(&once[i]))
            .into_iter()
            .map(|i| once[i])
            .collect();
        prop_assert_eq!(&once, &twice);
        if len <= max_points {
            prop_assert_eq!(once, series);
        }
    }

    #[test]
    fn drawdown_is_bounded_for_positive_values(values in prop::collection::vec(0.01f64..1_000_000.0, 1..300)) {
        let dd = max_drawdown_pct(values);
        prop_assert!((0.0..=100.0).contains(&dd));
    }
}
