use crate::config::{ChartMode, Config};
use crate::shared::DEFAULT_MAX_CHART_POINTS;
use ballast_domain::entities::performance::StrategyResult;
use ballast_domain::services::downsample::{
    downsample, simplify_shape, DownsampleOptions, ShapeOptions,
};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartPoint {
    pub date: NaiveDate,
    pub value: f64,
    pub change_percent: f64,
    pub is_trade: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartOptions {
    pub max_points: usize,
    pub mode: ChartMode,
}

impl ChartOptions {
    pub fn from_config(config: &Config) -> Self {
        let report = config.report.as_ref();
        Self {
            max_points: report
                .and_then(|r| r.max_chart_points)
                .unwrap_or(DEFAULT_MAX_CHART_POINTS),
            mode: report.and_then(|r| r.chart_mode).unwrap_or_default(),
        }
    }
}

/// Daily value series of a result, reduced to the point budget. Trade days and
/// both ends are always kept.
pub fn chart_series(result: &StrategyResult, options: ChartOptions) -> Vec<ChartPoint> {
    let trade_dates: BTreeSet<NaiveDate> = result.trades.iter().map(|t| t.date).collect();
    let points: Vec<ChartPoint> = result
        .daily_values
        .iter()
        .map(|dv| ChartPoint {
            date: dv.date,
            value: dv.value,
            change_percent: dv.change_percent,
            is_trade: trade_dates.contains(&dv.date),
        })
        .collect();

    match options.mode {
        ChartMode::Uniform => downsample(
            &points,
            DownsampleOptions {
                max_points: options.max_points,
                keep_ends: true,
            },
            |p| p.is_trade,
        ),
        ChartMode::Shape => simplify_shape(
            &points,
            ShapeOptions {
                max_points: options.max_points,
                keep_ends: true,
                ..ShapeOptions::default()
            },
            |p| p.date.num_days_from_ce() as f64,
            |p| p.value,
            |p| p.is_trade,
        ),
    }
}
