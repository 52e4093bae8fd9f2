//! Point-budget reduction for chart series.
//!
//! Both variants always keep key points (and the first/last index when
//! `keep_ends` is set), even if that means returning more than `max_points`.
//! Returned indices are ascending and unique.

use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownsampleOptions {
    pub max_points: usize,
    pub keep_ends: bool,
}

impl Default for DownsampleOptions {
    fn default() -> Self {
        Self {
            max_points: 500,
            keep_ends: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeOptions {
    pub max_points: usize,
    pub keep_ends: bool,
    /// Starting perpendicular-distance tolerance on the normalized [0, 1] axes.
    pub initial_tolerance: f64,
    pub max_doublings: u32,
}

impl Default for ShapeOptions {
    fn default() -> Self {
        Self {
            max_points: 500,
            keep_ends: true,
            initial_tolerance: 1e-3,
            max_doublings: 32,
        }
    }
}

fn mandatory_indices(len: usize, keep_ends: bool, is_key: impl Fn(usize) -> bool) -> BTreeSet<usize> {
    let mut mandatory: BTreeSet<usize> = (0..len).filter(|&i| is_key(i)).collect();
    if keep_ends && len > 0 {
        mandatory.insert(0);
        mandatory.insert(len - 1);
    }
    mandatory
}

/// Uniform decimation: mandatory points plus evenly spread picks among the rest.
pub fn downsample_indices(
    len: usize,
    options: DownsampleOptions,
    is_key: impl Fn(usize) -> bool,
) -> Vec<usize> {
    if len <= options.max_points {
        return (0..len).collect();
    }
    let mut selected = mandatory_indices(len, options.keep_ends, is_key);
    if selected.len() >= options.max_points {
        return selected.into_iter().collect();
    }

    let candidates: Vec<usize> = (0..len).filter(|i| !selected.contains(i)).collect();
    let n = candidates.len();
    let k = (options.max_points - selected.len()).min(n);
    // Midpoint of each of k equal buckets; distinct because n >= k.
    for i in 0..k {
        selected.insert(candidates[((2 * i + 1) * n) / (2 * k)]);
    }
    selected.into_iter().collect()
}

pub fn downsample<T: Clone>(
    series: &[T],
    options: DownsampleOptions,
    is_key: impl Fn(&T) -> bool,
) -> Vec<T> {
    downsample_indices(series.len(), options, |i| is_key(&series[i]))
        .into_iter()
        .map(|i| series[i].clone())
        .collect()
}

fn normalize(values: &[f64]) -> Vec<f64> {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    let (min, max) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let range = max - min;
    values
        .iter()
        .map(|v| {
            if v.is_finite() && range > 0.0 {
                (v - min) / range
            } else {
                0.0
            }
        })
        .collect()
}

fn perpendicular_distance(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let length = dx.hypot(dy);
    if length == 0.0 {
        return (p.0 - a.0).hypot(p.1 - a.1);
    }
    ((p.0 - a.0) * dy - (p.1 - a.1) * dx).abs() / length
}

/// Ramer-Douglas-Peucker over `points`, with an explicit stack instead of recursion.
fn rdp_keep(points: &[(f64, f64)], tolerance: f64) -> Vec<bool> {
    let n = points.len();
    let mut keep = vec![false; n];
    if n == 0 {
        return keep;
    }
    keep[0] = true;
    keep[n - 1] = true;

    let mut stack = vec![(0usize, n - 1)];
    while let Some((start, end)) = stack.pop() {
        if end <= start + 1 {
            continue;
        }
        let mut farthest = start;
        let mut max_distance = 0.0;
        for i in (start + 1)..end {
            let distance = perpendicular_distance(points[i], points[start], points[end]);
            if distance > max_distance {
                max_distance = distance;
                farthest = i;
            }
        }
        if max_distance > tolerance {
            keep[farthest] = true;
            stack.push((start, farthest));
            stack.push((farthest, end));
        }
    }
    keep
}

/// Shape-preserving reduction. Time and value axes are normalized independently;
/// the tolerance doubles until the simplified curve fits the budget, and any
/// excess left after `max_doublings` is thinned uniformly.
pub fn simplify_shape_indices(
    times: &[f64],
    values: &[f64],
    options: ShapeOptions,
    is_key: impl Fn(usize) -> bool,
) -> Vec<usize> {
    let len = times.len().min(values.len());
    if len <= options.max_points {
        return (0..len).collect();
    }
    let mandatory = mandatory_indices(len, options.keep_ends, is_key);
    let points: Vec<(f64, f64)> = normalize(&times[..len])
        .into_iter()
        .zip(normalize(&values[..len]))
        .collect();

    let mut tolerance = if options.initial_tolerance > 0.0 {
        options.initial_tolerance
    } else {
        ShapeOptions::default().initial_tolerance
    };
    let mut kept: Vec<usize> = Vec::new();
    for _ in 0..=options.max_doublings {
        let keep = rdp_keep(&points, tolerance);
        let mut selected = mandatory.clone();
        selected.extend((0..len).filter(|&i| keep[i]));
        kept = selected.into_iter().collect();
        if kept.len() <= options.max_points {
            return kept;
        }
        tolerance *= 2.0;
    }

    let thin = DownsampleOptions {
        max_points: options.max_points,
        keep_ends: options.keep_ends,
    };
    downsample_indices(kept.len(), thin, |i| mandatory.contains(&kept[i]))
        .into_iter()
        .map(|i| kept[i])
        .collect()
}

pub fn simplify_shape<T: Clone>(
    series: &[T],
    options: ShapeOptions,
    time: impl Fn(&T) -> f64,
    value: impl Fn(&T) -> f64,
    is_key: impl Fn(&T) -> bool,
) -> Vec<T> {
    let times: Vec<f64> = series.iter().map(&time).collect();
    let values: Vec<f64> = series.iter().map(&value).collect();
    simplify_shape_indices(&times, &values, options, |i| is_key(&series[i]))
        .into_iter()
        .map(|i| series[i].clone())
        .collect()
}
