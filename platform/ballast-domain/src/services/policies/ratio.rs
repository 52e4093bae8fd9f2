use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BandDirection {
    /// Low signal maps to `max` (P/E: cheap market, more equity).
    Inverse,
    /// Low signal maps to `min` (equity risk premium: thin premium, less equity).
    Direct,
}

/// Maps a valuation signal onto one of `levels` equally spaced ratios in `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatioBand {
    pub min: f64,
    pub max: f64,
    pub low_bound: f64,
    pub high_bound: f64,
    pub levels: u32,
    pub direction: BandDirection,
}

impl RatioBand {
    pub fn validate(&self) -> Result<(), String> {
        let values = [self.min, self.max, self.low_bound, self.high_bound];
        if values.iter().any(|v| !v.is_finite()) {
            return Err("ratio band values must be finite".to_string());
        }
        if !(0.0..=1.0).contains(&self.min) || !(0.0..=1.0).contains(&self.max) {
            return Err(format!(
                "ratio band min/max must be within [0, 1] (min={}, max={})",
                self.min, self.max
            ));
        }
        if self.min >= self.max {
            return Err(format!(
                "ratio band min must be < max (min={}, max={})",
                self.min, self.max
            ));
        }
        if self.low_bound >= self.high_bound {
            return Err(format!(
                "ratio band low_bound must be < high_bound (low={}, high={})",
                self.low_bound, self.high_bound
            ));
        }
        if self.levels < 2 {
            return Err(format!("ratio band needs at least 2 levels (got {})", self.levels));
        }
        Ok(())
    }

    fn step(&self) -> f64 {
        (self.max - self.min) / f64::from(self.levels - 1)
    }

    /// Allowed ratio at `index`; the last index is `max` itself.
    pub fn level(&self, index: u32) -> f64 {
        if index + 1 >= self.levels {
            self.max
        } else {
            self.min + f64::from(index) * self.step()
        }
    }

    pub fn levels(&self) -> Vec<f64> {
        (0..self.levels).map(|i| self.level(i)).collect()
    }

    /// Piecewise-linear ratio before quantization; clamps outside the bounds.
    pub fn continuous_ratio(&self, signal: f64) -> f64 {
        let (at_low, at_high) = match self.direction {
            BandDirection::Inverse => (self.max, self.min),
            BandDirection::Direct => (self.min, self.max),
        };
        if signal <= self.low_bound {
            return at_low;
        }
        if signal >= self.high_bound {
            return at_high;
        }
        let fraction = (signal - self.low_bound) / (self.high_bound - self.low_bound);
        at_low + fraction * (at_high - at_low)
    }

    /// Index of the level nearest to the continuous ratio. Computed from the
    /// signal so that exact midpoints stay exact; ties round away from zero.
    /// With two levels this switches at the midpoint of the bounds.
    pub fn level_index(&self, signal: f64) -> u32 {
        let top = f64::from(self.levels.saturating_sub(1));
        let clamped = signal.max(self.low_bound).min(self.high_bound);
        let distance = match self.direction {
            BandDirection::Inverse => self.high_bound - clamped,
            BandDirection::Direct => clamped - self.low_bound,
        };
        let raw = distance * top / (self.high_bound - self.low_bound);
        // Snap away representation noise from inexact bounds before rounding.
        let snapped = (raw * 1e9).round() / 1e9;
        snapped.round().clamp(0.0, top) as u32
    }

    pub fn target_ratio(&self, signal: f64) -> f64 {
        self.level(self.level_index(signal))
    }
}

pub fn target_ratio(signal: f64, band: &RatioBand) -> f64 {
    band.target_ratio(signal)
}
