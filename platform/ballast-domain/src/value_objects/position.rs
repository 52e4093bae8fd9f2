use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetPosition {
    pub instrument_id: String,
    pub shares: f64,
    pub last_price: f64,
}

impl AssetPosition {
    pub fn new(instrument_id: impl Into<String>, shares: f64, last_price: f64) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            shares,
            last_price,
        }
    }

    pub fn value(&self) -> f64 {
        self.shares * self.last_price
    }
}

/// Share change of one instrument over a single simulated step (after - before).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionDelta {
    pub instrument_id: String,
    pub shares: f64,
    /// Price the delta was executed at (the instrument's post-step `last_price`).
    pub price: f64,
}

impl PositionDelta {
    pub fn value(&self) -> f64 {
        self.shares * self.price
    }
}
