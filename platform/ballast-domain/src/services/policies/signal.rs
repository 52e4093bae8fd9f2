use crate::repositories::rates::RateSource;
use crate::services::policies::ratio::BandDirection;
use crate::value_objects::observation::Observation;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    PeRatio,
    /// Earnings yield minus the risk-free rate, both in percent.
    EquityRiskPremium,
}

impl SignalKind {
    pub fn label(&self) -> &'static str {
        match self {
            SignalKind::PeRatio => "pe_ratio",
            SignalKind::EquityRiskPremium => "equity_risk_premium",
        }
    }

    /// P/E favours equity when low; the premium favours equity when high.
    pub fn default_direction(&self) -> BandDirection {
        match self {
            SignalKind::PeRatio => BandDirection::Inverse,
            SignalKind::EquityRiskPremium => BandDirection::Direct,
        }
    }

    /// `None` when the observation has no usable P/E for `instrument_id`.
    pub fn read(
        &self,
        instrument_id: &str,
        observation: &Observation,
        rates: &dyn RateSource,
    ) -> Option<f64> {
        let pe = observation.valuation(instrument_id)?;
        match self {
            SignalKind::PeRatio => Some(pe),
            SignalKind::EquityRiskPremium => {
                let erp = 100.0 / pe - 100.0 * rates.annual_rate(observation.date);
                erp.is_finite().then_some(erp)
            }
        }
    }
}
