pub mod net_worth;
pub mod performance;
