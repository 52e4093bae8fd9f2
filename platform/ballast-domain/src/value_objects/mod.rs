pub mod observation;
pub mod position;
pub mod price_point;
pub mod rate_point;
pub mod trade;
