pub mod aggregator;
pub mod audit;
pub mod calendar;
pub mod downsample;
pub mod engine;
pub mod policies;
pub mod rates;
pub mod series;
