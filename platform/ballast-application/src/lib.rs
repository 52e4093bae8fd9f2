pub mod backtesting;
pub mod charting;
pub mod config;
pub mod shared;
pub mod strategies;
pub mod validation;
