use crate::services::series::SeriesReport;
use crate::value_objects::price_point::PricePoint;

#[derive(Debug, Clone)]
pub struct PriceQuery {
    pub instrument_id: String,
    /// Adapter-specific location of the series (file path, table, URL).
    pub location: String,
}

pub trait PriceRepository {
    /// Returns the series sorted ascending by date without duplicate dates.
    fn load_prices(&self, query: &PriceQuery) -> Result<(Vec<PricePoint>, SeriesReport), String>;
}
