//! Price data port trait.

use crate::domain::error::RotatorError;
use crate::domain::price_series::PriceSeries;
use chrono::NaiveDate;

pub trait PricePort {
    /// Close series for `symbol` restricted to `[start_date, end_date]`.
    fn fetch_series(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PriceSeries, RotatorError>;

    fn list_symbols(&self) -> Result<Vec<String>, RotatorError>;
}
