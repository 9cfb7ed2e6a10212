//! CSV price and holdings adapters.
//!
//! Price files live at `<dir>/<SYMBOL>.csv` and need a `date` and a `close`
//! column (header match is case-insensitive, other columns are ignored, so
//! full OHLCV exports load unchanged).

use crate::domain::error::RotatorError;
use crate::domain::price_series::{PricePoint, PriceSeries};
use crate::domain::rebalance::Holding;
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct CsvPriceAdapter {
    base_path: PathBuf,
}

impl CsvPriceAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }
}

fn column(headers: &csv::StringRecord, name: &str, path: &Path) -> Result<usize, RotatorError> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
        .ok_or_else(|| RotatorError::Data {
            reason: format!("{} has no '{}' column", path.display(), name),
        })
}

impl PricePort for CsvPriceAdapter {
    fn fetch_series(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PriceSeries, RotatorError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RotatorError::NoData {
                    symbol: symbol.to_string(),
                }
            } else {
                RotatorError::Io(format!("failed to read {}: {}", path.display(), e))
            }
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| RotatorError::Data {
                reason: format!("CSV header error in {}: {}", path.display(), e),
            })?
            .clone();
        let date_col = column(&headers, "date", &path)?;
        let close_col = column(&headers, "close", &path)?;

        let mut points = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| RotatorError::Data {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;

            let date_str = record.get(date_col).unwrap_or_default();
            let date = NaiveDate::parse_from_str(date_str, DATE_FORMAT).map_err(|e| {
                RotatorError::Data {
                    reason: format!("invalid date '{}' for {}: {}", date_str, symbol, e),
                }
            })?;

            if date < start_date || date > end_date {
                continue;
            }

            let close_str = record.get(close_col).unwrap_or_default();
            let close: f64 = close_str.parse().map_err(|e| RotatorError::Data {
                reason: format!("invalid close '{}' for {} on {}: {}", close_str, symbol, date, e),
            })?;

            points.push(PricePoint { date, close });
        }

        if points.is_empty() {
            return Err(RotatorError::NoData {
                symbol: symbol.to_string(),
            });
        }

        tracing::debug!(symbol, bars = points.len(), "loaded price series");
        PriceSeries::from_unsorted(symbol, points)
    }

    fn list_symbols(&self) -> Result<Vec<String>, RotatorError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| {
            RotatorError::Io(format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ))
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("csv") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    symbols.push(stem.to_string());
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}

#[derive(Debug, Deserialize)]
struct HoldingRow {
    symbol: String,
    units: f64,
    #[serde(default)]
    cost_basis: Option<f64>,
}

/// Reads a `symbol,units[,cost_basis]` holdings file.
pub fn load_holdings(path: &Path) -> Result<Vec<Holding>, RotatorError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|e| RotatorError::Io(format!("failed to open {}: {}", path.display(), e)))?;

    let mut holdings = Vec::new();
    for row in rdr.deserialize::<HoldingRow>() {
        let row = row.map_err(|e| RotatorError::Data {
            reason: format!("holdings parse error in {}: {}", path.display(), e),
        })?;
        if !row.units.is_finite() || row.units < 0.0 {
            return Err(RotatorError::Data {
                reason: format!("{} has negative units {}", row.symbol, row.units),
            });
        }
        holdings.push(Holding {
            symbol: row.symbol,
            units: row.units,
            cost_basis: row.cost_basis,
        });
    }
    Ok(holdings)
}
