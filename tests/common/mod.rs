#![allow(dead_code)]

use chrono::NaiveDate;
use rotator::domain::asset::AssetConfig;
use rotator::domain::error::RotatorError;
use rotator::domain::price_series::{PricePoint, PriceSeries};
use rotator::ports::price_port::PricePort;
use std::collections::HashMap;

pub struct MockPricePort {
    pub data: HashMap<String, PriceSeries>,
    pub errors: HashMap<String, String>,
}

impl MockPricePort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_series(mut self, series: PriceSeries) -> Self {
        self.data.insert(series.symbol().to_string(), series);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl PricePort for MockPricePort {
    fn fetch_series(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PriceSeries, RotatorError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(RotatorError::Data {
                reason: reason.clone(),
            });
        }
        let series = self
            .data
            .get(symbol)
            .map(|s| s.slice(start_date, end_date))
            .filter(|s| !s.is_empty());
        series.ok_or_else(|| RotatorError::NoData {
            symbol: symbol.to_string(),
        })
    }

    fn list_symbols(&self) -> Result<Vec<String>, RotatorError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// One close per calendar day starting at `start`.
pub fn make_series(symbol: &str, start: NaiveDate, closes: &[f64]) -> PriceSeries {
    let points = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PricePoint {
            date: start + chrono::Duration::days(i as i64),
            close,
        })
        .collect();
    PriceSeries::new(symbol, points).unwrap()
}

/// `count` daily closes moving linearly by `step` from `first`.
pub fn linear_series(symbol: &str, start: NaiveDate, count: usize, first: f64, step: f64) -> PriceSeries {
    let closes: Vec<f64> = (0..count).map(|i| first + step * i as f64).collect();
    make_series(symbol, start, &closes)
}

pub fn flat_series(symbol: &str, start: NaiveDate, count: usize, price: f64) -> PriceSeries {
    linear_series(symbol, start, count, price, 0.0)
}

/// Four equally weighted assets with VOO as the benchmark.
pub fn sample_assets() -> Vec<AssetConfig> {
    ["BRK-B", "QQQ", "SPMO", "VOO"]
        .iter()
        .map(|s| AssetConfig::new(*s, 0.25))
        .collect()
}

pub fn write_csv(dir: &std::path::Path, series: &PriceSeries) {
    let mut content = String::from("date,open,high,low,close,volume\n");
    for p in series.points() {
        content.push_str(&format!(
            "{},{},{},{},{},1000\n",
            p.date, p.close, p.close, p.close, p.close
        ));
    }
    std::fs::write(dir.join(format!("{}.csv", series.symbol())), content).unwrap();
}
