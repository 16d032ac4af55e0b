use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

use common::{Error, Result};

/// Daily closing prices for one symbol, keyed by trading date.
#[derive(Debug, Clone, Default)]
pub struct PriceSeries {
    closes: BTreeMap<NaiveDate, f64>,
}

/// CSV row: `date,close` with ISO dates. Extra columns are ignored.
#[derive(Debug, Deserialize)]
struct PriceRow {
    date: NaiveDate,
    close: f64,
}

impl PriceSeries {
    pub fn from_rows(rows: impl IntoIterator<Item = (NaiveDate, f64)>) -> Self {
        Self {
            closes: rows.into_iter().collect(),
        }
    }

    /// Load from a CSV file with a `date,close` header.
    pub fn load_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = csv::Reader::from_path(path).map_err(|e| {
            Error::Config(format!("Failed to open price file {}: {e}", path.display()))
        })?;
        let series = Self::read(reader)?;
        info!(path = %path.display(), days = series.len(), "Loaded price series");
        Ok(series)
    }

    pub fn read<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Self> {
        let mut closes = BTreeMap::new();
        for result in reader.deserialize() {
            let row: PriceRow = result?;
            closes.insert(row.date, row.close);
        }
        Ok(Self { closes })
    }

    /// Close on exactly `date`, if it was a trading day.
    pub fn close_on(&self, date: NaiveDate) -> Option<f64> {
        self.closes.get(&date).copied()
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }
}
