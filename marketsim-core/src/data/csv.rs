//! CSV bar ingest.

use super::DataError;
use crate::domain::Bar;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::path::Path;

/// One CSV row. `timestamp` accepts either an RFC 3339 datetime or a
/// plain `YYYY-MM-DD` date (taken as midnight UTC).
#[derive(Debug, Deserialize)]
struct BarRecord {
    timestamp: String,
    symbol: String,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<f64>,
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Load bars from a CSV file with a
/// `timestamp,symbol,open,high,low,close,volume` header. Rows with an
/// unparseable timestamp fail the load; empty price cells become gaps.
pub fn load_bars_csv(path: &Path) -> Result<Vec<Bar>, DataError> {
    let display = path.display().to_string();
    let mut reader = ::csv::Reader::from_path(path).map_err(|source| DataError::Csv {
        path: display.clone(),
        source,
    })?;

    let mut bars = Vec::new();
    for record in reader.deserialize::<BarRecord>() {
        let record = record.map_err(|source| DataError::Csv {
            path: display.clone(),
            source,
        })?;
        let Some(timestamp) = parse_timestamp(&record.timestamp) else {
            return Err(DataError::Io {
                path: display,
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("bad timestamp: {}", record.timestamp),
                ),
            });
        };
        bars.push(Bar {
            symbol: record.symbol,
            timestamp,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume,
        });
    }
    Ok(bars)
}
