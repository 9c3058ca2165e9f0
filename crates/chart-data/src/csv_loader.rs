//! CSV bar loading.

use std::io::Read;
use std::path::{Path, PathBuf};

use chart_core::{Bar, ChartError, DataError, SeriesEvent};
use chart_engine::BaseSeries;
use chrono::{NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use serde::Deserialize;
use tracing::info;

/// CSV record format.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(alias = "Date", alias = "date", alias = "timestamp", alias = "Timestamp")]
    date: String,
    #[serde(alias = "Open", alias = "open")]
    open: f64,
    #[serde(alias = "High", alias = "high")]
    high: f64,
    #[serde(alias = "Low", alias = "low")]
    low: f64,
    #[serde(alias = "Close", alias = "close", alias = "Adj Close")]
    close: f64,
    #[serde(alias = "Volume", alias = "volume", default)]
    volume: f64,
    #[serde(alias = "Amount", alias = "amount", default)]
    amount: f64,
}

/// CSV loader: the upstream collaborator that populates a base series
/// and raises the corresponding notifications.
pub struct CsvLoader {
    path: PathBuf,
}

impl CsvLoader {
    /// Create a loader for an existing file.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(DataError::NoData);
        }
        Ok(Self { path })
    }

    /// Read all bars from the file, sorted by timestamp.
    pub fn read_bars(&self) -> Result<Vec<Bar>, DataError> {
        let file = std::fs::File::open(&self.path)?;
        Self::bars_from_reader(file)
    }

    /// Load the full file into `series` (initial population). Emits one
    /// `Loaded` notification.
    pub fn load_into(&self, series: &BaseSeries) -> Result<SeriesEvent, ChartError> {
        let bars = self.read_bars()?;
        info!(path = %self.path.display(), rows = bars.len(), "loading bars");
        series.load(&bars).map_err(ChartError::from)
    }

    /// Merge the file into `series` (append or revise a range). Emits
    /// `Refreshed` or `Updated`.
    pub fn refresh_into(&self, series: &BaseSeries) -> Result<SeriesEvent, ChartError> {
        let bars = self.read_bars()?;
        if bars.is_empty() {
            return Err(ChartError::Data(DataError::NoData));
        }
        series.refresh(&bars).map_err(ChartError::from)
    }

    /// Parse bars from any reader, sorted by timestamp.
    fn bars_from_reader<R: Read>(reader: R) -> Result<Vec<Bar>, DataError> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let mut bars = Vec::new();
        for result in csv_reader.deserialize() {
            let record: CsvRecord = result.map_err(|e| DataError::Parse(e.to_string()))?;
            let timestamp = Self::parse_timestamp(&record.date)?;
            bars.push(
                Bar::new(
                    timestamp,
                    record.open,
                    record.high,
                    record.low,
                    record.close,
                    record.volume,
                )
                .with_amount(record.amount),
            );
        }

        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }

    /// Parse various timestamp formats into epoch milliseconds.
    fn parse_timestamp(date_str: &str) -> Result<i64, DataError> {
        let formats = [
            "%Y-%m-%d",
            "%Y-%m-%d %H:%M:%S",
            "%Y/%m/%d",
            "%m/%d/%Y",
            "%d-%m-%Y",
        ];

        for format in formats {
            if let Ok(dt) = NaiveDateTime::parse_from_str(date_str, format) {
                return Ok(dt.and_utc().timestamp_millis());
            }
            if let Ok(d) = NaiveDate::parse_from_str(date_str, format) {
                if let Some(dt) = d.and_hms_opt(0, 0, 0) {
                    return Ok(dt.and_utc().timestamp_millis());
                }
            }
        }

        // Unix timestamp; assume milliseconds when over 10 digits
        if let Ok(ts) = date_str.parse::<i64>() {
            if ts > 10_000_000_000 {
                return Ok(ts);
            } else {
                return Ok(ts * 1000);
            }
        }

        Err(DataError::Parse(format!(
            "Could not parse date: {}",
            date_str
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chart_core::Timeframe;

    const SAMPLE: &str = "\
Date,Open,High,Low,Close,Volume
2024-01-16,101.0,103.0,100.0,102.0,1200
2024-01-15,100.0,102.0,99.0,101.0,1000
";

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(CsvLoader::parse_timestamp("2024-01-15").is_ok());
        assert!(CsvLoader::parse_timestamp("2024-01-15 10:30:00").is_ok());
        assert!(CsvLoader::parse_timestamp("2024/01/15").is_ok());
        assert!(CsvLoader::parse_timestamp("1705312800000").is_ok()); // Unix ms
        assert!(CsvLoader::parse_timestamp("1705312800").is_ok()); // Unix sec
        assert!(CsvLoader::parse_timestamp("not-a-date").is_err());
    }

    #[test]
    fn test_bars_sorted_by_timestamp() {
        let bars = CsvLoader::bars_from_reader(SAMPLE.as_bytes()).unwrap();

        assert_eq!(bars.len(), 2);
        assert!(bars[0].timestamp < bars[1].timestamp);
        assert_eq!(bars[0].close, 101.0);
        assert_eq!(bars[1].volume, 1200.0);
    }

    #[test]
    fn test_malformed_row_is_parse_error() {
        let csv = "Date,Open,High,Low,Close\n2024-01-15,abc,1,1,1\n";
        assert!(matches!(
            CsvLoader::bars_from_reader(csv.as_bytes()),
            Err(DataError::Parse(_))
        ));
    }

    #[test]
    fn test_load_into_populates_series() {
        let series = BaseSeries::new("AAPL", Timeframe::Daily);
        let bars = CsvLoader::bars_from_reader(SAMPLE.as_bytes()).unwrap();
        series.load(&bars).unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series.first_time(), series.read().index().time_at(0));
    }
}
