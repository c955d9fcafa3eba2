//! CSV file bar source.
//!
//! One file per instrument, `<base>/<INSTRUMENT>.csv`, with header
//! `timestamp,open,high,low,close,volume`. Timestamps may be dates
//! (`2024-01-15`) or date-times (`2024-01-15 09:30:00` / `2024-01-15T09:30:00`).

use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::debug;

use crate::domain::error::EngineError;
use crate::domain::ohlcv::Bar;
use crate::ports::data_port::{BarSource, PeriodUnit};

pub struct CsvBarSource {
    base_path: PathBuf,
}

impl CsvBarSource {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, instrument: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", instrument))
    }
}

fn data_error(reason: impl Into<String>) -> EngineError {
    EngineError::Data {
        reason: reason.into(),
    }
}

fn parse_timestamp(value: &str) -> Result<NaiveDateTime, EngineError> {
    let value = value.trim();
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(ts);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| data_error(format!("invalid timestamp: {}", value)))
}

fn field<T: FromStr>(record: &csv::StringRecord, index: usize, name: &str) -> Result<T, EngineError>
where
    T::Err: std::fmt::Display,
{
    record
        .get(index)
        .ok_or_else(|| data_error(format!("missing {} column", name)))?
        .trim()
        .parse()
        .map_err(|e| data_error(format!("invalid {} value: {}", name, e)))
}

/// Volumes sometimes arrive as floats (`1200.0`); truncate those.
fn volume_field(record: &csv::StringRecord) -> Result<i64, EngineError> {
    field::<i64>(record, 5, "volume").or_else(|_| field::<f64>(record, 5, "volume").map(|v| v as i64))
}

impl BarSource for CsvBarSource {
    fn get_bars(
        &self,
        instrument: &str,
        lookback: usize,
        unit: PeriodUnit,
    ) -> Result<Vec<Bar>, EngineError> {
        let path = self.csv_path(instrument);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(instrument, path = %path.display(), "no bar file");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(data_error(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| data_error(format!("CSV parse error: {}", e)))?;

            let timestamp = parse_timestamp(
                record
                    .get(0)
                    .ok_or_else(|| data_error("missing timestamp column"))?,
            )?;

            bars.push(Bar {
                timestamp,
                open: field(&record, 1, "open")?,
                high: field(&record, 2, "high")?,
                low: field(&record, 3, "low")?,
                close: field(&record, 4, "close")?,
                volume: volume_field(&record)?,
            });
        }

        bars.sort_by_key(|b| b.timestamp);
        let start = bars.len().saturating_sub(lookback);
        debug!(
            instrument,
            %unit,
            total = bars.len(),
            returned = bars.len() - start,
            "loaded bars"
        );
        Ok(bars.split_off(start))
    }
}
