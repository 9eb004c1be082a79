//! Series Reader
//!
//! Loads data point series for evaluation from CSV or JSON input.
//! CSV input maps one timestamp column and one value column; JSON input is
//! an array of `{"timestamp": .., "value": ..}` objects.

use super::error::{InputError, InputResult};
use super::types::{parse_instant, DataPoint, Value};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// Supported input encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// Comma separated values
    Csv,
    /// JSON array of data points
    Json,
}

impl InputFormat {
    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> InputResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" | "txt" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(InputError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl std::fmt::Display for InputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Csv => write!(f, "csv"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Reader for data point series with configurable column mapping
#[derive(Debug, Clone)]
pub struct SeriesReader {
    /// Column index for timestamps (0-indexed)
    timestamp_column: usize,
    /// Column index for values (0-indexed)
    value_column: usize,
    /// Whether the CSV has a header row
    has_header: bool,
    /// CSV field delimiter
    delimiter: u8,
}

impl Default for SeriesReader {
    fn default() -> Self {
        Self::new()
    }
}

impl SeriesReader {
    /// Create a reader expecting `timestamp,value` with a header row
    pub fn new() -> Self {
        Self {
            timestamp_column: 0,
            value_column: 1,
            has_header: true,
            delimiter: b',',
        }
    }

    /// Set the timestamp column index
    pub fn with_timestamp_column(mut self, column: usize) -> Self {
        self.timestamp_column = column;
        self
    }

    /// Set the value column index
    pub fn with_value_column(mut self, column: usize) -> Self {
        self.value_column = column;
        self
    }

    /// Set whether the CSV has a header row
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Set the CSV field delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Read a series from a file in the given format
    ///
    /// The returned points are sorted by timestamp.
    pub fn read_path(&self, path: &Path, format: InputFormat) -> InputResult<Vec<DataPoint>> {
        let file = std::fs::File::open(path)?;
        let points = match format {
            InputFormat::Csv => self.read_csv(file)?,
            InputFormat::Json => self.read_json(file)?,
        };
        tracing::debug!("Read {} data points from {:?}", points.len(), path);
        Ok(points)
    }

    /// Read a CSV series
    pub fn read_csv<R: Read>(&self, source: R) -> InputResult<Vec<DataPoint>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(self.has_header)
            .delimiter(self.delimiter)
            .flexible(true)
            .from_reader(source);

        let mut points = Vec::new();

        for (line_num, result) in reader.records().enumerate() {
            let line = if self.has_header {
                line_num + 2
            } else {
                line_num + 1
            };
            let record = result?;

            let ts_str = record.get(self.timestamp_column).ok_or(InputError::MissingColumn {
                line,
                column: self.timestamp_column,
            })?;
            let timestamp = parse_instant(ts_str).ok_or_else(|| InputError::InvalidTimestamp {
                line,
                value: ts_str.trim().to_string(),
            })?;

            let value_str = record.get(self.value_column).ok_or(InputError::MissingColumn {
                line,
                column: self.value_column,
            })?;
            if value_str.trim().is_empty() {
                continue;
            }

            points.push(DataPoint::new(timestamp, Value::parse(value_str)));
        }

        sort_points(&mut points);
        Ok(points)
    }

    /// Read a JSON series
    pub fn read_json<R: Read>(&self, source: R) -> InputResult<Vec<DataPoint>> {
        let mut points: Vec<DataPoint> = serde_json::from_reader(source)?;
        sort_points(&mut points);
        Ok(points)
    }
}

/// Stable sort by timestamp, keeping the input order of equal timestamps
fn sort_points(points: &mut [DataPoint]) {
    points.sort_by_key(|p| p.timestamp);
}
