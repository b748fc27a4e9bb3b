use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, Trim, WriterBuilder};
use serde::{Deserialize, Serialize};
use tcs_core::errors::{ErrorInfo, TcsError};
use tcs_core::format_significant;

fn csv_error(code: &str, err: impl ToString) -> TcsError {
    TcsError::Serde(ErrorInfo::new(code, err.to_string()))
}

/// Describes which column carries time and how it converts to report units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeAxis {
    /// Column holding the monotonic time or step counter.
    #[serde(default = "TimeAxis::default_column")]
    pub column: String,
    /// Multiplier applied to the column (or to the row index when absent).
    #[serde(default = "TimeAxis::default_scale")]
    pub scale: f64,
}

impl TimeAxis {
    fn default_column() -> String {
        "step".to_string()
    }

    // 0.1 h per step, reported in days.
    fn default_scale() -> f64 {
        0.1 / 24.0
    }

    /// Unscaled axis over the given column.
    pub fn raw(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            scale: 1.0,
        }
    }
}

impl Default for TimeAxis {
    fn default() -> Self {
        Self {
            column: Self::default_column(),
            scale: Self::default_scale(),
        }
    }
}

/// Tabular simulation output: a time axis plus named numeric metric columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TimeSeries {
    /// Time value of every row, already scaled to report units.
    pub time: Vec<f64>,
    /// Metric name to samples, one per row.
    pub metrics: BTreeMap<String, Vec<f64>>,
}

impl TimeSeries {
    /// Creates a series over the given time axis with no metrics.
    pub fn new(time: Vec<f64>) -> Self {
        Self {
            time,
            metrics: BTreeMap::new(),
        }
    }

    /// Builder style metric insertion.
    pub fn with_metric(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.metrics.insert(name.into(), values);
        self
    }

    /// Inserts or replaces a metric column.
    pub fn insert_metric(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.metrics.insert(name.into(), values);
    }

    /// Samples of a metric, if the column exists.
    pub fn metric(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(Vec::as_slice)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// True when the series has no rows.
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// Loads a metrics CSV written by the simulator.
pub fn load_csv(path: &Path, axis: &TimeAxis) -> Result<TimeSeries, TcsError> {
    let bytes = fs::read(path).map_err(|err| TcsError::io("series-read", path, err))?;
    let text = String::from_utf8_lossy(&bytes);
    parse_csv(&text, axis).map_err(|err| match err {
        TcsError::Serde(info) => {
            TcsError::Serde(info.with_context("path", path.display().to_string()))
        }
        other => other,
    })
}

/// Parses metrics CSV text.
///
/// Crashed simulators leave partial files behind, so NUL bytes are stripped,
/// `#` comment lines are skipped, rows with missing cells are dropped and any
/// column that is not numeric in every kept row is ignored.
pub fn parse_csv(text: &str, axis: &TimeAxis) -> Result<TimeSeries, TcsError> {
    let cleaned: String = text
        .replace('\0', "")
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n");
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(cleaned.as_bytes());
    let headers: Vec<String> = reader
        .headers()
        .map_err(|err| csv_error("csv-header", err))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let Ok(record) = record else {
            continue;
        };
        if record.len() != headers.len() || record.iter().any(str::is_empty) {
            continue;
        }
        rows.push(record.iter().map(str::to_string).collect());
    }
    if rows.is_empty() {
        return Err(TcsError::Serde(
            ErrorInfo::new("csv-empty", "metrics file has no complete rows")
                .with_context("columns", headers.len().to_string()),
        ));
    }

    let mut series = TimeSeries::default();
    for (idx, name) in headers.iter().enumerate() {
        let parsed: Option<Vec<f64>> = rows
            .iter()
            .map(|row| row[idx].parse::<f64>().ok())
            .collect();
        if let Some(values) = parsed {
            series.metrics.insert(name.clone(), values);
        }
    }
    series.time = match series.metrics.get(&axis.column) {
        Some(values) => values.iter().map(|value| value * axis.scale).collect(),
        None => (0..rows.len()).map(|idx| idx as f64 * axis.scale).collect(),
    };
    Ok(series)
}

/// Writes the metric columns of a series as CSV.
pub fn write_csv(series: &TimeSeries, path: &Path) -> Result<(), TcsError> {
    let columns: Vec<(&String, &Vec<f64>)> = series.metrics.iter().collect();
    let rows = columns
        .iter()
        .map(|(_, values)| values.len())
        .max()
        .unwrap_or(0);
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .map_err(|err| TcsError::io("series-write-open", path, err))?;
    writer
        .write_record(columns.iter().map(|(name, _)| name.as_str()))
        .map_err(|err| csv_error("series-write-header", err))?;
    for row in 0..rows {
        let record: Vec<String> = columns
            .iter()
            .map(|(_, values)| {
                values
                    .get(row)
                    .map(|value| format_significant(*value, 6))
                    .unwrap_or_default()
            })
            .collect();
        writer
            .write_record(&record)
            .map_err(|err| csv_error("series-write-row", err))?;
    }
    writer
        .flush()
        .map_err(|err| TcsError::io("series-flush", path, err))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scaled_time_axis() {
        let text = "step,wound_closure_pct\n0,0\n240,10\n480,35\n";
        let series = parse_csv(text, &TimeAxis::default()).expect("parse");
        assert_eq!(series.len(), 3);
        assert!((series.time[1] - 1.0).abs() < 1e-12);
        assert!((series.time[2] - 2.0).abs() < 1e-12);
        assert_eq!(series.metric("wound_closure_pct"), Some(&[0.0, 10.0, 35.0][..]));
    }

    #[test]
    fn tolerates_corrupt_rows_and_text_columns() {
        let text = "# generated\nstep,phase,scar_magnitude\n0,early,0.1\n1,early,0.2\n2,la\0te,\n3,late\n";
        let series = parse_csv(text, &TimeAxis::raw("step")).expect("parse");
        assert_eq!(series.len(), 2);
        assert!(series.metric("phase").is_none());
        assert_eq!(series.metric("scar_magnitude"), Some(&[0.1, 0.2][..]));
    }

    #[test]
    fn missing_time_column_uses_row_index() {
        let text = "closure\n1\n2\n3\n";
        let series = parse_csv(text, &TimeAxis::raw("time_h")).expect("parse");
        assert_eq!(series.time, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn header_only_file_is_an_error() {
        let err = parse_csv("step,closure\n", &TimeAxis::default()).unwrap_err();
        assert_eq!(err.info().code, "csv-empty");
    }
}
