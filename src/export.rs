//! # Flat Export Format
//!
//! Comma-separated tables used to hand data between the ingestion and the
//! analysis stages:
//!
//! ```text
//! DateTime,CPU_Usage,Disk_Usage,Number_of_Nodes
//! 2024-01-01T00:00:00Z,41.5,62.0,3.0
//!
//! DateTime,p10,p50,p90
//! 2024-01-03T01:00:00Z,38.2,44.9,53.1
//! ```
//!
//! Timestamps are written as RFC 3339 in UTC; the reader also accepts the
//! `YYYY-MM-DD HH:MM:SS[.fff][+00:00]` form. Floats use Rust's shortest
//! round-trip representation, so export followed by import is lossless.
//!
//! A metric missing from a history export is written as empty cells and is
//! absent after import. Rows must be evenly spaced; the spacing becomes the
//! imported series' cadence (one hour for single-row tables).

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Duration, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use tracing::debug;

use crate::error::{ForesightError, ForesightResult};
use crate::types::{
    ForecastHorizon, ForecastPoint, MetricName, MetricSample, MetricSeries, MetricValue, Timestamp,
};

/// Header of the timestamp column in both tables
pub const DATETIME_COLUMN: &str = "DateTime";

/// Model name recorded on imported horizons
pub const IMPORTED_MODEL: &str = "imported";

const FORECAST_COLUMNS: [&str; 3] = ["p10", "p50", "p90"];

/// Serialize aligned series into the history table.
///
/// All series must cover the same timestamps.
pub fn write_history(series: &BTreeMap<MetricName, MetricSeries>) -> ForesightResult<String> {
    let timestamps: Vec<Timestamp> = match series.values().next() {
        Some(first) => first.samples().iter().map(|s| s.timestamp).collect(),
        None => Vec::new(),
    };

    for s in series.values() {
        let aligned = s.len() == timestamps.len()
            && s.samples().iter().zip(&timestamps).all(|(a, b)| a.timestamp == *b);
        if !aligned {
            return Err(ForesightError::invalid_series(format!(
                "'{}' series is not aligned with the other exported series",
                s.metric_name()
            )));
        }
    }

    let mut out = String::new();
    let _ = write!(out, "{}", DATETIME_COLUMN);
    for metric in MetricName::ALL {
        let _ = write!(out, ",{}", metric.column());
    }
    out.push('\n');

    for (row, timestamp) in timestamps.iter().enumerate() {
        out.push_str(&format_timestamp(*timestamp));
        for metric in MetricName::ALL {
            out.push(',');
            if let Some(s) = series.get(&metric) {
                out.push_str(&format_float(s.samples()[row].value));
            }
        }
        out.push('\n');
    }

    Ok(out)
}

/// Parse a history table back into per-metric series
pub fn read_history(text: &str) -> ForesightResult<BTreeMap<MetricName, MetricSeries>> {
    let mut lines = data_lines(text);
    let (header_line, header) = lines
        .next()
        .ok_or_else(|| ForesightError::malformed(1, "missing header row"))?;

    let expected: Vec<&str> = std::iter::once(DATETIME_COLUMN)
        .chain(MetricName::ALL.iter().map(|m| m.column()))
        .collect();
    expect_header(header_line, header, &expected)?;

    let mut rows: Vec<(usize, Timestamp)> = Vec::new();
    let mut cells: [Vec<Option<MetricValue>>; 3] = [Vec::new(), Vec::new(), Vec::new()];

    for (line, record) in lines {
        let fields = split_record(line, record, expected.len())?;
        rows.push((line, parse_timestamp(line, fields[0])?));
        for (column, field) in fields[1..].iter().enumerate() {
            let value = if field.is_empty() {
                None
            } else {
                Some(parse_float(line, MetricName::ALL[column].column(), field)?)
            };
            cells[column].push(value);
        }
    }

    let cadence = infer_cadence(&rows)?;
    let mut result = BTreeMap::new();

    for (column, values) in cells.iter().enumerate() {
        let metric = MetricName::ALL[column];
        if values.iter().all(Option::is_none) {
            continue;
        }

        let mut samples = Vec::with_capacity(values.len());
        for ((line, timestamp), value) in rows.iter().zip(values) {
            let value = value.ok_or_else(|| {
                ForesightError::malformed(*line, format!("missing value for {}", metric.column()))
            })?;
            samples.push(MetricSample::new(*timestamp, metric, value));
        }

        result.insert(metric, MetricSeries::new(metric, cadence, samples)?);
    }

    debug!(rows = rows.len(), metrics = result.len(), "imported history table");
    Ok(result)
}

/// Serialize a forecast horizon into the forecast table
pub fn write_forecast(horizon: &ForecastHorizon) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{},{}", DATETIME_COLUMN, FORECAST_COLUMNS.join(","));
    for point in &horizon.points {
        let _ = writeln!(
            out,
            "{},{},{},{}",
            format_timestamp(point.timestamp),
            format_float(point.p10),
            format_float(point.p50),
            format_float(point.p90)
        );
    }
    out
}

/// Parse a forecast table for `metric`.
///
/// Quantile ordering is re-validated; imported data is not trusted.
pub fn read_forecast(text: &str, metric: MetricName) -> ForesightResult<ForecastHorizon> {
    let mut lines = data_lines(text);
    let (header_line, header) = lines
        .next()
        .ok_or_else(|| ForesightError::malformed(1, "missing header row"))?;

    let expected: Vec<&str> = std::iter::once(DATETIME_COLUMN)
        .chain(FORECAST_COLUMNS.iter().copied())
        .collect();
    expect_header(header_line, header, &expected)?;

    let mut rows = Vec::new();
    let mut points = Vec::new();
    for (line, record) in lines {
        let fields = split_record(line, record, expected.len())?;
        let timestamp = parse_timestamp(line, fields[0])?;
        rows.push((line, timestamp));
        points.push(ForecastPoint {
            timestamp,
            p10: parse_float(line, "p10", fields[1])?,
            p50: parse_float(line, "p50", fields[2])?,
            p90: parse_float(line, "p90", fields[3])?,
        });
    }

    let horizon = ForecastHorizon {
        metric_name: metric,
        cadence: infer_cadence(&rows)?,
        model: IMPORTED_MODEL.to_string(),
        points,
    };
    horizon.validate_ordering()?;
    Ok(horizon)
}

/// Write the history table to `path`
pub fn save_history<P: AsRef<Path>>(
    path: P,
    series: &BTreeMap<MetricName, MetricSeries>,
) -> ForesightResult<()> {
    std::fs::write(path, write_history(series)?)?;
    Ok(())
}

/// Read the history table at `path`
pub fn load_history<P: AsRef<Path>>(path: P) -> ForesightResult<BTreeMap<MetricName, MetricSeries>> {
    read_history(&std::fs::read_to_string(path)?)
}

/// Write the forecast table to `path`
pub fn save_forecast<P: AsRef<Path>>(path: P, horizon: &ForecastHorizon) -> ForesightResult<()> {
    std::fs::write(path, write_forecast(horizon))?;
    Ok(())
}

/// Read the forecast table at `path`
pub fn load_forecast<P: AsRef<Path>>(path: P, metric: MetricName) -> ForesightResult<ForecastHorizon> {
    read_forecast(&std::fs::read_to_string(path)?, metric)
}

fn format_timestamp(timestamp: Timestamp) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn format_float(value: f64) -> String {
    format!("{:?}", value)
}

/// Non-blank lines with their 1-based line numbers
fn data_lines<'a>(text: &'a str) -> impl Iterator<Item = (usize, &'a str)> + 'a {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim_start_matches('\u{feff}').trim()))
        .filter(|(_, line)| !line.is_empty())
}

fn expect_header(line: usize, header: &str, expected: &[&str]) -> ForesightResult<()> {
    let found: Vec<&str> = header.split(',').map(str::trim).collect();
    if found != expected {
        return Err(ForesightError::malformed(
            line,
            format!("expected header '{}', found '{}'", expected.join(","), header),
        ));
    }
    Ok(())
}

fn split_record(line: usize, record: &str, width: usize) -> ForesightResult<Vec<&str>> {
    let fields: Vec<&str> = record.split(',').map(str::trim).collect();
    if fields.len() != width {
        return Err(ForesightError::malformed(
            line,
            format!("expected {} fields, found {}", width, fields.len()),
        ));
    }
    Ok(fields)
}

fn parse_timestamp(line: usize, field: &str) -> ForesightResult<Timestamp> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(field) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_str(field, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(field, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    Err(ForesightError::malformed(line, format!("invalid timestamp '{}'", field)))
}

fn parse_float(line: usize, column: &str, field: &str) -> ForesightResult<f64> {
    field.parse::<f64>().map_err(|_| {
        ForesightError::malformed(line, format!("invalid number '{}' in {}", field, column))
    })
}

/// Spacing of the first two rows, checked against every other pair
fn infer_cadence(rows: &[(usize, Timestamp)]) -> ForesightResult<Duration> {
    let cadence = match rows {
        [(_, first), (line, second), ..] => {
            let gap = *second - *first;
            if gap <= Duration::zero() {
                return Err(ForesightError::malformed(*line, "timestamps must be strictly increasing"));
            }
            gap
        }
        _ => return Ok(Duration::hours(1)),
    };

    for pair in rows.windows(2) {
        let (line, timestamp) = pair[1];
        if timestamp - pair[0].1 != cadence {
            return Err(ForesightError::malformed(
                line,
                format!("row is not {}s after the previous row", cadence.num_seconds()),
            ));
        }
    }

    Ok(cadence)
}
