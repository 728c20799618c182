use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;

use crate::snapshot::{Column, ColumnData, LoadError};

pub fn read_columns(
    path: &Path,
    bytes: &[u8],
    null_markers: &[String],
) -> Result<Vec<Column>, LoadError> {
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(bytes);
    let headers = reader.headers().map_err(csv_err)?.clone();
    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];

    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        for (idx, raw) in record.iter().enumerate() {
            let value = if null_markers.iter().any(|m| m == raw.trim()) {
                None
            } else {
                Some(raw.to_string())
            };
            cells[idx].push(value);
        }
    }

    Ok(headers
        .iter()
        .zip(cells)
        .map(|(name, values)| Column::new(name.trim(), infer_column(values)))
        .collect())
}

/// Picks the narrowest kind every non-null cell parses as: boolean, numeric, datetime, text.
pub fn infer_column(values: Vec<Option<String>>) -> ColumnData {
    let present = || values.iter().flatten().map(|v| v.trim());
    if present().next().is_none() {
        return ColumnData::Categorical(values);
    }

    if present().all(|v| parse_bool(v).is_some()) {
        return ColumnData::Boolean(
            values
                .iter()
                .map(|v| v.as_deref().and_then(|s| parse_bool(s.trim())))
                .collect(),
        );
    }
    if present().all(|v| v.parse::<f64>().is_ok()) {
        return ColumnData::Numeric(
            values
                .iter()
                .map(|v| {
                    v.as_deref()
                        .and_then(|s| s.trim().parse::<f64>().ok())
                        .filter(|f| !f.is_nan())
                })
                .collect(),
        );
    }
    if present().all(|v| parse_datetime_millis(v).is_some()) {
        return ColumnData::Datetime(
            values
                .iter()
                .map(|v| v.as_deref().and_then(|s| parse_datetime_millis(s.trim())))
                .collect(),
        );
    }
    ColumnData::Categorical(values)
}

fn parse_bool(raw: &str) -> Option<bool> {
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

pub fn parse_datetime_millis(raw: &str) -> Option<i64> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp_millis());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc().timestamp_millis());
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.timestamp_millis())
}
