pub mod csv;
pub mod migrations;
pub mod parquet;
pub mod store;

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use bytes::Bytes;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Categorical,
    Boolean,
    Datetime,
}

impl Display for ColumnKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Numeric => "numeric",
            Self::Categorical => "categorical",
            Self::Boolean => "boolean",
            Self::Datetime => "datetime",
        };
        write!(f, "{label}")
    }
}

/// Column values, one vector per semantic kind. Datetimes are epoch milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
    Boolean(Vec<Option<bool>>),
    Datetime(Vec<Option<i64>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnProfile {
    pub kind: ColumnKind,
    pub non_null: usize,
}

impl ColumnProfile {
    pub fn has_values(&self) -> bool {
        self.non_null > 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn kind(&self) -> ColumnKind {
        match &self.data {
            ColumnData::Numeric(_) => ColumnKind::Numeric,
            ColumnData::Categorical(_) => ColumnKind::Categorical,
            ColumnData::Boolean(_) => ColumnKind::Boolean,
            ColumnData::Datetime(_) => ColumnKind::Datetime,
        }
    }

    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Categorical(v) => v.len(),
            ColumnData::Boolean(v) => v.len(),
            ColumnData::Datetime(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn non_null_count(&self) -> usize {
        match &self.data {
            ColumnData::Numeric(v) => v.iter().flatten().count(),
            ColumnData::Categorical(v) => v.iter().flatten().count(),
            ColumnData::Boolean(v) => v.iter().flatten().count(),
            ColumnData::Datetime(v) => v.iter().flatten().count(),
        }
    }

    pub fn has_values(&self) -> bool {
        self.non_null_count() > 0
    }

    pub fn profile(&self) -> ColumnProfile {
        ColumnProfile {
            kind: self.kind(),
            non_null: self.non_null_count(),
        }
    }

    /// Non-null values as f64. Categorical columns have no numeric view.
    pub fn numeric_values(&self) -> Vec<f64> {
        match &self.data {
            ColumnData::Numeric(v) => v.iter().flatten().copied().collect(),
            ColumnData::Datetime(v) => v.iter().flatten().map(|ms| *ms as f64).collect(),
            ColumnData::Boolean(v) => v
                .iter()
                .flatten()
                .map(|b| if *b { 1.0 } else { 0.0 })
                .collect(),
            ColumnData::Categorical(_) => Vec::new(),
        }
    }

    /// Non-null values rendered as category labels, for any kind.
    pub fn category_labels(&self) -> Vec<String> {
        match &self.data {
            ColumnData::Categorical(v) => v.iter().flatten().cloned().collect(),
            ColumnData::Boolean(v) => v.iter().flatten().map(|b| b.to_string()).collect(),
            ColumnData::Numeric(v) => v.iter().flatten().map(|n| n.to_string()).collect(),
            ColumnData::Datetime(v) => v
                .iter()
                .flatten()
                .map(|ms| {
                    DateTime::from_timestamp_millis(*ms)
                        .map(|dt| dt.to_rfc3339())
                        .unwrap_or_else(|| ms.to_string())
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub label: String,
    pub source: String,
    pub rows: usize,
    pub columns: Vec<Column>,
    pub fingerprint: Option<String>,
    /// Stored row-index columns. They are kept out of `columns`.
    pub index_columns: Vec<String>,
}

impl Snapshot {
    pub fn new(label: impl Into<String>, columns: Vec<Column>) -> Self {
        let rows = columns.first().map(Column::len).unwrap_or(0);
        Self {
            label: label.into(),
            source: String::new(),
            rows,
            columns,
            fingerprint: None,
            index_columns: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Restricts the snapshot to `names`, in the order given. Unknown names are
    /// ignored and the result carries no index columns.
    pub fn select(&self, names: &[&str]) -> Snapshot {
        let columns = names
            .iter()
            .filter_map(|name| self.column(name).cloned())
            .collect();
        Snapshot {
            label: self.label.clone(),
            source: self.source.clone(),
            rows: self.rows,
            columns,
            fingerprint: self.fingerprint.clone(),
            index_columns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotFormat {
    #[default]
    Auto,
    #[serde(alias = "pq")]
    Parquet,
    Csv,
}

impl FromStr for SnapshotFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "parquet" | "pq" => Ok(Self::Parquet),
            "csv" => Ok(Self::Csv),
            other => Err(anyhow::anyhow!("unknown snapshot format: {other}")),
        }
    }
}

impl SnapshotFormat {
    pub fn resolve(self, path: &Path) -> Option<SnapshotFormat> {
        if self != Self::Auto {
            return Some(self);
        }
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "parquet" | "pq" => Some(Self::Parquet),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub format: SnapshotFormat,
    pub null_markers: Vec<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            format: SnapshotFormat::Auto,
            null_markers: default_null_markers(),
        }
    }
}

pub fn default_null_markers() -> Vec<String> {
    ["", "NA", "NaN", "nan", "null", "None"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed reading snapshot {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("snapshot {} is not valid parquet: {source}", .path.display())]
    Parquet {
        path: PathBuf,
        source: ::parquet::errors::ParquetError,
    },
    #[error("failed decoding columns of {}: {source}", .path.display())]
    Arrow {
        path: PathBuf,
        source: arrow::error::ArrowError,
    },
    #[error("snapshot {} is not valid CSV: {source}", .path.display())]
    Csv {
        path: PathBuf,
        source: ::csv::Error,
    },
    #[error("unsupported snapshot format for {}; expected .parquet or .csv", .path.display())]
    UnsupportedFormat { path: PathBuf },
    #[error("snapshot {} has duplicate column `{column}`", .path.display())]
    DuplicateColumn { path: PathBuf, column: String },
}

pub fn load_snapshot(
    label: &str,
    path: &Path,
    options: &LoadOptions,
) -> Result<Snapshot, LoadError> {
    let format = options
        .format
        .resolve(path)
        .ok_or_else(|| LoadError::UnsupportedFormat {
            path: path.to_path_buf(),
        })?;
    let bytes = fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let fingerprint = format!("{:x}", Sha256::digest(&bytes));

    let (columns, index_columns) = match format {
        SnapshotFormat::Parquet => {
            let decoded = parquet::read_columns(path, Bytes::from(bytes))?;
            (decoded.columns, decoded.index_columns)
        }
        SnapshotFormat::Csv => (
            csv::read_columns(path, &bytes, &options.null_markers)?,
            Vec::new(),
        ),
        SnapshotFormat::Auto => {
            return Err(LoadError::UnsupportedFormat {
                path: path.to_path_buf(),
            })
        }
    };
    ensure_unique_names(path, &columns)?;

    let mut snapshot = Snapshot::new(label, columns);
    snapshot.source = path.display().to_string();
    snapshot.fingerprint = Some(fingerprint);
    snapshot.index_columns = index_columns;
    debug!(
        "loaded {label} snapshot from {}: {} rows x {} columns",
        path.display(),
        snapshot.rows,
        snapshot.columns.len()
    );
    Ok(snapshot)
}

pub fn load_pair(
    baseline: &Path,
    current: &Path,
    options: &LoadOptions,
) -> Result<(Snapshot, Snapshot), LoadError> {
    let baseline = load_snapshot("baseline", baseline, options)?;
    let current = load_snapshot("current", current, options)?;
    Ok((baseline, current))
}

fn ensure_unique_names(path: &Path, columns: &[Column]) -> Result<(), LoadError> {
    let mut seen = BTreeSet::new();
    for column in columns {
        if !seen.insert(column.name.as_str()) {
            return Err(LoadError::DuplicateColumn {
                path: path.to_path_buf(),
                column: column.name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{Column, ColumnData, ColumnKind, Snapshot, SnapshotFormat};

    #[test]
    fn resolves_format_from_extension() {
        let auto = SnapshotFormat::Auto;
        assert_eq!(
            auto.resolve(Path::new("data/baseline.parquet")),
            Some(SnapshotFormat::Parquet)
        );
        assert_eq!(auto.resolve(Path::new("current.CSV")), Some(SnapshotFormat::Csv));
        assert_eq!(auto.resolve(Path::new("current.xlsx")), None);
        assert_eq!(
            SnapshotFormat::Csv.resolve(Path::new("whatever.bin")),
            Some(SnapshotFormat::Csv)
        );
    }

    #[test]
    fn select_keeps_requested_order() {
        let snapshot = Snapshot::new(
            "baseline",
            vec![
                Column::new("a", ColumnData::Numeric(vec![Some(1.0)])),
                Column::new("b", ColumnData::Boolean(vec![None])),
                Column::new("c", ColumnData::Categorical(vec![Some("x".into())])),
            ],
        );
        let restricted = snapshot.select(&["c", "a", "missing"]);
        assert_eq!(restricted.column_names(), vec!["c", "a"]);
        assert_eq!(restricted.rows, 1);
    }

    #[test]
    fn profile_counts_non_null_values() {
        let column = Column::new("adr", ColumnData::Numeric(vec![Some(1.0), None, Some(3.0)]));
        let profile = column.profile();
        assert_eq!(profile.kind, ColumnKind::Numeric);
        assert_eq!(profile.non_null, 2);
        assert!(profile.has_values());

        let empty = Column::new("agent", ColumnData::Categorical(vec![None, None]));
        assert!(!empty.has_values());
    }

    #[test]
    fn labels_render_every_kind() {
        let flags = Column::new("is_repeated", ColumnData::Boolean(vec![Some(true), None]));
        assert_eq!(flags.category_labels(), vec!["true".to_string()]);
        let dates = Column::new("arrival", ColumnData::Datetime(vec![Some(0)]));
        assert_eq!(dates.category_labels(), vec!["1970-01-01T00:00:00+00:00".to_string()]);
    }
}
