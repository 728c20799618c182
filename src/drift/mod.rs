pub mod check;
pub mod gate;
pub mod history;
pub mod reconcile;
pub mod scorer;
pub mod statistics;

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::snapshot::{ColumnKind, Snapshot};

pub use check::{
    check_and_report, exit_code_for_error, load_and_check, run_check, CheckOutcome, CheckStatus,
    NoEvaluableFeatures, EXIT_LOAD_ERROR, EXIT_RUNTIME_ERROR,
};
pub use gate::{decide, validate_threshold, GateDecision, OffendingFeature};
pub use reconcile::{reconcile, DropReason, DroppedColumn, EvaluableColumn, Reconciliation};
pub use scorer::{score_column, score_columns, ScoreError, SkippedColumn};

pub const DEFAULT_THRESHOLD: f64 = 0.3;
pub const DEFAULT_BINS: usize = 10;
pub const MAX_BINS: usize = 1000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Psi,
    JensenShannon,
    WassersteinNormed,
    KolmogorovSmirnov,
}

impl Display for MetricKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Psi => "psi",
            Self::JensenShannon => "jensen_shannon",
            Self::WassersteinNormed => "wasserstein_normed",
            Self::KolmogorovSmirnov => "ks",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum NumericMethod {
    #[default]
    Psi,
    #[serde(alias = "wasserstein_normed")]
    Wasserstein,
    #[serde(alias = "kolmogorov_smirnov")]
    Ks,
}

impl FromStr for NumericMethod {
    type Err = MethodParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "psi" => Ok(Self::Psi),
            "wasserstein" | "wasserstein_normed" => Ok(Self::Wasserstein),
            "ks" | "kolmogorov_smirnov" => Ok(Self::Ks),
            _ => Err(MethodParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalMethod {
    #[default]
    Psi,
    #[serde(alias = "js")]
    JensenShannon,
}

impl FromStr for CategoricalMethod {
    type Err = MethodParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "psi" => Ok(Self::Psi),
            "jensen_shannon" | "js" => Ok(Self::JensenShannon),
            _ => Err(MethodParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown drift method: {0}")]
pub struct MethodParseError(pub String);

/// Everything a single check run needs beyond the two snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriftSettings {
    pub threshold: f64,
    pub excluded_columns: Vec<String>,
    pub numeric_method: NumericMethod,
    pub categorical_method: CategoricalMethod,
    pub bins: usize,
}

impl Default for DriftSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            excluded_columns: default_excluded_columns(),
            numeric_method: NumericMethod::default(),
            categorical_method: CategoricalMethod::default(),
            bins: DEFAULT_BINS,
        }
    }
}

pub fn default_excluded_columns() -> Vec<String> {
    vec![
        "booking_date".to_string(),
        "reservation_status_date".to_string(),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriftScore {
    pub feature_name: String,
    pub kind: ColumnKind,
    pub metric: MetricKind,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotSummary {
    pub label: String,
    pub source: String,
    pub rows: usize,
    pub columns: usize,
    pub fingerprint: Option<String>,
}

impl From<&Snapshot> for SnapshotSummary {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            label: snapshot.label.clone(),
            source: snapshot.source.clone(),
            rows: snapshot.rows,
            columns: snapshot.columns.len(),
            fingerprint: snapshot.fingerprint.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriftReport {
    pub generated_at: DateTime<Utc>,
    pub baseline: SnapshotSummary,
    pub current: SnapshotSummary,
    pub threshold: f64,
    pub scores: Vec<DriftScore>,
    pub skipped: Vec<SkippedColumn>,
    pub dropped: Vec<DroppedColumn>,
}

impl DriftReport {
    pub fn score_for(&self, feature: &str) -> Option<&DriftScore> {
        self.scores.iter().find(|s| s.feature_name == feature)
    }

    pub fn max_score(&self) -> Option<f64> {
        self.scores.iter().map(|s| s.value).reduce(f64::max)
    }
}
