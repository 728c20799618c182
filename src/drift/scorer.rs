use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::drift::reconcile::{EvaluableColumn, Reconciliation};
use crate::drift::statistics::{
    categorical_psi, category_proportions, jensen_shannon_distance, ks_statistic, numeric_psi,
    population_std, wasserstein_distance,
};
use crate::drift::{CategoricalMethod, DriftScore, MetricKind, NumericMethod};
use crate::snapshot::{Column, ColumnKind, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScorerSettings {
    pub numeric_method: NumericMethod,
    pub categorical_method: CategoricalMethod,
    pub bins: usize,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScoreError {
    #[error("column has no finite values in the {snapshot} snapshot")]
    EmptyDistribution { snapshot: String },
    #[error("baseline distribution has zero spread")]
    DegenerateBaseline,
    #[error("statistic evaluated to a non-finite value")]
    NonFiniteScore,
    #[error("column is missing from the {snapshot} snapshot")]
    MissingColumn { snapshot: String },
}

/// A column the scorer could not evaluate, kept in the report with its reason.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkippedColumn {
    pub name: String,
    pub reason: String,
}

pub fn score_columns(
    reconciliation: &Reconciliation,
    settings: &ScorerSettings,
) -> (Vec<DriftScore>, Vec<SkippedColumn>) {
    let mut scores = Vec::with_capacity(reconciliation.columns.len());
    let mut skipped = Vec::new();

    for column in &reconciliation.columns {
        match score_column(reconciliation, column, settings) {
            Ok(score) => {
                debug!("{} {} = {:.6}", score.feature_name, score.metric, score.value);
                scores.push(score);
            }
            Err(err) => {
                warn!("skipping column {}: {err}", column.name);
                skipped.push(SkippedColumn {
                    name: column.name.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }
    (scores, skipped)
}

pub fn score_column(
    reconciliation: &Reconciliation,
    column: &EvaluableColumn,
    settings: &ScorerSettings,
) -> Result<DriftScore, ScoreError> {
    let baseline = lookup(&reconciliation.baseline, &column.name)?;
    let current = lookup(&reconciliation.current, &column.name)?;

    let (metric, value) = match column.kind {
        ColumnKind::Numeric | ColumnKind::Datetime => score_numeric(baseline, current, settings)?,
        ColumnKind::Categorical | ColumnKind::Boolean => {
            score_categorical(baseline, current, settings.categorical_method)
        }
    };
    if !value.is_finite() {
        return Err(ScoreError::NonFiniteScore);
    }

    Ok(DriftScore {
        feature_name: column.name.clone(),
        kind: column.kind,
        metric,
        value,
    })
}

fn lookup<'a>(snapshot: &'a Snapshot, name: &str) -> Result<&'a Column, ScoreError> {
    snapshot
        .column(name)
        .ok_or_else(|| ScoreError::MissingColumn {
            snapshot: snapshot.label.clone(),
        })
}

fn score_numeric(
    baseline: &Column,
    current: &Column,
    settings: &ScorerSettings,
) -> Result<(MetricKind, f64), ScoreError> {
    let base = finite_values(baseline, "baseline")?;
    let curr = finite_values(current, "current")?;

    let scored = match settings.numeric_method {
        NumericMethod::Psi => (MetricKind::Psi, numeric_psi(&base, &curr, settings.bins)),
        NumericMethod::Wasserstein => {
            let spread = population_std(&base);
            if spread <= f64::EPSILON {
                return Err(ScoreError::DegenerateBaseline);
            }
            (
                MetricKind::WassersteinNormed,
                wasserstein_distance(&base, &curr) / spread,
            )
        }
        NumericMethod::Ks => (MetricKind::KolmogorovSmirnov, ks_statistic(&base, &curr)),
    };
    Ok(scored)
}

fn score_categorical(
    baseline: &Column,
    current: &Column,
    method: CategoricalMethod,
) -> (MetricKind, f64) {
    let base = baseline.category_labels();
    let curr = current.category_labels();
    match method {
        CategoricalMethod::Psi => (MetricKind::Psi, categorical_psi(&base, &curr)),
        CategoricalMethod::JensenShannon => {
            let (p, q) = category_proportions(&base, &curr);
            (MetricKind::JensenShannon, jensen_shannon_distance(&p, &q))
        }
    }
}

fn finite_values(column: &Column, snapshot: &str) -> Result<Vec<f64>, ScoreError> {
    let values: Vec<f64> = column
        .numeric_values()
        .into_iter()
        .filter(|v| v.is_finite())
        .collect();
    if values.is_empty() {
        return Err(ScoreError::EmptyDistribution {
            snapshot: snapshot.to_string(),
        });
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::{score_columns, ScoreError, ScorerSettings};
    use crate::drift::reconcile::reconcile;
    use crate::drift::{CategoricalMethod, MetricKind, NumericMethod};
    use crate::snapshot::{Column, ColumnData, Snapshot};

    fn settings(numeric_method: NumericMethod) -> ScorerSettings {
        ScorerSettings {
            numeric_method,
            categorical_method: CategoricalMethod::Psi,
            bins: 10,
        }
    }

    fn pair(base: Vec<Column>, curr: Vec<Column>) -> (Snapshot, Snapshot) {
        (Snapshot::new("baseline", base), Snapshot::new("current", curr))
    }

    #[test]
    fn pathological_column_is_skipped_not_fatal() {
        let (baseline, current) = pair(
            vec![
                Column::new(
                    "adr",
                    ColumnData::Numeric(vec![Some(f64::INFINITY), Some(f64::INFINITY)]),
                ),
                Column::new("lead_time", ColumnData::Numeric(vec![Some(10.0), Some(12.0)])),
            ],
            vec![
                Column::new("adr", ColumnData::Numeric(vec![Some(90.0), Some(95.0)])),
                Column::new("lead_time", ColumnData::Numeric(vec![Some(11.0), Some(12.0)])),
            ],
        );
        let reconciled = reconcile(&baseline, &current, &[]);
        let (scores, skipped) = score_columns(&reconciled, &settings(NumericMethod::Psi));
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].feature_name, "lead_time");
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].name, "adr");
        assert_eq!(
            skipped[0].reason,
            ScoreError::EmptyDistribution {
                snapshot: "baseline".to_string()
            }
            .to_string()
        );
    }

    #[test]
    fn wasserstein_rejects_constant_baseline() {
        let (baseline, current) = pair(
            vec![Column::new("babies", ColumnData::Numeric(vec![Some(0.0), Some(0.0)]))],
            vec![Column::new("babies", ColumnData::Numeric(vec![Some(0.0), Some(1.0)]))],
        );
        let reconciled = reconcile(&baseline, &current, &[]);
        let (scores, skipped) = score_columns(&reconciled, &settings(NumericMethod::Wasserstein));
        assert!(scores.is_empty());
        assert_eq!(skipped[0].reason, ScoreError::DegenerateBaseline.to_string());

        let (scores, _) = score_columns(&reconciled, &settings(NumericMethod::Psi));
        assert_eq!(scores.len(), 1);
        assert!(scores[0].value > 0.0);
    }

    #[test]
    fn dispatches_on_column_kind() {
        let (baseline, current) = pair(
            vec![
                Column::new(
                    "is_repeated_guest",
                    ColumnData::Boolean(vec![Some(true), Some(false)]),
                ),
                Column::new("arrival", ColumnData::Datetime(vec![Some(0), Some(86_400_000)])),
            ],
            vec![
                Column::new(
                    "is_repeated_guest",
                    ColumnData::Boolean(vec![Some(false), Some(false)]),
                ),
                Column::new("arrival", ColumnData::Datetime(vec![Some(0), Some(86_400_000)])),
            ],
        );
        let reconciled = reconcile(&baseline, &current, &[]);
        let mut config = settings(NumericMethod::Ks);
        config.categorical_method = CategoricalMethod::JensenShannon;
        let (scores, skipped) = score_columns(&reconciled, &config);
        assert!(skipped.is_empty());
        assert_eq!(scores[0].metric, MetricKind::JensenShannon);
        assert!(scores[0].value > 0.0);
        assert_eq!(scores[1].metric, MetricKind::KolmogorovSmirnov);
        assert_eq!(scores[1].value, 0.0);
    }
}
