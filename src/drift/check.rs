use std::fmt::{Display, Formatter};
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::drift::gate::{decide, GateDecision};
use crate::drift::reconcile::{reconcile, DroppedColumn};
use crate::drift::scorer::{score_columns, ScorerSettings, SkippedColumn};
use crate::drift::{DriftReport, DriftSettings, SnapshotSummary};
use crate::output::{write_report, ReportFormat};
use crate::snapshot::{load_pair, LoadError, LoadOptions, Snapshot};

/// Process status for a snapshot that could not be loaded.
pub const EXIT_LOAD_ERROR: u8 = 3;
/// Process status for any other failure (config, report write, run store).
pub const EXIT_RUNTIME_ERROR: u8 = 4;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    DriftDetected,
    NoEvaluableFeatures,
}

impl CheckStatus {
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Passed | Self::NoEvaluableFeatures => 0,
            Self::DriftDetected => 1,
        }
    }

    pub fn as_slug(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::DriftDetected => "drift_detected",
            Self::NoEvaluableFeatures => "no_evaluable_features",
        }
    }
}

impl Display for CheckStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_slug())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoFeaturesReason {
    /// Reconciliation left no column present and non-null in both snapshots.
    NothingComparable,
    /// Every evaluable column failed to score.
    AllColumnsUnscorable,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoEvaluableFeatures {
    pub reason: NoFeaturesReason,
    pub baseline_rows: usize,
    pub current_rows: usize,
    pub dropped: Vec<DroppedColumn>,
    pub skipped: Vec<SkippedColumn>,
}

impl NoEvaluableFeatures {
    pub fn message(&self) -> String {
        match self.reason {
            NoFeaturesReason::NothingComparable => format!(
                "No valid features for drift detection after filtering ({} columns dropped).",
                self.dropped.len()
            ),
            NoFeaturesReason::AllColumnsUnscorable => format!(
                "No features could be scored for drift ({} columns skipped).",
                self.skipped.len()
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    NoEvaluableFeatures(NoEvaluableFeatures),
    Evaluated {
        report: DriftReport,
        decision: GateDecision,
    },
}

impl CheckOutcome {
    pub fn status(&self) -> CheckStatus {
        match self {
            Self::NoEvaluableFeatures(_) => CheckStatus::NoEvaluableFeatures,
            Self::Evaluated { decision, .. } if decision.passed => CheckStatus::Passed,
            Self::Evaluated { .. } => CheckStatus::DriftDetected,
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.status().exit_code()
    }

    pub fn skipped(&self) -> &[SkippedColumn] {
        match self {
            Self::NoEvaluableFeatures(empty) => &empty.skipped,
            Self::Evaluated { report, .. } => &report.skipped,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::NoEvaluableFeatures(empty) => empty.message(),
            Self::Evaluated { report, decision } if decision.passed => format!(
                "No drift: {} features within threshold {}.",
                report.scores.len(),
                decision.threshold
            ),
            Self::Evaluated { report, decision } => format!(
                "Drift detected in {}/{} features above threshold {}: {}.",
                decision.offending.len(),
                report.scores.len(),
                decision.threshold,
                decision
                    .offending
                    .iter()
                    .map(|o| o.feature_name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

/// Reconcile, score and gate two loaded snapshots. Performs no I/O.
pub fn run_check(
    baseline: &Snapshot,
    current: &Snapshot,
    settings: &DriftSettings,
) -> CheckOutcome {
    let reconciliation = reconcile(baseline, current, &settings.excluded_columns);
    if reconciliation.is_empty() {
        return CheckOutcome::NoEvaluableFeatures(NoEvaluableFeatures {
            reason: NoFeaturesReason::NothingComparable,
            baseline_rows: baseline.rows,
            current_rows: current.rows,
            dropped: reconciliation.dropped,
            skipped: Vec::new(),
        });
    }

    let scorer = ScorerSettings {
        numeric_method: settings.numeric_method,
        categorical_method: settings.categorical_method,
        bins: settings.bins,
    };
    let (scores, skipped) = score_columns(&reconciliation, &scorer);
    if scores.is_empty() {
        return CheckOutcome::NoEvaluableFeatures(NoEvaluableFeatures {
            reason: NoFeaturesReason::AllColumnsUnscorable,
            baseline_rows: baseline.rows,
            current_rows: current.rows,
            dropped: reconciliation.dropped,
            skipped,
        });
    }

    let report = DriftReport {
        generated_at: Utc::now(),
        baseline: SnapshotSummary::from(baseline),
        current: SnapshotSummary::from(current),
        threshold: settings.threshold,
        scores,
        skipped,
        dropped: reconciliation.dropped,
    };
    let decision = decide(&report, settings.threshold);
    CheckOutcome::Evaluated { report, decision }
}

pub fn load_and_check(
    baseline: &Path,
    current: &Path,
    options: &LoadOptions,
    settings: &DriftSettings,
) -> Result<CheckOutcome, LoadError> {
    let (baseline, current) = load_pair(baseline, current, options)?;
    let outcome = run_check(&baseline, &current, settings);
    info!("drift check finished: {}", outcome.status());
    Ok(outcome)
}

/// Loads, checks and writes the report to `report_path` when one is given.
///
/// When no feature could be evaluated nothing is written, and a file already at
/// `report_path` keeps its contents.
pub fn check_and_report(
    baseline: &Path,
    current: &Path,
    report_path: Option<&Path>,
    options: &LoadOptions,
    settings: &DriftSettings,
    format: Option<ReportFormat>,
) -> anyhow::Result<CheckOutcome> {
    let outcome = load_and_check(baseline, current, options, settings)?;
    match (&outcome, report_path) {
        (CheckOutcome::Evaluated { report, decision }, Some(path)) => {
            write_report(path, report, decision, format)?;
        }
        (CheckOutcome::NoEvaluableFeatures(empty), Some(path)) => {
            warn!(
                "{} Report not written; {} left untouched.",
                empty.message(),
                path.display()
            );
        }
        (_, None) => {}
    }
    Ok(outcome)
}

/// Maps a failed run to its exit status. Load failures stay distinct from drift (1).
pub fn exit_code_for_error(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<LoadError>().is_some() {
        EXIT_LOAD_ERROR
    } else {
        EXIT_RUNTIME_ERROR
    }
}
