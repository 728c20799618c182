use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::drift::check::{CheckOutcome, CheckStatus};
use crate::drift::gate::OffendingFeature;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    pub checked_at: DateTime<Utc>,
    pub baseline: String,
    pub current: String,
    pub threshold: Option<f64>,
    pub status: CheckStatus,
    pub evaluated: usize,
    pub offending: Vec<OffendingFeature>,
    pub max_score: Option<f64>,
}

pub fn record_from_outcome(
    baseline: impl Into<String>,
    current: impl Into<String>,
    outcome: &CheckOutcome,
) -> RunRecord {
    let (threshold, evaluated, offending, max_score) = match outcome {
        CheckOutcome::NoEvaluableFeatures(_) => (None, 0, Vec::new(), None),
        CheckOutcome::Evaluated { report, decision } => (
            Some(decision.threshold),
            report.scores.len(),
            decision.offending.clone(),
            report.max_score(),
        ),
    };
    RunRecord {
        checked_at: Utc::now(),
        baseline: baseline.into(),
        current: current.into(),
        threshold,
        status: outcome.status(),
        evaluated,
        offending,
        max_score,
    }
}

pub fn summarize_runs(records: &[RunRecord]) -> String {
    if records.is_empty() {
        return "No drift runs recorded.".to_string();
    }
    let drifted = records
        .iter()
        .filter(|r| r.status == CheckStatus::DriftDetected)
        .count();
    let neutral = records
        .iter()
        .filter(|r| r.status == CheckStatus::NoEvaluableFeatures)
        .count();
    format!(
        "Drift detected in {drifted}/{} runs ({:.1}%), {neutral} without evaluable features",
        records.len(),
        (drifted as f64 / records.len() as f64) * 100.0
    )
}
