use serde::{Deserialize, Serialize};

use crate::alert::rules::AlertEventKind;
use crate::drift::{CheckOutcome, CheckStatus};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertEvent {
    pub kind: AlertEventKind,
    pub title: String,
    pub body: String,
}

/// Builds the alerts for one check, given the status of the run before it.
///
/// `DriftDetected` fires on every failing run. `DriftResolved` fires only when a
/// failing run is followed by a passing one.
pub fn evaluate_alerts(previous: Option<CheckStatus>, outcome: &CheckOutcome) -> Vec<AlertEvent> {
    let mut events = Vec::new();

    match outcome {
        CheckOutcome::NoEvaluableFeatures(empty) => {
            events.push(AlertEvent {
                kind: AlertEventKind::NoEvaluableFeatures,
                title: "No evaluable features".to_string(),
                body: format!(
                    "{} (baseline rows: {}, current rows: {})",
                    empty.message(),
                    empty.baseline_rows,
                    empty.current_rows
                ),
            });
        }
        CheckOutcome::Evaluated { report, decision } => {
            if !decision.passed {
                let features = decision
                    .offending
                    .iter()
                    .map(|o| format!("{} ({:.3})", o.feature_name, o.score))
                    .collect::<Vec<_>>()
                    .join(", ");
                events.push(AlertEvent {
                    kind: AlertEventKind::DriftDetected,
                    title: format!(
                        "Drift detected in {} of {} features",
                        decision.offending.len(),
                        report.scores.len()
                    ),
                    body: format!("Above threshold {}: {features}", decision.threshold),
                });
            } else if previous == Some(CheckStatus::DriftDetected) {
                events.push(AlertEvent {
                    kind: AlertEventKind::DriftResolved,
                    title: "Drift resolved".to_string(),
                    body: format!(
                        "All {} features are within threshold {} again.",
                        report.scores.len(),
                        decision.threshold
                    ),
                });
            }
        }
    }

    let skipped = outcome.skipped();
    if !skipped.is_empty() {
        events.push(AlertEvent {
            kind: AlertEventKind::ColumnsSkipped,
            title: format!("{} columns could not be scored", skipped.len()),
            body: skipped
                .iter()
                .map(|s| format!("{}: {}", s.name, s.reason))
                .collect::<Vec<_>>()
                .join("; "),
        });
    }

    events
}
