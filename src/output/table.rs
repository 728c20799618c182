use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::drift::history::RunRecord;
use crate::drift::{CheckStatus, DriftReport, DroppedColumn, GateDecision};

pub fn render_scores_table(report: &DriftReport, decision: &GateDecision) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Feature", "Type", "Metric", "Score", "Drift"]);

    for score in &report.scores {
        let drift_cell = if decision.is_offending(&score.feature_name) {
            Cell::new("YES").fg(Color::Red)
        } else {
            Cell::new("NO").fg(Color::Green)
        };
        table.add_row(Row::from(vec![
            Cell::new(score.feature_name.clone()),
            Cell::new(score.kind.to_string()),
            Cell::new(score.metric.to_string()),
            Cell::new(format!("{:.4}", score.value)),
            drift_cell,
        ]));
    }
    for skipped in &report.skipped {
        table.add_row(vec![
            skipped.name.clone(),
            "-".to_string(),
            "-".to_string(),
            "skipped".to_string(),
            skipped.reason.clone(),
        ]);
    }
    table.to_string()
}

pub fn render_dropped_table(dropped: &[DroppedColumn]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Column", "Not compared because"]);
    for column in dropped {
        table.add_row(vec![column.name.clone(), column.reason.to_string()]);
    }
    table.to_string()
}

pub fn render_history_table(records: &[RunRecord]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Checked At",
        "Status",
        "Current",
        "Threshold",
        "Evaluated",
        "Offending",
        "Max Score",
    ]);
    for rec in records {
        let status_cell = match rec.status {
            CheckStatus::DriftDetected => Cell::new(rec.status.to_string()).fg(Color::Red),
            CheckStatus::Passed => Cell::new(rec.status.to_string()).fg(Color::Green),
            CheckStatus::NoEvaluableFeatures => Cell::new(rec.status.to_string()),
        };
        let offending = rec
            .offending
            .iter()
            .map(|o| o.feature_name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(Row::from(vec![
            Cell::new(rec.checked_at.to_rfc3339()),
            status_cell,
            Cell::new(rec.current.clone()),
            Cell::new(
                rec.threshold
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(rec.evaluated.to_string()),
            Cell::new(if offending.is_empty() {
                "-".to_string()
            } else {
                offending
            }),
            Cell::new(
                rec.max_score
                    .map(|v| format!("{v:.4}"))
                    .unwrap_or_else(|| "-".to_string()),
            ),
        ]));
    }
    table.to_string()
}
