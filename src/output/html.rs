//! Self-contained HTML drift report.
//!
//! The document embeds its own CSS and has no external references, so it can be
//! attached to a CI run or emailed as a single file.

use std::fmt::Write;

use crate::drift::{DriftReport, GateDecision, SnapshotSummary};

pub fn render_html_report(report: &DriftReport, decision: &GateDecision) -> String {
    let mut out = String::new();
    let (verdict, verdict_class) = if decision.passed {
        ("PASSED: no feature exceeds the drift threshold", "pass")
    } else {
        ("FAILED: drift detected", "fail")
    };

    let _ = writeln!(out, "<!DOCTYPE html>");
    let _ = writeln!(out, "<html lang=\"en\">");
    let _ = writeln!(out, "<head>");
    let _ = writeln!(out, "<meta charset=\"utf-8\">");
    let _ = writeln!(out, "<title>Data Drift Report</title>");
    let _ = writeln!(out, "<style>{}</style>", styles());
    let _ = writeln!(out, "</head>");
    let _ = writeln!(out, "<body>");
    let _ = writeln!(out, "<h1>Data Drift Report</h1>");
    let _ = writeln!(
        out,
        "<div class=\"verdict {verdict_class}\">{verdict} ({} of {} features above {})</div>",
        decision.offending.len(),
        report.scores.len(),
        decision.threshold
    );

    let _ = writeln!(out, "<h2>Summary</h2>");
    let _ = writeln!(out, "<table class=\"summary\">");
    let _ = writeln!(
        out,
        "<tr><th></th><th>Source</th><th>Rows</th><th>Columns</th><th>SHA-256</th></tr>"
    );
    write_snapshot_row(&mut out, &report.baseline);
    write_snapshot_row(&mut out, &report.current);
    let _ = writeln!(out, "</table>");
    let _ = writeln!(
        out,
        "<p>Generated at {} with threshold {}.</p>",
        escape_html(&report.generated_at.to_rfc3339()),
        report.threshold
    );

    let _ = writeln!(out, "<h2>Feature Scores</h2>");
    let _ = writeln!(out, "<table>");
    let _ = writeln!(
        out,
        "<tr><th>Feature</th><th>Type</th><th>Metric</th><th>Score</th><th>Drift</th></tr>"
    );
    for score in &report.scores {
        let offending = decision.is_offending(&score.feature_name);
        let _ = writeln!(
            out,
            "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{:.6}</td><td>{}</td></tr>",
            if offending { "drifted" } else { "stable" },
            escape_html(&score.feature_name),
            score.kind,
            score.metric,
            score.value,
            if offending { "yes" } else { "no" }
        );
    }
    let _ = writeln!(out, "</table>");

    if !report.skipped.is_empty() {
        let _ = writeln!(out, "<h2>Skipped Columns</h2>");
        let _ = writeln!(out, "<table>");
        let _ = writeln!(out, "<tr><th>Column</th><th>Reason</th></tr>");
        for skipped in &report.skipped {
            let _ = writeln!(
                out,
                "<tr><td>{}</td><td>{}</td></tr>",
                escape_html(&skipped.name),
                escape_html(&skipped.reason)
            );
        }
        let _ = writeln!(out, "</table>");
    }

    if !report.dropped.is_empty() {
        let _ = writeln!(out, "<h2>Columns Not Compared</h2>");
        let _ = writeln!(out, "<table>");
        let _ = writeln!(out, "<tr><th>Column</th><th>Reason</th></tr>");
        for dropped in &report.dropped {
            let _ = writeln!(
                out,
                "<tr><td>{}</td><td>{}</td></tr>",
                escape_html(&dropped.name),
                dropped.reason
            );
        }
        let _ = writeln!(out, "</table>");
    }

    let _ = writeln!(out, "</body>");
    let _ = writeln!(out, "</html>");
    out
}

fn write_snapshot_row(out: &mut String, summary: &SnapshotSummary) {
    let _ = writeln!(
        out,
        "<tr><th>{}</th><td>{}</td><td>{}</td><td>{}</td><td><code>{}</code></td></tr>",
        escape_html(&summary.label),
        escape_html(&summary.source),
        summary.rows,
        summary.columns,
        escape_html(summary.fingerprint.as_deref().unwrap_or("-"))
    );
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn styles() -> &'static str {
    r#"
body {
  font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
  margin: 20px; background-color: #f5f5f5; color: #333;
}
table {
  border-collapse: collapse; width: 100%; background-color: white;
  box-shadow: 0 1px 3px rgba(0,0,0,0.1); margin-bottom: 20px;
}
th, td { border: 1px solid #ddd; padding: 8px; text-align: left; }
th { background-color: #4a90d9; color: white; }
tr.drifted td { background-color: #fdecea; font-weight: bold; }
.verdict { padding: 12px; margin-bottom: 20px; font-size: 1.1em; font-weight: bold; }
.verdict.pass { background-color: #e6f4ea; color: #1e6b34; }
.verdict.fail { background-color: #fdecea; color: #a12622; }
code { font-size: 0.85em; }
"#
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{escape_html, render_html_report};
    use crate::drift::reconcile::{DropReason, DroppedColumn};
    use crate::drift::scorer::SkippedColumn;
    use crate::drift::{decide, DriftReport, DriftScore, MetricKind, SnapshotSummary};
    use crate::snapshot::ColumnKind;

    fn sample_report() -> DriftReport {
        let summary = SnapshotSummary {
            label: "baseline".to_string(),
            source: "data/baseline.parquet".to_string(),
            rows: 120,
            columns: 5,
            fingerprint: Some("abc123".to_string()),
        };
        DriftReport {
            generated_at: Utc::now(),
            baseline: summary.clone(),
            current: SnapshotSummary {
                label: "current".to_string(),
                source: "data/current.parquet".to_string(),
                ..summary
            },
            threshold: 0.3,
            scores: vec![
                DriftScore {
                    feature_name: "lead_time".to_string(),
                    kind: ColumnKind::Numeric,
                    metric: MetricKind::Psi,
                    value: 1.25,
                },
                DriftScore {
                    feature_name: "<meal>".to_string(),
                    kind: ColumnKind::Categorical,
                    metric: MetricKind::Psi,
                    value: 0.02,
                },
            ],
            skipped: vec![SkippedColumn {
                name: "adr".to_string(),
                reason: "column has no finite values in the baseline snapshot".to_string(),
            }],
            dropped: vec![DroppedColumn {
                name: "reservation_status_date".to_string(),
                reason: DropReason::Excluded,
            }],
        }
    }

    #[test]
    fn report_lists_every_section() {
        let report = sample_report();
        let decision = decide(&report, 0.3);
        let html = render_html_report(&report, &decision);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("FAILED: drift detected (1 of 2 features above 0.3)"));
        assert!(html.contains("<tr class=\"drifted\"><td>lead_time</td>"));
        assert!(html.contains("&lt;meal&gt;"));
        assert!(html.contains("Skipped Columns"));
        assert!(html.contains("excluded by configuration"));
        assert!(html.contains("abc123"));
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html("<a href='x'>&</a>"), "&lt;a href=&#39;x&#39;&gt;&amp;&lt;/a&gt;");
    }
}
