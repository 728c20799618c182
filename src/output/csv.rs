use anyhow::Result;

use crate::drift::history::RunRecord;
use crate::drift::{DriftReport, GateDecision};

const SCORE_HEADER: [&str; 5] = ["feature", "kind", "metric", "score", "offending"];

pub fn scores_to_csv(report: &DriftReport, decision: &GateDecision) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(SCORE_HEADER)?;
    for score in &report.scores {
        writer.write_record([
            score.feature_name.clone(),
            score.kind.to_string(),
            score.metric.to_string(),
            format!("{:.6}", score.value),
            decision.is_offending(&score.feature_name).to_string(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

/// Header-only score table, for runs where no feature was evaluated.
pub fn empty_scores_csv() -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(SCORE_HEADER)?;
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn runs_to_csv(records: &[RunRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "checked_at",
        "status",
        "baseline",
        "current",
        "threshold",
        "evaluated",
        "offending",
        "max_score",
    ])?;
    for record in records {
        writer.write_record([
            record.checked_at.to_rfc3339(),
            record.status.to_string(),
            record.baseline.clone(),
            record.current.clone(),
            record.threshold.map(|t| t.to_string()).unwrap_or_default(),
            record.evaluated.to_string(),
            record.offending.len().to_string(),
            record
                .max_score
                .map(|s| format!("{s:.6}"))
                .unwrap_or_default(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{empty_scores_csv, scores_to_csv};
    use crate::drift::{decide, DriftReport, DriftScore, MetricKind, SnapshotSummary};
    use crate::snapshot::ColumnKind;

    #[test]
    fn writes_one_row_per_score() {
        let summary = SnapshotSummary {
            label: "baseline".to_string(),
            source: "b.csv".to_string(),
            rows: 3,
            columns: 2,
            fingerprint: None,
        };
        let report = DriftReport {
            generated_at: Utc::now(),
            baseline: summary.clone(),
            current: SnapshotSummary {
                label: "current".to_string(),
                ..summary
            },
            threshold: 0.3,
            scores: vec![
                DriftScore {
                    feature_name: "hotel".to_string(),
                    kind: ColumnKind::Categorical,
                    metric: MetricKind::Psi,
                    value: 6.5,
                },
                DriftScore {
                    feature_name: "adr".to_string(),
                    kind: ColumnKind::Numeric,
                    metric: MetricKind::Psi,
                    value: 0.01,
                },
            ],
            skipped: Vec::new(),
            dropped: Vec::new(),
        };
        let decision = decide(&report, 0.3);
        let csv = scores_to_csv(&report, &decision).expect("csv");
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "feature,kind,metric,score,offending");
        assert_eq!(lines[1], "hotel,categorical,psi,6.500000,true");
        assert_eq!(lines[2], "adr,numeric,psi,0.010000,false");
    }

    #[test]
    fn empty_table_keeps_the_header() {
        let csv = empty_scores_csv().expect("csv");
        assert_eq!(csv, "feature,kind,metric,score,offending\n");
    }
}
