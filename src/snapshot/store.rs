use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::drift::check::CheckStatus;
use crate::drift::history::RunRecord;
use crate::snapshot::migrations::BASE_MIGRATION;

pub struct RunStore {
    conn: Connection,
}

impl RunStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(BASE_MIGRATION)?;
        Ok(())
    }

    pub fn insert_run(&self, record: &RunRecord) -> Result<()> {
        self.conn.execute(
            r#"
INSERT INTO drift_runs(
    checked_at, baseline, current, threshold, status, evaluated, offending, max_score,
    offending_json
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
"#,
            params![
                record.checked_at.to_rfc3339(),
                record.baseline,
                record.current,
                record.threshold,
                record.status.as_slug(),
                record.evaluated as i64,
                record.offending.len() as i64,
                record.max_score,
                serde_json::to_string(&record.offending)?
            ],
        )?;
        Ok(())
    }

    /// Most recent runs first.
    pub fn load_runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
SELECT checked_at, baseline, current, threshold, status, evaluated, max_score, offending_json
FROM drift_runs
ORDER BY id DESC
LIMIT ?1
"#,
        )?;
        let rows = stmt
            .query_map(params![limit as i64], row_to_run_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn row_to_run_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunRecord> {
    let checked_at_raw: String = row.get(0)?;
    let checked_at = DateTime::parse_from_rfc3339(&checked_at_raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    let status_raw: String = row.get(4)?;
    let status = match status_raw.as_str() {
        "drift_detected" => CheckStatus::DriftDetected,
        "no_evaluable_features" => CheckStatus::NoEvaluableFeatures,
        _ => CheckStatus::Passed,
    };
    let offending_raw: String = row.get(7)?;
    Ok(RunRecord {
        checked_at,
        baseline: row.get(1)?,
        current: row.get(2)?,
        threshold: row.get(3)?,
        status,
        evaluated: row.get::<_, i64>(5)? as usize,
        offending: serde_json::from_str(&offending_raw).unwrap_or_default(),
        max_score: row.get(6)?,
    })
}
