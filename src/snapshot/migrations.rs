pub const BASE_MIGRATION: &str = r#"
CREATE TABLE IF NOT EXISTS drift_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    checked_at TEXT NOT NULL,
    baseline TEXT NOT NULL,
    current TEXT NOT NULL,
    threshold REAL,
    status TEXT NOT NULL,
    evaluated INTEGER NOT NULL,
    offending INTEGER NOT NULL,
    max_score REAL,
    offending_json TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_drift_runs_checked_at
    ON drift_runs(checked_at DESC);
"#;
