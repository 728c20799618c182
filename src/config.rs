use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::drift::{
    default_excluded_columns, validate_threshold, CategoricalMethod, DriftSettings,
    NumericMethod, DEFAULT_BINS, DEFAULT_THRESHOLD, MAX_BINS,
};
use crate::output::ReportFormat;
use crate::snapshot::{default_null_markers, LoadOptions, SnapshotFormat};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub drift: DriftConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_excluded_columns")]
    pub excluded_columns: Vec<String>,
    #[serde(default)]
    pub numeric_method: NumericMethod,
    #[serde(default)]
    pub categorical_method: CategoricalMethod,
    #[serde(default = "default_bins")]
    pub bins: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default)]
    pub format: SnapshotFormat,
    #[serde(default = "default_null_markers")]
    pub null_markers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// When unset the format follows the report file extension.
    #[serde(default)]
    pub format: Option<ReportFormat>,
    /// Root for report paths given to the HTTP API.
    #[serde(default = "default_report_dir")]
    pub dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default)]
    pub record_runs: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default)]
    pub webhook: String,
    #[serde(default = "default_enable_stdout")]
    pub enable_stdout: bool,
    #[serde(default)]
    pub rules: AlertRulesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRulesConfig {
    #[serde(default = "default_true")]
    pub drift_detected: bool,
    #[serde(default = "default_true")]
    pub drift_resolved: bool,
    #[serde(default = "default_true")]
    pub no_evaluable_features: bool,
    #[serde(default = "default_true")]
    pub columns_skipped: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub threshold: Option<f64>,
    pub excluded_columns: Option<Vec<String>>,
    pub report_format: Option<ReportFormat>,
    pub record_runs: Option<bool>,
    pub numeric_method: Option<NumericMethod>,
    pub categorical_method: Option<CategoricalMethod>,
    pub snapshot_format: Option<SnapshotFormat>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/drift-gate/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.drift.threshold).context("invalid [drift] threshold")?;
        if !(2..=MAX_BINS).contains(&self.drift.bins) {
            anyhow::bail!(
                "[drift] bins must be between 2 and {MAX_BINS}, got {}",
                self.drift.bins
            );
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(threshold) = overrides.threshold {
            self.drift.threshold = threshold;
        }
        if let Some(excluded) = overrides.excluded_columns {
            self.drift.excluded_columns = excluded;
        }
        if let Some(format) = overrides.report_format {
            self.report.format = Some(format);
        }
        if let Some(record) = overrides.record_runs {
            self.storage.record_runs = record;
        }
        if let Some(method) = overrides.numeric_method {
            self.drift.numeric_method = method;
        }
        if let Some(method) = overrides.categorical_method {
            self.drift.categorical_method = method;
        }
        if let Some(format) = overrides.snapshot_format {
            self.snapshot.format = format;
        }
    }

    pub fn drift_settings(&self) -> DriftSettings {
        DriftSettings {
            threshold: self.drift.threshold,
            excluded_columns: self.drift.excluded_columns.clone(),
            numeric_method: self.drift.numeric_method,
            categorical_method: self.drift.categorical_method,
            bins: self.drift.bins,
        }
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            format: self.snapshot.format,
            null_markers: self.snapshot.null_markers.clone(),
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn resolved_report_dir(&self) -> PathBuf {
        expand_tilde(&self.report.dir)
    }

    pub fn default_template() -> String {
        let template = r#"[drift]
threshold = 0.3
excluded_columns = ["booking_date", "reservation_status_date"]
numeric_method = "psi"        # psi | wasserstein | ks
categorical_method = "psi"    # psi | jensen_shannon
bins = 10

[snapshot]
format = "auto"               # auto | parquet | csv
null_markers = ["", "NA", "NaN", "nan", "null", "None"]

[report]
# format = "html"             # html | json | csv; defaults to the report extension
dir = "~/.local/share/drift-gate/reports"

[storage]
db_path = "~/.local/share/drift-gate/runs.db"
record_runs = false

[alerts]
webhook = ""
enable_stdout = true

[alerts.rules]
drift_detected = true
drift_resolved = true
no_evaluable_features = true
columns_skipped = true
"#;
        template.to_string()
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            excluded_columns: default_excluded_columns(),
            numeric_method: NumericMethod::default(),
            categorical_method: CategoricalMethod::default(),
            bins: default_bins(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: None,
            dir: default_report_dir(),
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            format: SnapshotFormat::default(),
            null_markers: default_null_markers(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            record_runs: false,
        }
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            webhook: String::new(),
            enable_stdout: default_enable_stdout(),
            rules: AlertRulesConfig::default(),
        }
    }
}

impl Default for AlertRulesConfig {
    fn default() -> Self {
        Self {
            drift_detected: true,
            drift_resolved: true,
            no_evaluable_features: true,
            columns_skipped: true,
        }
    }
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_bins() -> usize {
    DEFAULT_BINS
}

fn default_db_path() -> String {
    "~/.local/share/drift-gate/runs.db".to_string()
}

fn default_report_dir() -> String {
    "~/.local/share/drift-gate/reports".to_string()
}

fn default_enable_stdout() -> bool {
    true
}

fn default_true() -> bool {
    true
}
