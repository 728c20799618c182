pub mod csv;
pub mod html;
pub mod json;
pub mod table;

use std::fmt::{Display, Formatter};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::drift::{DriftReport, GateDecision};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    Html,
    Json,
    Csv,
}

impl ReportFormat {
    /// `.json` and `.csv` map to their formats; everything else is rendered as HTML.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("json") => Self::Json,
            Some("csv") => Self::Csv,
            _ => Self::Html,
        }
    }
}

impl Display for ReportFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Html => "html",
            Self::Json => "json",
            Self::Csv => "csv",
        };
        write!(f, "{label}")
    }
}

pub fn render_report(
    report: &DriftReport,
    decision: &GateDecision,
    format: ReportFormat,
) -> Result<String> {
    match format {
        ReportFormat::Html => Ok(html::render_html_report(report, decision)),
        ReportFormat::Json => json::render_report_json(report, decision),
        ReportFormat::Csv => csv::scores_to_csv(report, decision),
    }
}

/// Writes the full artifact to `path`, creating parent directories as needed.
pub fn write_report(
    path: &Path,
    report: &DriftReport,
    decision: &GateDecision,
    format: Option<ReportFormat>,
) -> Result<ReportFormat> {
    let format = format.unwrap_or_else(|| ReportFormat::from_path(path));
    let body = render_report(report, decision, format)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed creating report directory: {}", parent.display()))?;
    }
    fs::write(path, body)
        .with_context(|| format!("failed writing drift report: {}", path.display()))?;
    info!("wrote {format} drift report to {}", path.display());
    Ok(format)
}
