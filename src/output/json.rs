use anyhow::Result;
use serde::Serialize;

use crate::drift::{DriftReport, GateDecision};

#[derive(Debug, Serialize)]
struct ReportDocument<'a> {
    report: &'a DriftReport,
    decision: &'a GateDecision,
}

pub fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn render_report_json(report: &DriftReport, decision: &GateDecision) -> Result<String> {
    render_json(&ReportDocument { report, decision })
}
