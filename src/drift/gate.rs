use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::drift::DriftReport;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OffendingFeature {
    pub feature_name: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateDecision {
    pub passed: bool,
    pub threshold: f64,
    /// In report (original column) order, not by score.
    pub offending: Vec<OffendingFeature>,
}

impl GateDecision {
    pub fn is_offending(&self, feature: &str) -> bool {
        self.offending.iter().any(|o| o.feature_name == feature)
    }
}

/// A feature offends when its score strictly exceeds `threshold`.
pub fn decide(report: &DriftReport, threshold: f64) -> GateDecision {
    let offending: Vec<OffendingFeature> = report
        .scores
        .iter()
        .filter(|s| s.value > threshold)
        .map(|s| OffendingFeature {
            feature_name: s.feature_name.clone(),
            score: s.value,
        })
        .collect();
    GateDecision {
        passed: offending.is_empty(),
        threshold,
        offending,
    }
}

pub fn validate_threshold(threshold: f64) -> Result<f64> {
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(anyhow!(
            "threshold must be a finite non-negative number, got {threshold}"
        ));
    }
    Ok(threshold)
}
