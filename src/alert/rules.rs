use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::alert::engine::AlertEvent;
use crate::config::AlertRulesConfig;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertEventKind {
    DriftDetected,
    DriftResolved,
    NoEvaluableFeatures,
    ColumnsSkipped,
}

impl AlertEventKind {
    pub fn enabled_in(self, rules: &AlertRulesConfig) -> bool {
        match self {
            Self::DriftDetected => rules.drift_detected,
            Self::DriftResolved => rules.drift_resolved,
            Self::NoEvaluableFeatures => rules.no_evaluable_features,
            Self::ColumnsSkipped => rules.columns_skipped,
        }
    }
}

impl Display for AlertEventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::DriftDetected => "drift_detected",
            Self::DriftResolved => "drift_resolved",
            Self::NoEvaluableFeatures => "no_evaluable_features",
            Self::ColumnsSkipped => "columns_skipped",
        };
        write!(f, "{label}")
    }
}

/// Drops events whose kind is switched off under `[alerts.rules]`.
pub fn apply_alert_rules(alerts: Vec<AlertEvent>, rules: &AlertRulesConfig) -> Vec<AlertEvent> {
    alerts
        .into_iter()
        .filter(|event| event.kind.enabled_in(rules))
        .collect()
}
