use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::snapshot::{ColumnKind, Snapshot};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvaluableColumn {
    pub name: String,
    pub kind: ColumnKind,
    /// Set when the snapshots disagree on the kind and the column is compared as text.
    pub coerced: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    Excluded,
    MissingFromBaseline,
    MissingFromCurrent,
    AllNullInBaseline,
    AllNullInCurrent,
    IndexColumn,
}

impl Display for DropReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Excluded => "excluded by configuration",
            Self::MissingFromBaseline => "missing from baseline",
            Self::MissingFromCurrent => "missing from current",
            Self::AllNullInBaseline => "all null in baseline",
            Self::AllNullInCurrent => "all null in current",
            Self::IndexColumn => "stored row index",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DroppedColumn {
    pub name: String,
    pub reason: DropReason,
}

/// Both snapshots restricted to the evaluable columns, in baseline order.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub baseline: Snapshot,
    pub current: Snapshot,
    pub columns: Vec<EvaluableColumn>,
    pub dropped: Vec<DroppedColumn>,
}

impl Reconciliation {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

pub fn reconcile(baseline: &Snapshot, current: &Snapshot, excluded: &[String]) -> Reconciliation {
    let mut columns = Vec::new();
    let mut dropped = Vec::new();
    let is_excluded = |name: &str| excluded.iter().any(|e| e == name);

    let mut index_names: Vec<&str> = Vec::new();
    for name in baseline.index_columns.iter().chain(&current.index_columns) {
        if !index_names.contains(&name.as_str()) {
            index_names.push(name);
            dropped.push(dropped_column(name, DropReason::IndexColumn));
        }
    }
    let is_index = |name: &str| index_names.contains(&name);

    for column in &baseline.columns {
        let name = column.name.as_str();
        if is_index(name) {
            continue;
        }
        if is_excluded(name) {
            dropped.push(dropped_column(name, DropReason::Excluded));
            continue;
        }
        let Some(other) = current.column(name) else {
            dropped.push(dropped_column(name, DropReason::MissingFromCurrent));
            continue;
        };

        let base_profile = column.profile();
        let curr_profile = other.profile();
        if !base_profile.has_values() {
            dropped.push(dropped_column(name, DropReason::AllNullInBaseline));
            continue;
        }
        if !curr_profile.has_values() {
            dropped.push(dropped_column(name, DropReason::AllNullInCurrent));
            continue;
        }

        let coerced = base_profile.kind != curr_profile.kind;
        let kind = if coerced {
            warn!(
                "column {name} is {} in baseline but {} in current; comparing as categorical",
                base_profile.kind, curr_profile.kind
            );
            ColumnKind::Categorical
        } else {
            base_profile.kind
        };
        columns.push(EvaluableColumn {
            name: name.to_string(),
            kind,
            coerced,
        });
    }

    for column in &current.columns {
        let name = column.name.as_str();
        if is_index(name) {
            continue;
        }
        if is_excluded(name) {
            if baseline.column(name).is_none() {
                dropped.push(dropped_column(name, DropReason::Excluded));
            }
            continue;
        }
        if baseline.column(name).is_none() {
            dropped.push(dropped_column(name, DropReason::MissingFromBaseline));
        }
    }

    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    debug!(
        "reconciled {} evaluable columns, dropped {}",
        columns.len(),
        dropped.len()
    );
    Reconciliation {
        baseline: baseline.select(&names),
        current: current.select(&names),
        columns,
        dropped,
    }
}

fn dropped_column(name: &str, reason: DropReason) -> DroppedColumn {
    DroppedColumn {
        name: name.to_string(),
        reason,
    }
}
