use colsync_table::{Cell, Table};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Mode + selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Copy the source value column into the target wherever keys match.
    Update,
    /// Compare only; report matches, mismatches and unmatched keys.
    Audit,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Update => write!(f, "update"),
            Self::Audit => write!(f, "audit"),
        }
    }
}

/// Where written/compared values live in the target table.
///
/// `CreateAfterKey` is the typed form of the original "create new column"
/// sentinel: synthesize a fresh column immediately after the key column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetColumn {
    Existing(String),
    CreateAfterKey,
}

/// The four column references driving a reconciliation.
#[derive(Debug, Clone)]
pub struct Selection {
    pub target_key: String,
    pub target_value: TargetColumn,
    pub source_key: String,
    pub source_value: String,
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// 1-based inclusive range over the target's data rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRange {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ReconOptions {
    /// Restrict the target walk to these rows; rows outside pass through
    /// untouched and uncounted.
    pub row_range: Option<RowRange>,
    /// Update mode only: never overwrite a target cell that already holds
    /// data. The key still counts as found.
    pub skip_if_filled: bool,
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// One audit mismatch, in row encounter order.
#[derive(Debug, Clone, Serialize)]
pub struct MismatchEntry {
    pub key: Cell,
    pub target_value: Cell,
    pub source_value: Cell,
    /// Full snapshot of the target row, aligned with the report's headers.
    pub row: Vec<Cell>,
}

#[derive(Debug, Serialize)]
pub struct UpdateOutcome {
    /// Cells whose value actually changed.
    pub writes: usize,
    /// Source keys never found in the target, first-occurrence order.
    pub not_found_keys: Vec<Cell>,
    /// The rewritten target table, for the caller to persist.
    #[serde(skip_serializing)]
    pub table: Table,
}

#[derive(Debug, Serialize)]
pub struct AuditOutcome {
    pub matches: usize,
    pub mismatches: usize,
    pub not_found_keys: Vec<Cell>,
    pub mismatched: Vec<MismatchEntry>,
    /// Target headers at audit time, for mismatch-row presentation.
    pub headers: Vec<String>,
    pub target_column: String,
    pub source_column: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Update(UpdateOutcome),
    Audit(AuditOutcome),
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub job_name: String,
    pub mode: Mode,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Serialize)]
pub struct ReconReport {
    pub meta: ReconMeta,
    pub outcome: Outcome,
}

impl ReconReport {
    pub fn as_update(&self) -> Option<&UpdateOutcome> {
        match &self.outcome {
            Outcome::Update(u) => Some(u),
            Outcome::Audit(_) => None,
        }
    }

    pub fn as_audit(&self) -> Option<&AuditOutcome> {
        match &self.outcome {
            Outcome::Audit(a) => Some(a),
            Outcome::Update(_) => None,
        }
    }
}
