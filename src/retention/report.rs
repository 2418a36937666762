use super::planner::Phase;
use super::session::PrincipalRow;
use super::verifier::VerificationWarning;
use crate::error::SchemaMismatch;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunMode {
    /// Rows were deleted and the transaction committed.
    Live,
    /// Rows were only counted; the transaction was rolled back.
    DryRun,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub step: usize,
    pub phase: Phase,
    pub table: String,
    pub column: String,
    /// Deleted rows in a live run, matching rows in a dry run.
    pub rows: u64,
}

/// Principal table as seen at the start of the run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrincipalCensus {
    pub total: u64,
    pub kept_present: u64,
    pub to_delete: u64,
    /// First few doomed identifiers, sorted.
    pub sample: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub principals: Vec<PrincipalRow>,
    /// Remaining entity rows per tier.
    pub entities: BTreeMap<String, u64>,
    /// Remaining rows per entity content table, declaration order.
    pub content: Vec<(String, u64)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub snapshot: Snapshot,
    pub warnings: Vec<VerificationWarning>,
}

impl Verification {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// What one run did. Built once, handed to the caller, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub schema_version: String,
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub keep: Vec<String>,
    pub census: PrincipalCensus,
    pub skipped: Vec<SchemaMismatch>,
    pub retained: BTreeMap<String, u64>,
    pub membership_fallbacks: Vec<String>,
    pub steps: Vec<StepOutcome>,
    /// Present only for live runs.
    pub verification: Option<Verification>,
}

impl RunReport {
    pub fn total_rows(&self) -> u64 {
        self.steps.iter().map(|step| step.rows).sum()
    }

    /// Rows affected in `table` across all steps.
    pub fn rows_for(&self, table: &str) -> u64 {
        self.steps
            .iter()
            .filter(|step| step.table == table)
            .map(|step| step.rows)
            .sum()
    }

    pub fn warnings(&self) -> &[VerificationWarning] {
        self.verification
            .as_ref()
            .map_or(&[], |verification| verification.warnings.as_slice())
    }
}
