//! Status - scan pass のレポート
//!
//! pass が訪れたすべての upkeep id について 1 件ずつ outcome を持ちます。
//! CLI はこれを JSON として stdout に出力します。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{PassId, TaskOutcome, UpkeepId, UpkeepOutcome};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassCounts {
    pub skipped_inactive: usize,
    pub skipped_not_due: usize,
    pub skipped_not_needed: usize,
    pub skipped_deadline: usize,
    pub executed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassReport {
    pub pass_id: PassId,
    /// Block timestamp the due checks were evaluated against.
    pub scanned_at: DateTime<Utc>,
    pub upkeep_count: u64,
    pub elapsed_ms: u64,
    /// One entry per id in `[0, upkeep_count)`, in id order.
    pub outcomes: Vec<UpkeepOutcome>,
}

impl PassReport {
    pub fn counts(&self) -> PassCounts {
        let mut counts = PassCounts::default();
        for entry in &self.outcomes {
            match entry.outcome {
                TaskOutcome::SkippedInactive => counts.skipped_inactive += 1,
                TaskOutcome::SkippedNotDue { .. } => counts.skipped_not_due += 1,
                TaskOutcome::SkippedNotNeeded => counts.skipped_not_needed += 1,
                TaskOutcome::SkippedDeadline => counts.skipped_deadline += 1,
                TaskOutcome::Executed { .. } => counts.executed += 1,
                TaskOutcome::Failed { .. } => counts.failed += 1,
            }
        }
        counts
    }

    pub fn outcome_of(&self, id: UpkeepId) -> Option<&TaskOutcome> {
        self.outcomes
            .iter()
            .find(|entry| entry.upkeep_id == id)
            .map(|entry| &entry.outcome)
    }

    /// Upkeeps whose failure will not fix itself on the next pass.
    pub fn needs_operator_attention(&self) -> Vec<UpkeepId> {
        self.outcomes
            .iter()
            .filter(|entry| {
                entry
                    .outcome
                    .failure_kind()
                    .is_some_and(|kind| kind.needs_operator_attention())
            })
            .map(|entry| entry.upkeep_id)
            .collect()
    }
}
