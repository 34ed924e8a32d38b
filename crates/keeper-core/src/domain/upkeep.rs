//! Upkeep - レジストリが管理する定期タスクのレコード
//!
//! # 不変条件
//! - `id` は登録時に採番され、不変・再利用なし
//! - `interval > 0`
//! - `last_executed` は単調非減少
//! - 物理削除はしない（`active = false` による soft delete）

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::UpkeepId;
use super::primitives::{Address, Wei};

/// A registered recurring task, as stored by the registry.
///
/// Values handed out by `get_upkeep_info` are snapshots: mutating one does
/// not affect the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upkeep {
    pub id: UpkeepId,
    /// Contract exposing the check/execute capability.
    pub target: Address,
    /// Passed unmodified into every check call.
    pub check_data: Vec<u8>,
    pub interval: Duration,
    /// `None` until the first successful execution.
    pub last_executed: Option<DateTime<Utc>>,
    pub active: bool,
    pub balance: Wei,
    pub owner: Address,
    pub registered_at: DateTime<Utc>,
    pub perform_count: u64,
}

impl Upkeep {
    /// Earliest instant at which an execution is valid.
    ///
    /// A never-executed upkeep is due from registration. Returns `None` if
    /// `last_executed + interval` is not representable, i.e. never due.
    pub fn next_due_at(&self) -> Option<DateTime<Utc>> {
        match self.last_executed {
            None => Some(self.registered_at),
            Some(last) => {
                let interval = chrono::Duration::from_std(self.interval).ok()?;
                last.checked_add_signed(interval)
            }
        }
    }

    /// `now >= last_executed + interval`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_due_at().is_some_and(|due| now >= due)
    }
}

/// Result of a target's read-only check call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CheckResult {
    pub needs_execution: bool,
    /// Consumed by the execution when `needs_execution` is set.
    pub perform_data: Vec<u8>,
}

impl CheckResult {
    pub fn needed(perform_data: impl Into<Vec<u8>>) -> Self {
        Self {
            needs_execution: true,
            perform_data: perform_data.into(),
        }
    }

    pub fn not_needed() -> Self {
        Self::default()
    }
}
