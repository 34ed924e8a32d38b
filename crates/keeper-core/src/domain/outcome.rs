//! Outcome model: per-task results of a scan pass.
//!
//! `ExecutionOutcome` classifies one submitted execution; `TaskOutcome` is the
//! record the scan keeps for every visited upkeep id, whatever happened to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::FailureKind;
use super::ids::{TxHash, UpkeepId};
use super::primitives::{Gas, Wei};

/// Result of one execution attempt, as seen by the keeper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionOutcome {
    /// Included and committed: `last_executed` advanced, balance debited.
    ConfirmedSuccess {
        tx: TxHash,
        gas_used: Gas,
        fee: Wei,
        payment: Option<Wei>,
        executed_at: DateTime<Utc>,
    },
    /// Included but rejected by the target or the registry. Not auto-retried.
    ConfirmedRevert {
        tx: TxHash,
        gas_used: Gas,
        fee: Wei,
        kind: FailureKind,
        reason: String,
    },
    /// Never included. No state change; safe to retry next pass.
    SubmissionFailed { kind: FailureKind, reason: String },
    /// No receipt within the deadline. Neither success nor failure.
    Timeout { tx: TxHash },
}

/// What a scan pass did with one upkeep id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskOutcome {
    SkippedInactive,
    SkippedNotDue {
        next_due_at: Option<DateTime<Utc>>,
    },
    SkippedNotNeeded,
    /// The pass deadline passed before this id was read, checked or submitted.
    SkippedDeadline,
    Executed {
        tx: TxHash,
        gas_used: Gas,
        payment: Option<Wei>,
        executed_at: DateTime<Utc>,
    },
    Failed {
        kind: FailureKind,
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tx: Option<TxHash>,
    },
}

impl TaskOutcome {
    pub fn failed(kind: FailureKind, reason: impl Into<String>) -> Self {
        TaskOutcome::Failed {
            kind,
            reason: reason.into(),
            tx: None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            TaskOutcome::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_executed(&self) -> bool {
        matches!(self, TaskOutcome::Executed { .. })
    }
}

impl From<ExecutionOutcome> for TaskOutcome {
    fn from(outcome: ExecutionOutcome) -> Self {
        match outcome {
            ExecutionOutcome::ConfirmedSuccess {
                tx,
                gas_used,
                payment,
                executed_at,
                ..
            } => TaskOutcome::Executed {
                tx,
                gas_used,
                payment,
                executed_at,
            },
            ExecutionOutcome::ConfirmedRevert { tx, kind, reason, .. } => TaskOutcome::Failed {
                kind,
                reason,
                tx: Some(tx),
            },
            ExecutionOutcome::SubmissionFailed { kind, reason } => TaskOutcome::Failed {
                kind,
                reason,
                tx: None,
            },
            ExecutionOutcome::Timeout { tx } => TaskOutcome::Failed {
                kind: FailureKind::ReceiptTimeout,
                reason: "no receipt within deadline; resolved on a later pass".to_string(),
                tx: Some(tx),
            },
        }
    }
}

/// One entry of a pass's outcome list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpkeepOutcome {
    pub upkeep_id: UpkeepId,
    #[serde(flatten)]
    pub outcome: TaskOutcome,
}
