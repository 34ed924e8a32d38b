//! Errors - エラー型と分類
//!
//! # 分類
//! 各タスク単位のエラーは `FailureKind` に分類され、pass の outcome list に記録されます。
//! - retryable: 次の pass で自然に再試行される（check 失敗、submission 失敗）
//! - operator attention: 自動リトライしない（revert、残高不足）
//! - ambiguous: receipt timeout（次の pass でレジストリを読み直して解決）

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{TxHash, UpkeepId};
use super::primitives::{Address, Gas, Wei};

/// Operational classification of a per-task failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    ValidationError,
    EligibilityCheckFailure,
    ExecutionSubmissionFailure,
    ExecutionRevert,
    InsufficientFunding,
    InsufficientBalance,
    ReceiptTimeout,
    NotAuthorized,
    NotFound,
    NotDue,
    Inactive,
    SnapshotReadFailure,
}

impl FailureKind {
    /// The next pass retries on its own; no operator action needed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FailureKind::EligibilityCheckFailure
                | FailureKind::ExecutionSubmissionFailure
                | FailureKind::ReceiptTimeout
                | FailureKind::SnapshotReadFailure
                | FailureKind::NotDue
        )
    }

    pub fn needs_operator_attention(&self) -> bool {
        matches!(
            self,
            FailureKind::ExecutionRevert
                | FailureKind::InsufficientBalance
                | FailureKind::InsufficientFunding
        )
    }
}

/// Registry precondition and execution failures.
///
/// Every variant leaves the registry unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("{0} not found")]
    NotFound(UpkeepId),

    #[error("{0} is inactive")]
    Inactive(UpkeepId),

    #[error("{0} is already active")]
    AlreadyActive(UpkeepId),

    #[error("{id} is not due until {next_due_at:?}")]
    NotDue {
        id: UpkeepId,
        next_due_at: Option<DateTime<Utc>>,
    },

    #[error("funding {provided} is below the minimum of {minimum}")]
    InsufficientFunding { provided: Wei, minimum: Wei },

    #[error("interval must be positive")]
    InvalidInterval,

    #[error("{id} balance {available} cannot cover {required}")]
    InsufficientBalance {
        id: UpkeepId,
        required: Wei,
        available: Wei,
    },

    #[error("{caller} is not the owner of {id}")]
    NotAuthorized { id: UpkeepId, caller: Address },

    #[error("target execution reverted: {reason}")]
    ExecutionReverted { reason: String, gas_used: Gas },

    #[error("target execution exceeded the gas limit of {limit}")]
    OutOfGas { limit: Gas },

    #[error("amount overflow")]
    Overflow,
}

impl RegistryError {
    pub fn kind(&self) -> FailureKind {
        match self {
            RegistryError::NotFound(_) => FailureKind::NotFound,
            RegistryError::Inactive(_) | RegistryError::AlreadyActive(_) => FailureKind::Inactive,
            RegistryError::NotDue { .. } => FailureKind::NotDue,
            RegistryError::InsufficientFunding { .. } => FailureKind::InsufficientFunding,
            RegistryError::InvalidInterval | RegistryError::Overflow => {
                FailureKind::ValidationError
            }
            RegistryError::InsufficientBalance { .. } => FailureKind::InsufficientBalance,
            RegistryError::NotAuthorized { .. } => FailureKind::NotAuthorized,
            RegistryError::ExecutionReverted { .. } | RegistryError::OutOfGas { .. } => {
                FailureKind::ExecutionRevert
            }
        }
    }
}

/// Ledger client failures (reads, submissions, receipts).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("read-only call reverted: {reason}")]
    CallReverted { reason: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("transaction rejected: {0}")]
    Submission(String),

    #[error("nonce mismatch: expected {expected}, got {got}")]
    NonceMismatch { expected: u64, got: u64 },

    #[error("unknown transaction {0}")]
    UnknownTransaction(TxHash),
}

impl LedgerError {
    /// Classification of a failed read. Relayed registry rejections keep
    /// their own kind.
    pub fn read_kind(&self) -> FailureKind {
        match self {
            LedgerError::Registry(err) => err.kind(),
            LedgerError::CallReverted { .. } => FailureKind::EligibilityCheckFailure,
            _ => FailureKind::SnapshotReadFailure,
        }
    }

    /// Classification of a failed submission. Nothing was included.
    pub fn submission_kind(&self) -> FailureKind {
        match self {
            LedgerError::Registry(err) => err.kind(),
            _ => FailureKind::ExecutionSubmissionFailure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverts_need_operator_attention() {
        let err = RegistryError::OutOfGas { limit: 10 };
        assert_eq!(err.kind(), FailureKind::ExecutionRevert);
        assert!(err.kind().needs_operator_attention());
        assert!(!err.kind().is_retryable());
    }

    #[test]
    fn transient_failures_are_retryable() {
        assert!(FailureKind::ExecutionSubmissionFailure.is_retryable());
        assert!(FailureKind::EligibilityCheckFailure.is_retryable());
        assert!(FailureKind::ReceiptTimeout.is_retryable());
    }

    #[test]
    fn ledger_errors_keep_registry_kinds() {
        let relayed = LedgerError::from(RegistryError::NotFound(UpkeepId::new(4)));
        assert_eq!(relayed.read_kind(), FailureKind::NotFound);
        assert_eq!(relayed.submission_kind(), FailureKind::NotFound);

        let down = LedgerError::Unavailable("connection refused".into());
        assert_eq!(down.read_kind(), FailureKind::SnapshotReadFailure);
        assert_eq!(down.submission_kind(), FailureKind::ExecutionSubmissionFailure);

        let nonce = LedgerError::NonceMismatch { expected: 1, got: 0 };
        assert!(nonce.submission_kind().is_retryable());
    }

    #[test]
    fn error_messages_name_the_upkeep() {
        let err = RegistryError::NotAuthorized {
            id: UpkeepId::new(3),
            caller: Address::from_low_u64(9),
        };
        assert!(err.to_string().contains("upkeep-3"));
    }
}
