//! EligibilityChecker - target の read-only check を呼び出す
//!
//! 評価の失敗（timeout、revert、decode error、台帳エラー）はすべてここで捕まえて
//! `CheckVerdict::Failed` に変換します。このタスクの今回の cycle は
//! needs_execution = false として扱われ、他のタスクには波及しません。

use std::sync::Arc;
use std::time::Duration;

use crate::domain::Upkeep;
use crate::ports::LedgerClient;

/// Result of checking one upkeep in one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckVerdict {
    Needed { perform_data: Vec<u8> },
    NotNeeded,
    /// `EligibilityCheckFailure`: skip this cycle.
    Failed { reason: String },
}

impl CheckVerdict {
    pub fn needs_execution(&self) -> bool {
        matches!(self, CheckVerdict::Needed { .. })
    }
}

pub struct EligibilityChecker {
    ledger: Arc<dyn LedgerClient>,
    timeout: Duration,
}

impl EligibilityChecker {
    pub fn new(ledger: Arc<dyn LedgerClient>, timeout: Duration) -> Self {
        Self { ledger, timeout }
    }

    pub async fn check(&self, upkeep: &Upkeep) -> CheckVerdict {
        let call = self.ledger.check_upkeep(upkeep.target, &upkeep.check_data);
        let verdict = match tokio::time::timeout(self.timeout, call).await {
            Err(_) => CheckVerdict::Failed {
                reason: format!("check timed out after {:?}", self.timeout),
            },
            Ok(Err(err)) => CheckVerdict::Failed {
                reason: err.to_string(),
            },
            Ok(Ok(result)) if result.needs_execution => CheckVerdict::Needed {
                perform_data: result.perform_data,
            },
            Ok(Ok(_)) => CheckVerdict::NotNeeded,
        };

        if let CheckVerdict::Failed { reason } = &verdict {
            tracing::warn!(
                upkeep_id = %upkeep.id,
                target = %upkeep.target,
                error = %reason,
                "EligibilityCheckFailure"
            );
        }
        verdict
    }
}
