//! UpkeepTarget port - タスク側の check/execute capability
//!
//! 登録されたタスクは 2 メソッドの capability として扱います。
//! バリエーションは実装側（call-site）にあり、継承は使いません。

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{Address, CheckResult, Gas};

/// A revert raised by a target, with the gas it burned before reverting.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct TargetRevert {
    pub reason: String,
    pub gas_used: Gas,
}

impl TargetRevert {
    pub fn new(reason: impl Into<String>, gas_used: Gas) -> Self {
        Self {
            reason: reason.into(),
            gas_used,
        }
    }
}

/// Capability exposed by a task's contract.
///
/// `check` must be side-effect free. `execute` reports the gas it consumed;
/// the registry decides whether that fits in the budget.
pub trait UpkeepTarget: Send + Sync {
    fn check(&self, check_data: &[u8]) -> Result<CheckResult, TargetRevert>;

    fn execute(&self, perform_data: &[u8], gas_budget: Gas) -> Result<Gas, TargetRevert>;
}

/// Resolves a target address to the code deployed there.
pub trait TargetDirectory {
    fn resolve(&self, address: &Address) -> Option<Arc<dyn UpkeepTarget>>;
}

impl TargetDirectory for HashMap<Address, Arc<dyn UpkeepTarget>> {
    fn resolve(&self, address: &Address) -> Option<Arc<dyn UpkeepTarget>> {
        self.get(address).cloned()
    }
}
