//! UpkeepTarget implementations for local runs and tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::domain::{CheckResult, Gas};
use crate::ports::{TargetRevert, UpkeepTarget};

/// A counter that wants to be bumped every interval.
///
/// `check` always asks for execution and echoes `check_data` as perform data;
/// `execute` increments the counter.
#[derive(Debug, Default)]
pub struct SimpleCounter {
    count: AtomicU64,
}

impl SimpleCounter {
    pub const EXECUTE_GAS: Gas = 26_000;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }
}

impl UpkeepTarget for SimpleCounter {
    fn check(&self, check_data: &[u8]) -> Result<CheckResult, TargetRevert> {
        Ok(CheckResult::needed(check_data))
    }

    fn execute(&self, _perform_data: &[u8], gas_budget: Gas) -> Result<Gas, TargetRevert> {
        if gas_budget < Self::EXECUTE_GAS {
            return Err(TargetRevert::new("out of gas", gas_budget));
        }
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(Self::EXECUTE_GAS)
    }
}

/// A target whose answers are set by the test, counting every call.
#[derive(Debug)]
pub struct ScriptedTarget {
    needs_execution: AtomicBool,
    check_reverts: AtomicBool,
    execute_reverts: AtomicBool,
    execute_gas: AtomicU64,
    check_calls: AtomicU64,
    execute_calls: AtomicU64,
    last_perform_data: Mutex<Vec<u8>>,
}

impl ScriptedTarget {
    /// Needs execution, consumes `execute_gas` per execution.
    pub fn new(execute_gas: Gas) -> Self {
        Self {
            needs_execution: AtomicBool::new(true),
            check_reverts: AtomicBool::new(false),
            execute_reverts: AtomicBool::new(false),
            execute_gas: AtomicU64::new(execute_gas),
            check_calls: AtomicU64::new(0),
            execute_calls: AtomicU64::new(0),
            last_perform_data: Mutex::new(Vec::new()),
        }
    }

    pub fn set_needs_execution(&self, needs: bool) {
        self.needs_execution.store(needs, Ordering::SeqCst);
    }

    pub fn set_check_reverts(&self, reverts: bool) {
        self.check_reverts.store(reverts, Ordering::SeqCst);
    }

    pub fn set_execute_reverts(&self, reverts: bool) {
        self.execute_reverts.store(reverts, Ordering::SeqCst);
    }

    pub fn set_execute_gas(&self, gas: Gas) {
        self.execute_gas.store(gas, Ordering::SeqCst);
    }

    pub fn check_calls(&self) -> u64 {
        self.check_calls.load(Ordering::SeqCst)
    }

    pub fn execute_calls(&self) -> u64 {
        self.execute_calls.load(Ordering::SeqCst)
    }

    pub fn last_perform_data(&self) -> Vec<u8> {
        self.last_perform_data
            .lock()
            .map(|data| data.clone())
            .unwrap_or_default()
    }
}

impl UpkeepTarget for ScriptedTarget {
    fn check(&self, check_data: &[u8]) -> Result<CheckResult, TargetRevert> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        if self.check_reverts.load(Ordering::SeqCst) {
            return Err(TargetRevert::new("check reverted", 0));
        }
        if self.needs_execution.load(Ordering::SeqCst) {
            Ok(CheckResult::needed(check_data))
        } else {
            Ok(CheckResult::not_needed())
        }
    }

    fn execute(&self, perform_data: &[u8], _gas_budget: Gas) -> Result<Gas, TargetRevert> {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_perform_data.lock() {
            *last = perform_data.to_vec();
        }
        let gas = self.execute_gas.load(Ordering::SeqCst);
        if self.execute_reverts.load(Ordering::SeqCst) {
            return Err(TargetRevert::new("execute reverted", gas));
        }
        Ok(gas)
    }
}
