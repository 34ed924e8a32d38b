//! UpkeepRegistry - upkeep のライフサイクル状態機械
//!
//! # 状態遷移
//! - `register_upkeep`: 新規作成（active, 残高 = funding）
//! - `perform_upkeep`: `last_executed` 更新 + 残高引き落とし + executor への支払い（1 遷移）
//! - `deactivate` / `reactivate` / `fund` / `withdraw`: owner による管理操作
//!
//! # 原子性
//! 失敗しうるチェックはすべて状態変更の前に行います。
//! エラーを返した操作はレジストリを一切変更しません。

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::due_index::DueIndex;
use crate::domain::{Address, Gas, RegistryError, RegistryEvent, Upkeep, UpkeepId, Wei};
use crate::ports::TargetDirectory;

/// Gas the registry itself spends around a target's execution.
pub const DEFAULT_PERFORM_OVERHEAD_GAS: Gas = 30_000;

/// Process-wide parameters fixed at registry creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    pub minimum_funding: Wei,
    pub perform_overhead_gas: Gas,
}

impl RegistryConfig {
    pub fn new(minimum_funding: Wei) -> Self {
        Self {
            minimum_funding,
            perform_overhead_gas: DEFAULT_PERFORM_OVERHEAD_GAS,
        }
    }
}

/// Block-level context of one `perform_upkeep` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerformContext {
    pub now: DateTime<Utc>,
    pub gas_limit: Gas,
    pub gas_price: Wei,
}

/// Success signal of `perform_upkeep`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerformReceipt {
    pub upkeep_id: UpkeepId,
    pub gas_used: Gas,
    pub payment: Wei,
    pub executed_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct UpkeepRegistry {
    config: RegistryConfig,
    /// Indexed by id. Never shrinks.
    upkeeps: Vec<Upkeep>,
    payments: HashMap<Address, Wei>,
    events: Vec<RegistryEvent>,
    due_index: DueIndex,
}

impl UpkeepRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            upkeeps: Vec::new(),
            payments: HashMap::new(),
            events: Vec::new(),
            due_index: DueIndex::new(),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn register_upkeep(
        &mut self,
        owner: Address,
        target: Address,
        check_data: Vec<u8>,
        interval: Duration,
        funding: Wei,
        now: DateTime<Utc>,
    ) -> Result<UpkeepId, RegistryError> {
        if funding < self.config.minimum_funding {
            return Err(RegistryError::InsufficientFunding {
                provided: funding,
                minimum: self.config.minimum_funding,
            });
        }
        if interval.is_zero() {
            return Err(RegistryError::InvalidInterval);
        }

        let id = UpkeepId::new(self.upkeeps.len() as u64);
        let upkeep = Upkeep {
            id,
            target,
            check_data,
            interval,
            last_executed: None,
            active: true,
            balance: funding,
            owner,
            registered_at: now,
            perform_count: 0,
        };
        if let Some(due_at) = upkeep.next_due_at() {
            self.due_index.insert(id, due_at);
        }
        self.upkeeps.push(upkeep);
        self.events.push(RegistryEvent::UpkeepRegistered {
            id,
            owner,
            target,
            interval,
            funding,
            at: now,
        });
        Ok(id)
    }

    pub fn get_upkeep_info(&self, id: UpkeepId) -> Result<Upkeep, RegistryError> {
        self.record(id).cloned()
    }

    pub fn upkeep_count(&self) -> u64 {
        self.upkeeps.len() as u64
    }

    /// Runs the target's execute capability and settles the cost.
    ///
    /// The balance must cover the worst case (`gas_limit * gas_price`) before
    /// the target runs; the actual cost is debited afterwards.
    pub fn perform_upkeep(
        &mut self,
        id: UpkeepId,
        perform_data: &[u8],
        executor: Address,
        ctx: &PerformContext,
        targets: &dyn TargetDirectory,
    ) -> Result<PerformReceipt, RegistryError> {
        let upkeep = self.record(id)?.clone();
        if !upkeep.active {
            return Err(RegistryError::Inactive(id));
        }
        if !upkeep.is_due(ctx.now) {
            return Err(RegistryError::NotDue {
                id,
                next_due_at: upkeep.next_due_at(),
            });
        }

        let max_payment = Wei::for_gas(ctx.gas_limit, ctx.gas_price);
        if upkeep.balance < max_payment {
            return Err(RegistryError::InsufficientBalance {
                id,
                required: max_payment,
                available: upkeep.balance,
            });
        }

        let overhead = self.config.perform_overhead_gas;
        let budget = ctx
            .gas_limit
            .checked_sub(overhead)
            .ok_or(RegistryError::OutOfGas {
                limit: ctx.gas_limit,
            })?;
        let target =
            targets
                .resolve(&upkeep.target)
                .ok_or_else(|| RegistryError::ExecutionReverted {
                    reason: format!("no code at {}", upkeep.target),
                    gas_used: 0,
                })?;
        let target_gas = target.execute(perform_data, budget).map_err(|revert| {
            RegistryError::ExecutionReverted {
                reason: revert.reason,
                gas_used: revert.gas_used,
            }
        })?;
        if target_gas > budget {
            return Err(RegistryError::OutOfGas {
                limit: ctx.gas_limit,
            });
        }

        let gas_used = target_gas + overhead;
        let payment = Wei::for_gas(gas_used, ctx.gas_price);
        let balance = upkeep
            .balance
            .checked_sub(payment)
            .ok_or(RegistryError::InsufficientBalance {
                id,
                required: payment,
                available: upkeep.balance,
            })?;
        let credited = self
            .executor_payments(executor)
            .checked_add(payment)
            .ok_or(RegistryError::Overflow)?;

        // Commit.
        let record = self.record_mut(id)?;
        let previous_due = record.next_due_at();
        record.balance = balance;
        record.last_executed = Some(ctx.now);
        record.perform_count += 1;
        let next_due = record.next_due_at();

        if let Some(due_at) = previous_due {
            self.due_index.remove(id, due_at);
        }
        if let Some(due_at) = next_due {
            self.due_index.insert(id, due_at);
        }
        self.payments.insert(executor, credited);
        self.events.push(RegistryEvent::UpkeepPerformed {
            id,
            executor,
            gas_used,
            payment,
            at: ctx.now,
        });

        Ok(PerformReceipt {
            upkeep_id: id,
            gas_used,
            payment,
            executed_at: ctx.now,
        })
    }

    /// Soft delete: the record stays, scans skip it.
    pub fn deactivate(
        &mut self,
        id: UpkeepId,
        caller: Address,
        now: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        let record = self.owned_record_mut(id, caller)?;
        if !record.active {
            return Err(RegistryError::Inactive(id));
        }
        record.active = false;
        let due_at = record.next_due_at();

        if let Some(due_at) = due_at {
            self.due_index.remove(id, due_at);
        }
        self.events
            .push(RegistryEvent::UpkeepDeactivated { id, at: now });
        Ok(())
    }

    pub fn reactivate(
        &mut self,
        id: UpkeepId,
        caller: Address,
        now: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        let record = self.owned_record_mut(id, caller)?;
        if record.active {
            return Err(RegistryError::AlreadyActive(id));
        }
        record.active = true;
        let due_at = record.next_due_at();

        if let Some(due_at) = due_at {
            self.due_index.insert(id, due_at);
        }
        self.events
            .push(RegistryEvent::UpkeepReactivated { id, at: now });
        Ok(())
    }

    /// Anyone may top up an upkeep.
    pub fn fund(
        &mut self,
        id: UpkeepId,
        amount: Wei,
        now: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        let record = self.record_mut(id)?;
        record.balance = record
            .balance
            .checked_add(amount)
            .ok_or(RegistryError::Overflow)?;
        self.events
            .push(RegistryEvent::FundsAdded { id, amount, at: now });
        Ok(())
    }

    pub fn withdraw(
        &mut self,
        id: UpkeepId,
        amount: Wei,
        caller: Address,
        now: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        let record = self.owned_record_mut(id, caller)?;
        record.balance =
            record
                .balance
                .checked_sub(amount)
                .ok_or(RegistryError::InsufficientBalance {
                    id,
                    required: amount,
                    available: record.balance,
                })?;
        self.events.push(RegistryEvent::FundsWithdrawn {
            id,
            amount,
            to: caller,
            at: now,
        });
        Ok(())
    }

    /// Active upkeeps due at `now`, earliest due first.
    pub fn due_upkeeps(&self, now: DateTime<Utc>) -> Vec<UpkeepId> {
        self.due_index.due_at(now)
    }

    /// Total reimbursement credited to `executor` so far.
    pub fn executor_payments(&self, executor: Address) -> Wei {
        self.payments.get(&executor).copied().unwrap_or_default()
    }

    pub fn events(&self) -> &[RegistryEvent] {
        &self.events
    }

    pub fn events_for(&self, id: UpkeepId) -> impl Iterator<Item = &RegistryEvent> + '_ {
        self.events.iter().filter(move |e| e.upkeep_id() == id)
    }

    fn record(&self, id: UpkeepId) -> Result<&Upkeep, RegistryError> {
        usize::try_from(id.value())
            .ok()
            .and_then(|index| self.upkeeps.get(index))
            .ok_or(RegistryError::NotFound(id))
    }

    fn record_mut(&mut self, id: UpkeepId) -> Result<&mut Upkeep, RegistryError> {
        usize::try_from(id.value())
            .ok()
            .and_then(|index| self.upkeeps.get_mut(index))
            .ok_or(RegistryError::NotFound(id))
    }

    fn owned_record_mut(
        &mut self,
        id: UpkeepId,
        caller: Address,
    ) -> Result<&mut Upkeep, RegistryError> {
        let record = self.record_mut(id)?;
        if record.owner != caller {
            return Err(RegistryError::NotAuthorized { id, caller });
        }
        Ok(record)
    }
}
