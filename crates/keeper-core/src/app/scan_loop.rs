//! ScanLoop - 1 回の scan pass
//!
//! # フロー
//! 1. 台帳から block timestamp と `upkeep_count` を読む（失敗は pass 全体の致命的エラー）
//! 2. `[0, count)` の各 id について snapshot を読み、inactive / not due / 残高不足を除外
//! 3. 残りに EligibilityChecker を呼び、needs_execution なら Executor に渡す
//! 4. id ごとに outcome を記録し、個別の失敗に関係なく続行する
//!
//! pass は外部スケジューラから 1 回ずつ起動され、内部で sleep も自己スケジュールもしません。
//! 重複・並行した pass が走っても、レジストリ側の due 判定が二重実行を防ぎます。
//!
//! # 並行度
//! - `check_concurrency == 1`: 参照設計。タスクを 1 件ずつ read → check → execute
//! - `check_concurrency > 1`: check（read-only）だけを並行に行い、
//!   execute は id 順に直列（nonce は NonceAllocator が直列に割り当てる）
//!
//! # Pass deadline
//! 期限を過ぎたら残りの read / check / 未送信の execute を打ち切り、`SkippedDeadline` を記録。
//! 送信済みのトランザクションはキャンセル扱いにしません。

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::Instrument;

use crate::app::checker::{CheckVerdict, EligibilityChecker};
use crate::app::executor::Executor;
use crate::app::status::PassReport;
use crate::domain::{
    FailureKind, PassId, RegistryError, TaskOutcome, Upkeep, UpkeepId, UpkeepOutcome, Wei,
};
use crate::error::KeeperError;
use crate::ports::{LedgerClient, PassIdGenerator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    pub pass_deadline: Option<Duration>,
    /// Upper bound on in-flight eligibility checks.
    pub check_concurrency: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            pass_deadline: None,
            check_concurrency: 1,
        }
    }
}

pub struct ScanLoop {
    ledger: Arc<dyn LedgerClient>,
    checker: Arc<EligibilityChecker>,
    executor: Executor,
    pass_ids: Arc<dyn PassIdGenerator>,
    options: ScanOptions,
}

fn deadline_passed(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

/// What every upkeep in one pass is measured against.
#[derive(Debug, Clone, Copy)]
struct PassContext {
    now: DateTime<Utc>,
    /// Worst-case payment of one execution at this pass's gas price.
    max_payment: Wei,
    deadline: Option<Instant>,
}

impl ScanLoop {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        checker: Arc<EligibilityChecker>,
        executor: Executor,
        pass_ids: Arc<dyn PassIdGenerator>,
        options: ScanOptions,
    ) -> Self {
        Self {
            ledger,
            checker,
            executor,
            pass_ids,
            options,
        }
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Runs one complete pass.
    ///
    /// Fails only when the pass cannot start (block timestamp or upkeep count
    /// unreadable). Per-task failures end up in the report.
    pub async fn run_pass(&self) -> Result<PassReport, KeeperError> {
        let pass_id = self.pass_ids.generate_pass_id();
        let span = tracing::info_span!("scan_pass", pass_id = %pass_id);
        self.run(pass_id).instrument(span).await
    }

    async fn run(&self, pass_id: PassId) -> Result<PassReport, KeeperError> {
        let started = Instant::now();
        let deadline = self.options.pass_deadline.map(|d| started + d);

        let now = self
            .ledger
            .block_timestamp()
            .await
            .map_err(KeeperError::BlockTimestamp)?;
        let count = self
            .ledger
            .upkeep_count()
            .await
            .map_err(KeeperError::UpkeepCount)?;
        let gas_price = self
            .ledger
            .gas_price()
            .await
            .map_err(KeeperError::GasPrice)?;
        let ctx = PassContext {
            now,
            max_payment: Wei::for_gas(self.executor.gas_ceiling(), gas_price),
            deadline,
        };
        tracing::info!(
            upkeep_count = count,
            scanned_at = %now,
            gas_price = %gas_price,
            "scan pass started"
        );

        let outcomes = if self.options.check_concurrency <= 1 {
            self.scan_sequential(count, ctx).await
        } else {
            self.scan_with_parallel_checks(count, ctx).await
        };

        let report = PassReport {
            pass_id,
            scanned_at: now,
            upkeep_count: count,
            elapsed_ms: started.elapsed().as_millis() as u64,
            outcomes,
        };
        let counts = report.counts();
        tracing::info!(
            executed = counts.executed,
            failed = counts.failed,
            skipped_not_due = counts.skipped_not_due,
            skipped_not_needed = counts.skipped_not_needed,
            skipped_inactive = counts.skipped_inactive,
            skipped_deadline = counts.skipped_deadline,
            elapsed_ms = report.elapsed_ms,
            "scan pass finished"
        );
        Ok(report)
    }

    async fn scan_sequential(&self, count: u64, ctx: PassContext) -> Vec<UpkeepOutcome> {
        let mut outcomes = Vec::with_capacity(count as usize);
        for raw in 0..count {
            let id = UpkeepId::new(raw);
            let outcome = match self.screen(id, &ctx).await {
                Err(skipped) => skipped,
                Ok(upkeep) => match self.check_before(&upkeep, ctx.deadline).await {
                    Some(verdict) => self.settle(&upkeep, verdict, ctx.deadline).await,
                    None => TaskOutcome::SkippedDeadline,
                },
            };
            outcomes.push(record(id, outcome));
        }
        outcomes
    }

    async fn scan_with_parallel_checks(&self, count: u64, ctx: PassContext) -> Vec<UpkeepOutcome> {
        let deadline = ctx.deadline;
        let mut by_id = BTreeMap::new();
        let mut candidates = Vec::new();
        for raw in 0..count {
            let id = UpkeepId::new(raw);
            match self.screen(id, &ctx).await {
                Err(skipped) => {
                    by_id.insert(id, skipped);
                }
                Ok(upkeep) => candidates.push(upkeep),
            }
        }

        let mut verdicts = self.check_all(&candidates, deadline).await;

        // Submissions stay serialized, in id order.
        for upkeep in &candidates {
            let outcome = match verdicts.remove(&upkeep.id) {
                Some(verdict) => self.settle(upkeep, verdict, deadline).await,
                None if deadline_passed(deadline) => TaskOutcome::SkippedDeadline,
                None => TaskOutcome::failed(
                    FailureKind::EligibilityCheckFailure,
                    "eligibility check task aborted",
                ),
            };
            by_id.insert(upkeep.id, outcome);
        }

        by_id
            .into_iter()
            .map(|(id, outcome)| record(id, outcome))
            .collect()
    }

    /// Reads the snapshot and filters out inactive, not-due and underfunded
    /// upkeeps. An underfunded perform would only revert at the keeper's cost.
    async fn screen(&self, id: UpkeepId, ctx: &PassContext) -> Result<Upkeep, TaskOutcome> {
        if deadline_passed(ctx.deadline) {
            return Err(TaskOutcome::SkippedDeadline);
        }
        let read = self.ledger.get_upkeep_info(id);
        let read = match ctx.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, read)
                .await
                .map_err(|_| TaskOutcome::SkippedDeadline)?,
            None => read.await,
        };
        let upkeep = read.map_err(|err| TaskOutcome::failed(err.read_kind(), err.to_string()))?;

        if !upkeep.active {
            return Err(TaskOutcome::SkippedInactive);
        }
        if !upkeep.is_due(ctx.now) {
            return Err(TaskOutcome::SkippedNotDue {
                next_due_at: upkeep.next_due_at(),
            });
        }
        if upkeep.balance < ctx.max_payment {
            let err = RegistryError::InsufficientBalance {
                id,
                required: ctx.max_payment,
                available: upkeep.balance,
            };
            return Err(TaskOutcome::failed(err.kind(), err.to_string()));
        }
        Ok(upkeep)
    }

    /// `None` when the deadline passed first.
    async fn check_before(&self, upkeep: &Upkeep, deadline: Option<Instant>) -> Option<CheckVerdict> {
        match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, self.checker.check(upkeep))
                .await
                .ok(),
            None => Some(self.checker.check(upkeep).await),
        }
    }

    async fn check_all(
        &self,
        candidates: &[Upkeep],
        deadline: Option<Instant>,
    ) -> HashMap<UpkeepId, CheckVerdict> {
        let permits = Arc::new(Semaphore::new(self.options.check_concurrency));
        let mut checks = JoinSet::new();
        for upkeep in candidates {
            let checker = Arc::clone(&self.checker);
            let permits = Arc::clone(&permits);
            let upkeep = upkeep.clone();
            checks.spawn(
                async move {
                    let _permit = permits.acquire_owned().await.ok();
                    let verdict = checker.check(&upkeep).await;
                    (upkeep.id, verdict)
                }
                .in_current_span(),
            );
        }

        let mut verdicts = HashMap::with_capacity(candidates.len());
        loop {
            let joined = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, checks.join_next()).await
                {
                    Ok(joined) => joined,
                    Err(_) => {
                        // Reads only; aborting them has no side effects.
                        checks.abort_all();
                        break;
                    }
                },
                None => checks.join_next().await,
            };
            match joined {
                None => break,
                Some(Ok((id, verdict))) => {
                    verdicts.insert(id, verdict);
                }
                Some(Err(err)) => {
                    tracing::warn!(error = %err, "eligibility check task failed");
                }
            }
        }
        verdicts
    }

    async fn settle(
        &self,
        upkeep: &Upkeep,
        verdict: CheckVerdict,
        deadline: Option<Instant>,
    ) -> TaskOutcome {
        match verdict {
            CheckVerdict::NotNeeded => TaskOutcome::SkippedNotNeeded,
            CheckVerdict::Failed { reason } => {
                TaskOutcome::failed(FailureKind::EligibilityCheckFailure, reason)
            }
            CheckVerdict::Needed { .. } if deadline_passed(deadline) => {
                TaskOutcome::SkippedDeadline
            }
            CheckVerdict::Needed { perform_data } => {
                self.executor.execute(upkeep.id, perform_data).await.into()
            }
        }
    }
}

fn record(upkeep_id: UpkeepId, outcome: TaskOutcome) -> UpkeepOutcome {
    match &outcome {
        TaskOutcome::Executed { tx, gas_used, .. } => {
            tracing::info!(upkeep_id = %upkeep_id, tx = %tx, gas_used, "upkeep executed");
        }
        TaskOutcome::Failed { kind, reason, .. } => {
            tracing::warn!(upkeep_id = %upkeep_id, kind = ?kind, reason = %reason, "upkeep failed");
        }
        skipped => {
            tracing::debug!(upkeep_id = %upkeep_id, outcome = ?skipped, "upkeep skipped");
        }
    }
    UpkeepOutcome { upkeep_id, outcome }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::builder::KeeperBuilder;
    use crate::domain::{
        Address, CheckResult, ExecutionOutcome, LedgerError, Nonce, PerformTransaction, Receipt,
        TxHash,
    };
    use crate::impls::{InMemoryLedger, ScriptedTarget};
    use crate::ports::FixedClock;
    use crate::registry::RegistryConfig;
    use async_trait::async_trait;
    use chrono::TimeZone;

    const OWNER: Address = Address::from_bytes([0x01; 20]);
    const SIGNER: Address = Address::from_bytes([0x02; 20]);
    const FUNDING: Wei = Wei::new(100_000_000_000_000_000);

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    struct Harness {
        ledger: Arc<InMemoryLedger>,
        clock: Arc<FixedClock>,
        targets: Vec<Arc<ScriptedTarget>>,
    }

    impl Harness {
        /// `n` upkeeps, each with its own target, interval 300s.
        async fn new(n: u64) -> Self {
            let clock = Arc::new(FixedClock::new(t0()));
            let ledger = Arc::new(InMemoryLedger::new(
                RegistryConfig::new(Wei::new(10_000_000_000_000)),
                SIGNER,
                clock.clone(),
            ));
            let mut targets = Vec::new();
            for i in 0..n {
                let address = Address::from_low_u64(0x1000 + i);
                let target = Arc::new(ScriptedTarget::new(40_000));
                ledger.deploy_target(address, target.clone()).await;
                ledger
                    .register_upkeep(OWNER, address, vec![i as u8], Duration::from_secs(300), FUNDING)
                    .await
                    .unwrap();
                targets.push(target);
            }
            Self {
                ledger,
                clock,
                targets,
            }
        }

        fn keeper(&self) -> KeeperBuilder {
            KeeperBuilder::new(self.ledger.clone())
                .receipt_timeout(Duration::from_millis(50))
                .check_timeout(Duration::from_millis(50))
        }

        fn advance(&self, secs: u64) {
            self.clock.advance(Duration::from_secs(secs));
        }
    }

    #[tokio::test]
    async fn executes_every_due_upkeep() {
        let h = Harness::new(3).await;
        let scan = h.keeper().build().unwrap();

        let report = scan.run_pass().await.unwrap();

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.counts().executed, 3);
        for target in &h.targets {
            assert_eq!(target.execute_calls(), 1);
        }
    }

    #[tokio::test]
    async fn interval_boundary_scenario() {
        let h = Harness::new(1).await;
        let scan = h.keeper().build().unwrap();
        let id = UpkeepId::new(0);

        // First execution at T.
        scan.run_pass().await.unwrap();
        let t = h.ledger.get_upkeep_info(id).await.unwrap().last_executed.unwrap();
        assert_eq!(t, t0());

        h.advance(299);
        let report = scan.run_pass().await.unwrap();
        assert!(matches!(
            report.outcome_of(id),
            Some(TaskOutcome::SkippedNotDue { next_due_at: Some(due) }) if *due == t + chrono::Duration::seconds(300)
        ));
        assert_eq!(h.targets[0].check_calls(), 1);

        h.advance(1);
        let report = scan.run_pass().await.unwrap();
        assert!(report.outcome_of(id).is_some_and(TaskOutcome::is_executed));
        let info = h.ledger.get_upkeep_info(id).await.unwrap();
        assert_eq!(info.last_executed, Some(t + chrono::Duration::seconds(300)));
        assert_eq!(info.perform_count, 2);
    }

    #[tokio::test]
    async fn failing_check_does_not_stop_siblings() {
        let h = Harness::new(3).await;
        h.targets[1].set_check_reverts(true);
        let scan = h.keeper().build().unwrap();

        let report = scan.run_pass().await.unwrap();

        assert_eq!(report.outcomes.len(), 3);
        assert!(report.outcome_of(UpkeepId::new(0)).is_some_and(TaskOutcome::is_executed));
        assert_eq!(
            report.outcome_of(UpkeepId::new(1)).and_then(TaskOutcome::failure_kind),
            Some(FailureKind::EligibilityCheckFailure)
        );
        assert!(report.outcome_of(UpkeepId::new(2)).is_some_and(TaskOutcome::is_executed));
        assert_eq!(h.targets[1].execute_calls(), 0);
    }

    #[tokio::test]
    async fn failing_execution_does_not_stop_siblings() {
        let h = Harness::new(3).await;
        h.targets[0].set_execute_reverts(true);
        let scan = h.keeper().build().unwrap();

        let report = scan.run_pass().await.unwrap();

        assert_eq!(
            report.outcome_of(UpkeepId::new(0)).and_then(TaskOutcome::failure_kind),
            Some(FailureKind::ExecutionRevert)
        );
        assert_eq!(report.counts().executed, 2);
        assert_eq!(report.needs_operator_attention(), vec![UpkeepId::new(0)]);
    }

    #[tokio::test]
    async fn inactive_upkeeps_are_never_checked() {
        let h = Harness::new(2).await;
        h.ledger.deactivate(UpkeepId::new(0), OWNER).await.unwrap();
        let scan = h.keeper().build().unwrap();

        let report = scan.run_pass().await.unwrap();

        assert_eq!(report.outcome_of(UpkeepId::new(0)), Some(&TaskOutcome::SkippedInactive));
        assert_eq!(h.targets[0].check_calls(), 0);
        assert_eq!(h.targets[1].execute_calls(), 1);
    }

    #[tokio::test]
    async fn not_needed_upkeeps_are_never_submitted() {
        let h = Harness::new(1).await;
        h.targets[0].set_needs_execution(false);
        let scan = h.keeper().build().unwrap();

        let report = scan.run_pass().await.unwrap();

        assert_eq!(report.outcome_of(UpkeepId::new(0)), Some(&TaskOutcome::SkippedNotNeeded));
        assert!(h.ledger.submitted_transactions().await.is_empty());
    }

    #[tokio::test]
    async fn exceeded_ceiling_reverts_without_advancing() {
        let h = Harness::new(1).await;
        h.targets[0].set_execute_gas(2_000_000);
        let scan = h.keeper().gas_ceiling(100_000).build().unwrap();
        let id = UpkeepId::new(0);
        let before = h.ledger.get_upkeep_info(id).await.unwrap();

        let report = scan.run_pass().await.unwrap();

        assert_eq!(
            report.outcome_of(id).and_then(TaskOutcome::failure_kind),
            Some(FailureKind::ExecutionRevert)
        );
        let after = h.ledger.get_upkeep_info(id).await.unwrap();
        assert_eq!(after.last_executed, None);
        // A revert rolls back the whole transaction: the keeper pays the fee, not the upkeep.
        assert_eq!(after.balance, before.balance);
        assert!(h.ledger.fees_paid(SIGNER).await > Wei::ZERO);
    }

    #[tokio::test]
    async fn timeout_is_reconciled_on_the_next_pass() {
        let h = Harness::new(1).await;
        h.ledger.withhold_receipts(true).await;
        let scan = h.keeper().build().unwrap();
        let id = UpkeepId::new(0);

        let report = scan.run_pass().await.unwrap();
        assert_eq!(
            report.outcome_of(id).and_then(TaskOutcome::failure_kind),
            Some(FailureKind::ReceiptTimeout)
        );

        // The registry shows it went through; nothing is resubmitted.
        h.ledger.withhold_receipts(false).await;
        let report = scan.run_pass().await.unwrap();
        assert!(matches!(report.outcome_of(id), Some(TaskOutcome::SkippedNotDue { .. })));
        assert_eq!(h.ledger.submitted_transactions().await.len(), 1);
    }

    #[tokio::test]
    async fn submission_failure_is_retried_next_pass() {
        let h = Harness::new(2).await;
        h.ledger.reject_next_submissions(1).await;
        let scan = h.keeper().build().unwrap();

        let report = scan.run_pass().await.unwrap();
        assert_eq!(
            report.outcome_of(UpkeepId::new(0)).and_then(TaskOutcome::failure_kind),
            Some(FailureKind::ExecutionSubmissionFailure)
        );
        assert!(report.outcome_of(UpkeepId::new(1)).is_some_and(TaskOutcome::is_executed));

        let report = scan.run_pass().await.unwrap();
        assert!(report.outcome_of(UpkeepId::new(0)).is_some_and(TaskOutcome::is_executed));

        let nonces: Vec<_> = h
            .ledger
            .submitted_transactions()
            .await
            .iter()
            .map(|tx| tx.nonce.0)
            .collect();
        assert_eq!(nonces, vec![0, 1]);
    }

    #[tokio::test]
    async fn unreadable_count_is_fatal() {
        let h = Harness::new(1).await;
        h.ledger.set_unavailable(true).await;
        let scan = h.keeper().build().unwrap();

        let err = scan.run_pass().await.unwrap_err();
        assert!(matches!(err, KeeperError::BlockTimestamp(_) | KeeperError::UpkeepCount(_)));
    }

    #[tokio::test]
    async fn overlapping_passes_never_double_execute() {
        let h = Harness::new(3).await;
        let scan = h.keeper().build().unwrap();

        let (a, b) = tokio::join!(scan.run_pass(), scan.run_pass());
        let (a, b) = (a.unwrap(), b.unwrap());

        for target in &h.targets {
            assert_eq!(target.execute_calls(), 1);
        }
        assert_eq!(a.counts().executed + b.counts().executed, 3);
    }

    #[tokio::test]
    async fn parallel_checks_keep_submissions_serialized() {
        let h = Harness::new(5).await;
        h.targets[2].set_check_reverts(true);
        h.targets[3].set_needs_execution(false);
        let scan = h.keeper().check_concurrency(4).build().unwrap();

        let report = scan.run_pass().await.unwrap();

        let ids: Vec<_> = report.outcomes.iter().map(|o| o.upkeep_id.value()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(report.counts().executed, 3);
        assert_eq!(report.counts().skipped_not_needed, 1);
        assert_eq!(report.counts().failed, 1);

        let submitted = h.ledger.submitted_transactions().await;
        let order: Vec<_> = submitted.iter().map(|tx| (tx.upkeep_id.value(), tx.nonce.0)).collect();
        assert_eq!(order, vec![(0, 0), (1, 1), (4, 2)]);
    }

    #[tokio::test]
    async fn expired_deadline_skips_without_side_effects() {
        let h = Harness::new(2).await;
        let scan = h.keeper().pass_deadline(Duration::ZERO).build().unwrap();

        let report = scan.run_pass().await.unwrap();

        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.counts().skipped_deadline, 2);
        assert!(h.ledger.submitted_transactions().await.is_empty());
        assert_eq!(h.targets[0].check_calls(), 0);
    }

    #[tokio::test]
    async fn pass_report_serializes_for_the_cli() {
        let h = Harness::new(1).await;
        let report = h.keeper().build().unwrap().run_pass().await.unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["upkeep_count"], 1);
        assert_eq!(json["outcomes"][0]["outcome"], "EXECUTED");
    }

    #[tokio::test]
    async fn executor_outcome_kinds_map_to_task_outcomes() {
        // Guard against a silently changed conversion.
        let outcome: TaskOutcome = ExecutionOutcome::SubmissionFailed {
            kind: FailureKind::ExecutionSubmissionFailure,
            reason: "x".into(),
        }
        .into();
        assert_eq!(outcome.failure_kind(), Some(FailureKind::ExecutionSubmissionFailure));
    }

    /// Wraps the in-memory ledger with slow check calls and late receipts.
    struct SlowLedger {
        inner: Arc<InMemoryLedger>,
        slow_check: Option<Address>,
        receipt_delay: Duration,
    }

    impl SlowLedger {
        fn new(inner: Arc<InMemoryLedger>) -> Self {
            Self {
                inner,
                slow_check: None,
                receipt_delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl LedgerClient for SlowLedger {
        fn registry_address(&self) -> Address {
            self.inner.registry_address()
        }
        fn signer_address(&self) -> Address {
            self.inner.signer_address()
        }
        async fn gas_price(&self) -> Result<Wei, LedgerError> {
            self.inner.gas_price().await
        }
        async fn block_timestamp(&self) -> Result<DateTime<Utc>, LedgerError> {
            self.inner.block_timestamp().await
        }
        async fn upkeep_count(&self) -> Result<u64, LedgerError> {
            self.inner.upkeep_count().await
        }
        async fn get_upkeep_info(&self, id: UpkeepId) -> Result<Upkeep, LedgerError> {
            self.inner.get_upkeep_info(id).await
        }
        async fn check_upkeep(
            &self,
            target: Address,
            check_data: &[u8],
        ) -> Result<CheckResult, LedgerError> {
            if self.slow_check == Some(target) {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            self.inner.check_upkeep(target, check_data).await
        }
        async fn pending_nonce(&self, signer: Address) -> Result<Nonce, LedgerError> {
            self.inner.pending_nonce(signer).await
        }
        async fn submit_perform(&self, tx: PerformTransaction) -> Result<TxHash, LedgerError> {
            self.inner.submit_perform(tx).await
        }
        async fn await_receipt(&self, tx: TxHash) -> Result<Receipt, LedgerError> {
            tokio::time::sleep(self.receipt_delay).await;
            self.inner.await_receipt(tx).await
        }
    }

    #[tokio::test]
    async fn underfunded_upkeep_is_reported_without_submitting() {
        let h = Harness::new(1).await;
        let poor = Address::from_low_u64(0x2000);
        let target = Arc::new(ScriptedTarget::new(40_000));
        h.ledger.deploy_target(poor, target.clone()).await;
        // Registration floor, far below 500_000 gas at 1 gwei.
        let id = h
            .ledger
            .register_upkeep(OWNER, poor, vec![], Duration::from_secs(300), Wei::new(10_000_000_000_000))
            .await
            .unwrap();
        let scan = h.keeper().build().unwrap();

        let report = scan.run_pass().await.unwrap();

        assert_eq!(
            report.outcome_of(id).and_then(TaskOutcome::failure_kind),
            Some(FailureKind::InsufficientBalance)
        );
        assert_eq!(report.needs_operator_attention(), vec![id]);
        assert_eq!(target.check_calls(), 0);
        let submitted = h.ledger.submitted_transactions().await;
        assert!(submitted.iter().all(|tx| tx.upkeep_id != id));

        // Once topped up, the next pass runs it.
        h.ledger.fund(id, FUNDING).await.unwrap();
        let report = scan.run_pass().await.unwrap();
        assert!(report.outcome_of(id).is_some_and(TaskOutcome::is_executed));
    }

    #[tokio::test]
    async fn deadline_aborts_hanging_parallel_checks() {
        let h = Harness::new(3).await;
        let mut slow = SlowLedger::new(h.ledger.clone());
        slow.slow_check = Some(Address::from_low_u64(0x1001));
        let scan = KeeperBuilder::new(Arc::new(slow))
            .check_timeout(Duration::from_secs(60))
            .receipt_timeout(Duration::from_millis(50))
            .check_concurrency(3)
            .pass_deadline(Duration::from_millis(200))
            .build()
            .unwrap();

        let report = tokio::time::timeout(Duration::from_secs(10), scan.run_pass())
            .await
            .expect("pass must end at its deadline")
            .unwrap();

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.counts().skipped_deadline, 3);
        // The fast checks ran; the hanging one was aborted before reaching the target.
        assert_eq!(h.targets[0].check_calls(), 1);
        assert_eq!(h.targets[1].check_calls(), 0);
        assert!(h.ledger.submitted_transactions().await.is_empty());
    }

    #[tokio::test]
    async fn submitted_transaction_outlives_the_deadline() {
        let h = Harness::new(2).await;
        let mut slow = SlowLedger::new(h.ledger.clone());
        slow.receipt_delay = Duration::from_millis(300);
        let scan = KeeperBuilder::new(Arc::new(slow))
            .check_timeout(Duration::from_secs(5))
            .receipt_timeout(Duration::from_secs(5))
            .pass_deadline(Duration::from_millis(100))
            .build()
            .unwrap();

        let report = scan.run_pass().await.unwrap();

        assert!(report.outcome_of(UpkeepId::new(0)).is_some_and(TaskOutcome::is_executed));
        assert_eq!(report.outcome_of(UpkeepId::new(1)), Some(&TaskOutcome::SkippedDeadline));
        assert_eq!(h.ledger.submitted_transactions().await.len(), 1);
    }

    #[tokio::test]
    async fn receipt_timeout_past_the_deadline_is_not_a_skip() {
        let h = Harness::new(1).await;
        h.ledger.withhold_receipts(true).await;
        let scan = h
            .keeper()
            .receipt_timeout(Duration::from_millis(300))
            .pass_deadline(Duration::from_millis(50))
            .build()
            .unwrap();

        let report = scan.run_pass().await.unwrap();

        assert_eq!(
            report.outcome_of(UpkeepId::new(0)).and_then(TaskOutcome::failure_kind),
            Some(FailureKind::ReceiptTimeout)
        );
        assert_eq!(h.ledger.submitted_transactions().await.len(), 1);
    }
}
