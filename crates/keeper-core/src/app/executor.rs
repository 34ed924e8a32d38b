//! Executor - `performUpkeep` トランザクションの送信と結果の分類
//!
//! # フロー
//! 1. NonceAllocator から lease を取得（送信は直列化される）
//! 2. gas ceiling 付きで送信 → 成功なら commit、失敗なら invalidate
//! 3. lease を解放してから receipt を期限付きで待つ
//!
//! 送信済みのトランザクションは決してキャンセル扱いにしません。
//! receipt が来なければ `Timeout` とし、次の pass でレジストリを読み直して解決します。

use std::sync::Arc;
use std::time::Duration;

use crate::app::nonce::NonceAllocator;
use crate::domain::{
    ExecutionOutcome, FailureKind, Gas, PerformTransaction, ReceiptStatus, UpkeepId,
};
use crate::ports::LedgerClient;

pub struct Executor {
    ledger: Arc<dyn LedgerClient>,
    nonces: Arc<NonceAllocator>,
    gas_ceiling: Gas,
    receipt_timeout: Duration,
}

impl Executor {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        nonces: Arc<NonceAllocator>,
        gas_ceiling: Gas,
        receipt_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            nonces,
            gas_ceiling,
            receipt_timeout,
        }
    }

    pub fn gas_ceiling(&self) -> Gas {
        self.gas_ceiling
    }

    pub async fn execute(&self, upkeep_id: UpkeepId, perform_data: Vec<u8>) -> ExecutionOutcome {
        let lease = match self.nonces.acquire(self.ledger.as_ref()).await {
            Ok(lease) => lease,
            Err(err) => {
                tracing::warn!(upkeep_id = %upkeep_id, error = %err, "could not allocate nonce");
                return ExecutionOutcome::SubmissionFailed {
                    kind: err.submission_kind(),
                    reason: err.to_string(),
                };
            }
        };
        let nonce = lease.nonce();
        let tx = PerformTransaction {
            upkeep_id,
            perform_data,
            nonce,
            gas_limit: self.gas_ceiling,
        };

        let hash = match self.ledger.submit_perform(tx).await {
            Ok(hash) => {
                lease.commit();
                hash
            }
            Err(err) => {
                lease.invalidate();
                tracing::warn!(
                    upkeep_id = %upkeep_id,
                    nonce = %nonce,
                    error = %err,
                    "ExecutionSubmissionFailure"
                );
                return ExecutionOutcome::SubmissionFailed {
                    kind: err.submission_kind(),
                    reason: err.to_string(),
                };
            }
        };
        tracing::debug!(upkeep_id = %upkeep_id, tx = %hash, nonce = %nonce, "perform submitted");

        let receipt =
            match tokio::time::timeout(self.receipt_timeout, self.ledger.await_receipt(hash)).await
            {
                Ok(Ok(receipt)) => receipt,
                Ok(Err(err)) => {
                    // Included or not, we cannot tell: same as a timeout.
                    tracing::warn!(upkeep_id = %upkeep_id, tx = %hash, error = %err, "ReceiptTimeout");
                    return ExecutionOutcome::Timeout { tx: hash };
                }
                Err(_) => {
                    tracing::warn!(
                        upkeep_id = %upkeep_id,
                        tx = %hash,
                        timeout = ?self.receipt_timeout,
                        "ReceiptTimeout"
                    );
                    return ExecutionOutcome::Timeout { tx: hash };
                }
            };

        let fee = receipt.fee();
        match receipt.status {
            ReceiptStatus::Success => ExecutionOutcome::ConfirmedSuccess {
                tx: hash,
                gas_used: receipt.gas_used,
                fee,
                payment: receipt.payment,
                executed_at: receipt.block_timestamp,
            },
            ReceiptStatus::Reverted { reason, cause } => {
                let kind = cause.unwrap_or(FailureKind::ExecutionRevert);
                tracing::error!(
                    upkeep_id = %upkeep_id,
                    tx = %hash,
                    gas_used = receipt.gas_used,
                    kind = ?kind,
                    reason = %reason,
                    "ExecutionRevert; not retried automatically"
                );
                ExecutionOutcome::ConfirmedRevert {
                    tx: hash,
                    gas_used: receipt.gas_used,
                    fee,
                    kind,
                    reason,
                }
            }
        }
    }
}
