//! InMemoryLedger - 開発・テスト用の台帳
//!
//! レジストリ、デプロイ済み target、signer ごとの nonce、receipt を
//! 1 つのロックの下で保持します。1 トランザクション = 1 ロック区間なので、
//! 台帳上の状態遷移は常に原子的です。
//!
//! # Fault injection
//! - `set_unavailable`: すべての読み取り・送信が `Unavailable` になる
//! - `reject_next_submissions`: 次の n 件の送信を拒否（nonce は消費しない）
//! - `withhold_receipts`: 取り込みはするが receipt を返さない（timeout 検証用）

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{
    Address, CheckResult, Gas, LedgerError, Nonce, PerformTransaction, Receipt, ReceiptStatus,
    RegistryError, RegistryEvent, TxHash, Upkeep, UpkeepId, Wei,
};
use crate::ports::{Clock, LedgerClient, UpkeepTarget};
use crate::registry::{PerformContext, RegistryConfig, UpkeepRegistry};

/// 1 gwei.
pub const DEFAULT_GAS_PRICE: Wei = Wei::new(1_000_000_000);

/// First contract address of a fresh devnet deployer.
pub const DEFAULT_REGISTRY_ADDRESS: Address = Address::from_bytes([
    0x5f, 0xbd, 0xb2, 0x31, 0x56, 0x78, 0xaf, 0xec, 0xb3, 0x67, 0xf0, 0x32, 0xd9, 0x3f, 0x64, 0x2f,
    0x64, 0x18, 0x0a, 0xa3,
]);

#[derive(Debug, Default)]
struct LedgerFaults {
    unavailable: bool,
    rejected_submissions: u32,
    withhold_receipts: bool,
}

struct LedgerState {
    registry: UpkeepRegistry,
    targets: HashMap<Address, Arc<dyn UpkeepTarget>>,
    nonces: HashMap<Address, u64>,
    receipts: HashMap<TxHash, Receipt>,
    submitted: Vec<PerformTransaction>,
    fees_paid: HashMap<Address, Wei>,
    next_tx: u64,
    faults: LedgerFaults,
}

impl LedgerState {
    fn ensure_available(&self) -> Result<(), LedgerError> {
        if self.faults.unavailable {
            return Err(LedgerError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }

    fn allocate_tx_hash(&mut self) -> TxHash {
        let tx = TxHash::new(self.next_tx);
        self.next_tx += 1;
        tx
    }

    /// Gas burned by a reverted perform call.
    fn gas_burned(&self, err: &RegistryError, gas_limit: Gas) -> Gas {
        let overhead = self.registry.config().perform_overhead_gas;
        let burned = match err {
            RegistryError::OutOfGas { limit } => *limit,
            RegistryError::ExecutionReverted { gas_used, .. } => overhead.saturating_add(*gas_used),
            _ => overhead,
        };
        burned.min(gas_limit)
    }
}

pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
    clock: Arc<dyn Clock>,
    registry_address: Address,
    signer: Address,
    gas_price: Wei,
}

impl InMemoryLedger {
    pub fn new(config: RegistryConfig, signer: Address, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(LedgerState {
                registry: UpkeepRegistry::new(config),
                targets: HashMap::new(),
                nonces: HashMap::new(),
                receipts: HashMap::new(),
                submitted: Vec::new(),
                fees_paid: HashMap::new(),
                next_tx: 1,
                faults: LedgerFaults::default(),
            }),
            clock,
            registry_address: DEFAULT_REGISTRY_ADDRESS,
            signer,
            gas_price: DEFAULT_GAS_PRICE,
        }
    }

    /// Hosts the registry at `address` instead of the devnet default.
    pub fn with_registry_address(mut self, address: Address) -> Self {
        self.registry_address = address;
        self
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn deploy_target(&self, address: Address, target: Arc<dyn UpkeepTarget>) {
        let mut state = self.state.lock().await;
        state.targets.insert(address, target);
    }

    pub async fn register_upkeep(
        &self,
        owner: Address,
        target: Address,
        check_data: Vec<u8>,
        interval: Duration,
        funding: Wei,
    ) -> Result<UpkeepId, RegistryError> {
        let now = self.now();
        let mut state = self.state.lock().await;
        state
            .registry
            .register_upkeep(owner, target, check_data, interval, funding, now)
    }

    pub async fn deactivate(&self, id: UpkeepId, owner: Address) -> Result<(), RegistryError> {
        let now = self.now();
        self.state.lock().await.registry.deactivate(id, owner, now)
    }

    pub async fn reactivate(&self, id: UpkeepId, owner: Address) -> Result<(), RegistryError> {
        let now = self.now();
        self.state.lock().await.registry.reactivate(id, owner, now)
    }

    pub async fn fund(&self, id: UpkeepId, amount: Wei) -> Result<(), RegistryError> {
        let now = self.now();
        self.state.lock().await.registry.fund(id, amount, now)
    }

    pub async fn withdraw(
        &self,
        id: UpkeepId,
        amount: Wei,
        owner: Address,
    ) -> Result<(), RegistryError> {
        let now = self.now();
        self.state
            .lock()
            .await
            .registry
            .withdraw(id, amount, owner, now)
    }

    pub async fn executor_payments(&self, executor: Address) -> Wei {
        self.state.lock().await.registry.executor_payments(executor)
    }

    /// Transaction fees paid by `account` across all included transactions.
    pub async fn fees_paid(&self, account: Address) -> Wei {
        let state = self.state.lock().await;
        state.fees_paid.get(&account).copied().unwrap_or_default()
    }

    pub async fn events(&self) -> Vec<RegistryEvent> {
        self.state.lock().await.registry.events().to_vec()
    }

    /// Every transaction accepted for inclusion, in order.
    pub async fn submitted_transactions(&self) -> Vec<PerformTransaction> {
        self.state.lock().await.submitted.clone()
    }

    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().await.faults.unavailable = unavailable;
    }

    pub async fn reject_next_submissions(&self, n: u32) {
        self.state.lock().await.faults.rejected_submissions = n;
    }

    pub async fn withhold_receipts(&self, withhold: bool) {
        self.state.lock().await.faults.withhold_receipts = withhold;
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    fn registry_address(&self) -> Address {
        self.registry_address
    }

    fn signer_address(&self) -> Address {
        self.signer
    }

    async fn gas_price(&self) -> Result<Wei, LedgerError> {
        self.state.lock().await.ensure_available()?;
        Ok(self.gas_price)
    }

    async fn block_timestamp(&self) -> Result<DateTime<Utc>, LedgerError> {
        self.state.lock().await.ensure_available()?;
        Ok(self.now())
    }

    async fn upkeep_count(&self) -> Result<u64, LedgerError> {
        let state = self.state.lock().await;
        state.ensure_available()?;
        Ok(state.registry.upkeep_count())
    }

    async fn get_upkeep_info(&self, id: UpkeepId) -> Result<Upkeep, LedgerError> {
        let state = self.state.lock().await;
        state.ensure_available()?;
        Ok(state.registry.get_upkeep_info(id)?)
    }

    async fn check_upkeep(
        &self,
        target: Address,
        check_data: &[u8],
    ) -> Result<CheckResult, LedgerError> {
        let state = self.state.lock().await;
        state.ensure_available()?;
        let code = state
            .targets
            .get(&target)
            .ok_or_else(|| LedgerError::CallReverted {
                reason: format!("no code at {target}"),
            })?;
        code.check(check_data)
            .map_err(|revert| LedgerError::CallReverted {
                reason: revert.reason,
            })
    }

    async fn pending_nonce(&self, signer: Address) -> Result<Nonce, LedgerError> {
        let state = self.state.lock().await;
        state.ensure_available()?;
        Ok(Nonce(state.nonces.get(&signer).copied().unwrap_or(0)))
    }

    async fn submit_perform(&self, tx: PerformTransaction) -> Result<TxHash, LedgerError> {
        let now = self.now();
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        state.ensure_available()?;
        if state.faults.rejected_submissions > 0 {
            state.faults.rejected_submissions -= 1;
            return Err(LedgerError::Submission("transaction dropped".to_string()));
        }
        let expected = state.nonces.get(&self.signer).copied().unwrap_or(0);
        if tx.nonce.0 != expected {
            return Err(LedgerError::NonceMismatch {
                expected,
                got: tx.nonce.0,
            });
        }

        let ctx = PerformContext {
            now,
            gas_limit: tx.gas_limit,
            gas_price: self.gas_price,
        };
        let result = state.registry.perform_upkeep(
            tx.upkeep_id,
            &tx.perform_data,
            self.signer,
            &ctx,
            &state.targets,
        );

        let hash = state.allocate_tx_hash();
        let receipt = match result {
            Ok(performed) => Receipt {
                tx: hash,
                status: ReceiptStatus::Success,
                gas_used: performed.gas_used,
                effective_gas_price: self.gas_price,
                block_timestamp: now,
                payment: Some(performed.payment),
            },
            Err(err) => Receipt {
                tx: hash,
                gas_used: state.gas_burned(&err, tx.gas_limit),
                status: ReceiptStatus::Reverted {
                    reason: err.to_string(),
                    cause: Some(err.kind()),
                },
                effective_gas_price: self.gas_price,
                block_timestamp: now,
                payment: None,
            },
        };

        let fee = receipt.fee();
        let paid = state.fees_paid.entry(self.signer).or_default();
        *paid = paid.saturating_add(fee);
        state.nonces.insert(self.signer, expected + 1);
        state.receipts.insert(hash, receipt);
        state.submitted.push(tx);
        Ok(hash)
    }

    async fn await_receipt(&self, tx: TxHash) -> Result<Receipt, LedgerError> {
        let receipt = {
            let state = self.state.lock().await;
            if state.faults.withhold_receipts {
                None
            } else {
                Some(
                    state
                        .receipts
                        .get(&tx)
                        .cloned()
                        .ok_or(LedgerError::UnknownTransaction(tx))?,
                )
            }
        };
        match receipt {
            Some(receipt) => Ok(receipt),
            // Lock released; the caller's deadline decides how long we wait.
            None => std::future::pending().await,
        }
    }
}
