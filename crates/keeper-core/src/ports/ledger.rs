//! LedgerClient port - 台帳との I/O 境界
//!
//! レジストリの状態は台帳側が所有します（source of truth）。
//! keeper はここに定義された型付き操作だけで読み書きします。
//!
//! # 設計原則
//! - 読み取り（count, snapshot, check）は副作用なし
//! - 書き込みは `submit_perform` のみ。nonce は呼び出し側が直列に割り当てる
//! - `await_receipt` は待ち続ける可能性がある。期限は呼び出し側が決める

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Address, CheckResult, LedgerError, Nonce, PerformTransaction, Receipt, TxHash, Upkeep,
    UpkeepId, Wei,
};

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Contract address of the registry this client talks to.
    fn registry_address(&self) -> Address;

    /// Identity that signs submitted transactions.
    fn signer_address(&self) -> Address;

    /// Price per gas unit the next submission will pay.
    async fn gas_price(&self) -> Result<Wei, LedgerError>;

    /// Timestamp of the latest block; the registry's notion of "now".
    async fn block_timestamp(&self) -> Result<DateTime<Utc>, LedgerError>;

    async fn upkeep_count(&self) -> Result<u64, LedgerError>;

    async fn get_upkeep_info(&self, id: UpkeepId) -> Result<Upkeep, LedgerError>;

    /// Read-only call of the target's check capability.
    async fn check_upkeep(
        &self,
        target: Address,
        check_data: &[u8],
    ) -> Result<CheckResult, LedgerError>;

    /// Next sequence number the ledger expects from `signer`.
    async fn pending_nonce(&self, signer: Address) -> Result<Nonce, LedgerError>;

    async fn submit_perform(&self, tx: PerformTransaction) -> Result<TxHash, LedgerError>;

    /// Resolves once `tx` is included.
    async fn await_receipt(&self, tx: TxHash) -> Result<Receipt, LedgerError>;
}
