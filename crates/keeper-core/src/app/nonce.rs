//! NonceAllocator - signer の sequence number を直列に割り当てる
//!
//! システム内で唯一の、真に共有される排他リソースです。
//! lease を保持している間は他の送信が nonce を取得できないので、
//! 「割り当て → 送信」が常に直列化されます。
//!
//! # 状態
//! - `None`: 未同期（次の acquire で台帳の `pending_nonce` を読む）
//! - `Some(n)`: 次に使う nonce

use tokio::sync::{Mutex, MutexGuard};

use crate::domain::{Address, LedgerError, Nonce};
use crate::ports::LedgerClient;

#[derive(Debug)]
pub struct NonceAllocator {
    signer: Address,
    next: Mutex<Option<u64>>,
}

/// Exclusive right to submit with one nonce.
///
/// Dropping the lease without `commit` leaves the nonce unused.
#[derive(Debug)]
pub struct NonceLease<'a> {
    slot: MutexGuard<'a, Option<u64>>,
    nonce: Nonce,
}

impl NonceAllocator {
    pub fn new(signer: Address) -> Self {
        Self {
            signer,
            next: Mutex::new(None),
        }
    }

    /// Waits for exclusive access, syncing from the ledger when needed.
    pub async fn acquire(&self, ledger: &dyn LedgerClient) -> Result<NonceLease<'_>, LedgerError> {
        let mut slot = self.next.lock().await;
        let next = match *slot {
            Some(next) => next,
            None => {
                let synced = ledger.pending_nonce(self.signer).await?;
                tracing::debug!(signer = %self.signer, nonce = %synced, "nonce synced from ledger");
                synced.0
            }
        };
        *slot = Some(next);
        Ok(NonceLease {
            slot,
            nonce: Nonce(next),
        })
    }
}

impl NonceLease<'_> {
    pub fn nonce(&self) -> Nonce {
        self.nonce
    }

    /// The transaction was accepted; the next lease gets `nonce + 1`.
    pub fn commit(mut self) {
        *self.slot = Some(self.nonce.0 + 1);
    }

    /// The submission failed; resync from the ledger on the next acquire.
    pub fn invalidate(mut self) {
        *self.slot = None;
    }
}
