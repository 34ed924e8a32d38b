//! Transaction and receipt shapes exchanged with the ledger client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::FailureKind;
use super::ids::{Nonce, TxHash, UpkeepId};
use super::primitives::{Gas, Wei};

/// A signed call of `performUpkeep(upkeep_id, perform_data)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformTransaction {
    pub upkeep_id: UpkeepId,
    pub perform_data: Vec<u8>,
    pub nonce: Nonce,
    /// Resource ceiling for the whole transaction.
    pub gas_limit: Gas,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceiptStatus {
    Success,
    Reverted {
        reason: String,
        /// Registry classification of the rejection; `None` when the ledger
        /// only reports a reason string.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cause: Option<FailureKind>,
    },
}

/// Inclusion receipt of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx: TxHash,
    pub status: ReceiptStatus,
    pub gas_used: Gas,
    pub effective_gas_price: Wei,
    pub block_timestamp: DateTime<Utc>,
    /// Reimbursement credited to the executor; `None` unless successful.
    pub payment: Option<Wei>,
}

impl Receipt {
    pub fn is_success(&self) -> bool {
        self.status == ReceiptStatus::Success
    }

    /// Fee paid by the submitting account.
    pub fn fee(&self) -> Wei {
        Wei::for_gas(self.gas_used, self.effective_gas_price)
    }
}
