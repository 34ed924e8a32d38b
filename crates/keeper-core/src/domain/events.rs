//! Events - レジストリのドメインイベント
//!
//! 状態を変更する操作は成功時に必ず 1 件のイベントを発行します。
//! イベントログは append-only で、監査履歴として id ごとに読み出せます。

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::UpkeepId;
use super::primitives::{Address, Gas, Wei};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum RegistryEvent {
    UpkeepRegistered {
        id: UpkeepId,
        owner: Address,
        target: Address,
        interval: Duration,
        funding: Wei,
        at: DateTime<Utc>,
    },
    UpkeepPerformed {
        id: UpkeepId,
        executor: Address,
        gas_used: Gas,
        payment: Wei,
        at: DateTime<Utc>,
    },
    UpkeepDeactivated {
        id: UpkeepId,
        at: DateTime<Utc>,
    },
    UpkeepReactivated {
        id: UpkeepId,
        at: DateTime<Utc>,
    },
    FundsAdded {
        id: UpkeepId,
        amount: Wei,
        at: DateTime<Utc>,
    },
    FundsWithdrawn {
        id: UpkeepId,
        amount: Wei,
        to: Address,
        at: DateTime<Utc>,
    },
}

impl RegistryEvent {
    pub fn upkeep_id(&self) -> UpkeepId {
        match self {
            RegistryEvent::UpkeepRegistered { id, .. }
            | RegistryEvent::UpkeepPerformed { id, .. }
            | RegistryEvent::UpkeepDeactivated { id, .. }
            | RegistryEvent::UpkeepReactivated { id, .. }
            | RegistryEvent::FundsAdded { id, .. }
            | RegistryEvent::FundsWithdrawn { id, .. } => *id,
        }
    }
}
