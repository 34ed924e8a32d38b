//! Impls - ports の実装（開発・テスト用）

pub mod inmem_ledger;
pub mod targets;

pub use self::inmem_ledger::{DEFAULT_GAS_PRICE, DEFAULT_REGISTRY_ADDRESS, InMemoryLedger};
pub use self::targets::{ScriptedTarget, SimpleCounter};
