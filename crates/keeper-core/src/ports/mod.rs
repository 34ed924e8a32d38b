//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」を定義します。
//! 台帳（レジストリを含む）、タスクの capability、時刻、ID 生成を trait で抽象化し、
//! 実装の詳細は `impls` 側に置きます。

pub mod clock;
pub mod id_generator;
pub mod ledger;
pub mod target;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{PassIdGenerator, UlidGenerator};
pub use self::ledger::LedgerClient;
pub use self::target::{TargetDirectory, TargetRevert, UpkeepTarget};
