//! App - アプリケーション層
//!
//! ports を組み合わせて keeper のロジックを実装します。
//!
//! # 主要コンポーネント
//! - **KeeperBuilder**: 設定の検証とワイヤリング
//! - **ScanLoop**: 1 回の scan pass（read → check → execute → record）
//! - **EligibilityChecker**: `checkUpkeep` の read-only 呼び出し
//! - **Executor**: `performUpkeep` の送信と receipt の分類
//! - **NonceAllocator**: signer ごとの nonce の直列割り当て
//! - **PassReport**: pass の結果

pub mod builder;
pub mod checker;
pub mod executor;
pub mod nonce;
pub mod scan_loop;
pub mod status;

pub use self::builder::{BuildError, KeeperBuilder};
pub use self::checker::{CheckVerdict, EligibilityChecker};
pub use self::executor::Executor;
pub use self::nonce::{NonceAllocator, NonceLease};
pub use self::scan_loop::{ScanLoop, ScanOptions};
pub use self::status::{PassCounts, PassReport};
