//! keeper-core
//!
//! Upkeep registry と、それを周期的に走査して実行する keeper の中核。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, primitives, upkeep, outcome, errors, events, transaction）
//! - **ports**: 抽象化レイヤー（LedgerClient, UpkeepTarget, Clock, PassIdGenerator）
//! - **registry**: upkeep registry の状態機械と due index
//! - **app**: keeper のロジック（builder, checker, executor, nonce, scan_loop, status）
//! - **impls**: 実装（InMemoryLedger, SimpleCounter など開発・テスト用）
//! - **config**: 環境変数からの設定
//! - **error**: pass を止める致命的エラー

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;
pub mod registry;

pub use crate::app::{KeeperBuilder, PassReport, ScanLoop};
pub use crate::config::KeeperConfig;
pub use crate::error::KeeperError;
