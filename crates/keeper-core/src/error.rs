use thiserror::Error;

use crate::app::BuildError;
use crate::config::ConfigError;
use crate::domain::LedgerError;

/// Errors that stop a pass (or the keeper) before any per-upkeep work.
///
/// Per-upkeep failures never surface here; they are recorded in the pass report.
#[derive(Debug, Error)]
pub enum KeeperError {
    #[error("cannot read block timestamp")]
    BlockTimestamp(#[source] LedgerError),

    #[error("cannot read upkeep count")]
    UpkeepCount(#[source] LedgerError),

    #[error("cannot read gas price")]
    GasPrice(#[source] LedgerError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Build(#[from] BuildError),
}
