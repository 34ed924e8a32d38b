//! Domain model (IDs, primitives, upkeeps, outcomes, errors, events).

pub mod errors;
pub mod events;
pub mod ids;
pub mod outcome;
pub mod primitives;
pub mod transaction;
pub mod upkeep;

pub use self::errors::{FailureKind, LedgerError, RegistryError};
pub use self::events::RegistryEvent;
pub use self::ids::{Id, IdMarker, Nonce, PassId, TxHash, UpkeepId};
pub use self::outcome::{ExecutionOutcome, TaskOutcome, UpkeepOutcome};
pub use self::primitives::{Address, Gas, ParseAddressError, Wei};
pub use self::transaction::{PerformTransaction, Receipt, ReceiptStatus};
pub use self::upkeep::{CheckResult, Upkeep};
