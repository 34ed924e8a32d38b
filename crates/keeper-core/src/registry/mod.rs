//! Registry module: the upkeep state machine and its due-time index.

mod due_index;
mod upkeep_registry;

pub use due_index::DueIndex;
pub use upkeep_registry::{
    DEFAULT_PERFORM_OVERHEAD_GAS, PerformContext, PerformReceipt, RegistryConfig, UpkeepRegistry,
};
