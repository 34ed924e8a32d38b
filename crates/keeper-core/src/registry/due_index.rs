//! Due-time index: upkeeps ordered by `last_executed + interval`.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::domain::UpkeepId;

/// Ordering is by due time first, then by id, so equal due times keep
/// registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct DueEntry {
    due_at: DateTime<Utc>,
    upkeep_id: UpkeepId,
}

/// Holds one entry per active upkeep that can still become due.
#[derive(Debug, Default)]
pub struct DueIndex {
    entries: BTreeSet<DueEntry>,
}

impl DueIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, upkeep_id: UpkeepId, due_at: DateTime<Utc>) {
        self.entries.insert(DueEntry { due_at, upkeep_id });
    }

    pub fn remove(&mut self, upkeep_id: UpkeepId, due_at: DateTime<Utc>) {
        self.entries.remove(&DueEntry { due_at, upkeep_id });
    }

    /// Ids due at `now`, earliest first.
    pub fn due_at(&self, now: DateTime<Utc>) -> Vec<UpkeepId> {
        // The set is sorted, so we can stop at the first entry in the future.
        self.entries
            .iter()
            .take_while(|entry| entry.due_at <= now)
            .map(|entry| entry.upkeep_id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
