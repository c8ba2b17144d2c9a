//! Privilege tier -> default group table

use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::debug;

use crate::types::ChangeTracker;

/// Fallback groups for unassigned principals, keyed by privilege tier.
///
/// Tier 0 always has an entry (the empty "no group" name until configured),
/// so resolution always terminates.
#[derive(Debug)]
pub struct FallbackPolicy {
    table: RwLock<BTreeMap<u32, String>>,
    tracker: ChangeTracker,
}

impl FallbackPolicy {
    pub fn new(tracker: ChangeTracker) -> Self {
        Self {
            table: RwLock::new(Self::default_table()),
            tracker,
        }
    }

    fn default_table() -> BTreeMap<u32, String> {
        let mut table = BTreeMap::new();
        table.insert(0, String::new());
        table
    }

    /// Group for the highest configured tier at or below `tier`
    pub fn resolve(&self, tier: u32) -> String {
        self.table
            .read()
            .range(..=tier)
            .next_back()
            .map(|(_, group)| group.clone())
            .unwrap_or_default()
    }

    /// Upsert the entry for `tier`
    pub fn set(&self, tier: u32, group: &str) {
        let previous = self.table.write().insert(tier, group.to_string());
        debug!(tier, group, ?previous, "Set fallback group");
        self.tracker.mark();
    }

    /// Explicit entry for exactly `tier`
    pub fn entry(&self, tier: u32) -> Option<String> {
        self.table.read().get(&tier).cloned()
    }

    pub fn snapshot(&self) -> BTreeMap<u32, String> {
        self.table.read().clone()
    }

    /// Replace the table, re-adding tier 0 if the input lacks it
    pub fn replace_all(&self, mut table: BTreeMap<u32, String>) {
        table.entry(0).or_default();
        *self.table.write() = table;
        self.tracker.mark();
    }
}
