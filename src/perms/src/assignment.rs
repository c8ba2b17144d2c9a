//! Principal -> group assignments

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeMap;
use tracing::debug;

use crate::types::{ChangeTracker, PrincipalId};

/// Maps a principal to its assigned group name.
///
/// A missing entry means "unassigned" (the fallback policy applies). An empty
/// group name is stored as-is and means "explicitly no group".
#[derive(Debug)]
pub struct AssignmentStore {
    users: DashMap<PrincipalId, String>,
    tracker: ChangeTracker,
}

impl AssignmentStore {
    pub fn new(tracker: ChangeTracker) -> Self {
        Self {
            users: DashMap::new(),
            tracker,
        }
    }

    /// Assigned group name, `None` when unassigned
    pub fn get(&self, id: &PrincipalId) -> Option<String> {
        self.users.get(id).map(|g| g.value().clone())
    }

    pub fn is_assigned(&self, id: &PrincipalId) -> bool {
        self.users.contains_key(id)
    }

    /// Assign `group` (possibly `""`), returning whether anything changed
    pub fn assign(&self, id: PrincipalId, group: &str) -> bool {
        let changed = match self.users.entry(id) {
            Entry::Occupied(mut slot) => {
                if slot.get() == group {
                    false
                } else {
                    slot.insert(group.to_string());
                    true
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(group.to_string());
                true
            }
        };
        if changed {
            debug!(principal = %id, group, "Assigned principal");
            self.tracker.mark();
        }
        changed
    }

    /// Assign only if the principal has no entry yet
    pub fn assign_if_absent(&self, id: PrincipalId, group: &str) -> bool {
        match self.users.entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(group.to_string());
                self.tracker.mark();
                true
            }
        }
    }

    /// Return the principal to the fallback policy
    pub fn unassign(&self, id: &PrincipalId) -> bool {
        let removed = self.users.remove(id).is_some();
        if removed {
            self.tracker.mark();
        }
        removed
    }

    /// Principals assigned to `group`, sorted
    pub fn reverse_lookup(&self, group: &str) -> Vec<PrincipalId> {
        let mut ids: Vec<PrincipalId> = self
            .users
            .iter()
            .filter(|e| e.value() == group)
            .map(|e| *e.key())
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn snapshot(&self) -> BTreeMap<PrincipalId, String> {
        self.users
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect()
    }

    /// Replace every assignment (destructive, not a merge).
    ///
    /// Overwrites in place after dropping stale ids, so a principal assigned
    /// before and after never reads as unassigned mid-swap.
    pub fn replace_all(&self, users: BTreeMap<PrincipalId, String>) {
        self.users.retain(|id, _| users.contains_key(id));
        for (id, group) in users {
            self.users.insert(id, group);
        }
        self.tracker.mark();
    }
}
