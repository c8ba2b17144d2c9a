//! Concurrent group storage
//!
//! Groups are stored as immutable `Arc<Group>` values. Every mutation clones
//! the current value, edits the copy and swaps it back in while holding the
//! shard lock for that key, so readers only ever observe whole groups.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::types::Group;
use crate::types::{ChangeTracker, GameMode};

/// Named group definitions
#[derive(Debug)]
pub struct GroupStore {
    groups: DashMap<String, Arc<Group>>,
    tracker: ChangeTracker,
}

impl GroupStore {
    /// Create an empty store reporting changes to `tracker`
    pub fn new(tracker: ChangeTracker) -> Self {
        Self {
            groups: DashMap::new(),
            tracker,
        }
    }

    /// Insert an empty group. No-op for empty or already-known names.
    pub fn create_group(&self, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        match self.groups.entry(name.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Group::new(name)));
                self.tracker.mark();
                debug!(group = name, "Created group");
                true
            }
        }
    }

    /// Known group, or the empty name (the virtual "no group")
    pub fn has_group(&self, name: &str) -> bool {
        name.is_empty() || self.groups.contains_key(name)
    }

    /// Stored group, if any
    pub fn lookup(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.get(name).map(|g| Arc::clone(g.value()))
    }

    /// Stored group, or a transient empty group for unknown names.
    ///
    /// The virtual group is never inserted.
    pub fn get_group(&self, name: &str) -> Arc<Group> {
        self.lookup(name)
            .unwrap_or_else(|| Arc::new(Group::new(name)))
    }

    pub fn grant(&self, name: &str, node: &str, value: bool) -> bool {
        self.update(name, |group| group.set_permission(node, value))
    }

    pub fn revoke(&self, name: &str, node: &str) -> bool {
        self.update(name, |group| group.remove_permission(node))
    }

    pub fn add_parent(&self, name: &str, parent: &str) -> bool {
        self.update(name, |group| group.add_parent(parent))
    }

    pub fn remove_parent(&self, name: &str, parent: &str) -> bool {
        self.update(name, |group| group.remove_parent(parent))
    }

    /// Parent names in insertion order (empty for unknown groups)
    pub fn parents_of(&self, name: &str) -> Vec<String> {
        self.lookup(name)
            .map(|g| g.parents.clone())
            .unwrap_or_default()
    }

    pub fn set_prefix(&self, name: &str, prefix: Value) -> bool {
        self.update(name, |group| {
            if group.prefix == prefix {
                return false;
            }
            group.prefix = prefix;
            true
        })
    }

    /// Prefix blob; the virtual group's empty prefix for unknown names
    pub fn prefix(&self, name: &str) -> Value {
        self.get_group(name).prefix.clone()
    }

    pub fn set_game_type(&self, name: &str, mode: GameMode) -> bool {
        self.update(name, |group| {
            if group.mode == mode.as_str() {
                return false;
            }
            group.mode = mode.as_str().to_string();
            true
        })
    }

    /// Stored mode tag, `None` for unknown groups
    pub fn game_type(&self, name: &str) -> Option<String> {
        self.lookup(name).map(|g| g.mode.clone())
    }

    /// Nodes defined directly on the group, sorted
    pub fn permission_nodes(&self, name: &str) -> Vec<String> {
        self.lookup(name)
            .map(|g| g.permissions.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// All group names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Point-in-time copy for serialization
    pub fn snapshot(&self) -> BTreeMap<String, Group> {
        self.groups
            .iter()
            .map(|e| (e.key().clone(), Group::clone(e.value())))
            .collect()
    }

    /// Replace every group with `groups` (destructive, not a merge).
    ///
    /// Stale names are dropped first and the rest overwritten in place, so a
    /// group present before and after is visible throughout the swap.
    pub fn replace_all(&self, groups: BTreeMap<String, Group>) {
        self.groups.retain(|name, _| groups.contains_key(name));
        for (name, group) in groups {
            self.groups.insert(name, Arc::new(group));
        }
        self.tracker.mark();
    }

    /// Copy-on-write update of one group.
    ///
    /// `edit` returns whether it changed anything; unchanged copies are
    /// discarded and the dirty flag is left alone. Unknown groups are a no-op.
    fn update<F>(&self, name: &str, edit: F) -> bool
    where
        F: FnOnce(&mut Group) -> bool,
    {
        let Some(mut slot) = self.groups.get_mut(name) else {
            debug!(group = name, "Ignoring mutation of unknown group");
            return false;
        };

        let mut next = Group::clone(slot.value());
        if !edit(&mut next) {
            return false;
        }

        *slot.value_mut() = Arc::new(next);
        self.tracker.mark();
        true
    }
}
