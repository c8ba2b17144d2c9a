//! Permission resolution over the group inheritance graph
//!
//! A principal's group comes from its assignment, or from the fallback policy
//! for its privilege tier when unassigned. The group's inheritance chain is
//! then scanned in level order and the first group that defines the node
//! decides. When nothing defines it the answer is `Undecided`; the resolver
//! never turns silence into a denial.
//!
//! # Example
//!
//! ```rust
//! use simple_perms::{ChangeTracker, Principal, Tristate};
//! use simple_perms::assignment::AssignmentStore;
//! use simple_perms::fallback::FallbackPolicy;
//! use simple_perms::group::GroupStore;
//! use simple_perms::resolver::PermissionResolver;
//! use std::sync::Arc;
//! use uuid::Uuid;
//!
//! let tracker = ChangeTracker::new();
//! let groups = Arc::new(GroupStore::new(tracker.clone()));
//! let assignments = Arc::new(AssignmentStore::new(tracker.clone()));
//! let fallback = Arc::new(FallbackPolicy::new(tracker));
//!
//! groups.create_group("member");
//! groups.create_group("builder");
//! groups.add_parent("builder", "member");
//! groups.grant("member", "chat.send", true);
//!
//! let id = Uuid::new_v4();
//! assignments.assign(id, "builder");
//!
//! let resolver = PermissionResolver::new(groups, assignments, fallback);
//! let principal = Principal::new(id);
//! assert_eq!(resolver.has_permission(&principal, "chat.send"), Tristate::Granted);
//! assert_eq!(resolver.has_permission(&principal, "world.edit"), Tristate::Undecided);
//! ```

mod chain;

#[cfg(test)]
mod tests;

pub use chain::resolve_chain;

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::assignment::AssignmentStore;
use crate::fallback::FallbackPolicy;
use crate::group::{Group, GroupStore};
use crate::types::{Principal, Tristate};

/// One definition of a node somewhere in a group's chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionDetail {
    /// Permission node
    pub node: String,

    /// Group in the chain that defines it
    pub group: String,

    /// Value defined by that group
    pub value: bool,

    /// Whether this definition is the one a member would get
    pub effective: bool,
}

/// Answers permission queries from the three stores
#[derive(Debug, Clone)]
pub struct PermissionResolver {
    groups: Arc<GroupStore>,
    assignments: Arc<AssignmentStore>,
    fallback: Arc<FallbackPolicy>,
}

impl PermissionResolver {
    pub fn new(
        groups: Arc<GroupStore>,
        assignments: Arc<AssignmentStore>,
        fallback: Arc<FallbackPolicy>,
    ) -> Self {
        Self {
            groups,
            assignments,
            fallback,
        }
    }

    /// Group name the principal resolves to: its assignment, else the
    /// fallback group for its tier
    pub fn group_of(&self, principal: &Principal) -> String {
        self.assignments
            .get(&principal.id)
            .unwrap_or_else(|| self.fallback.resolve(principal.tier))
    }

    /// Level-order inheritance chain of `start`
    pub fn resolve_chain(&self, start: &str) -> Vec<Arc<Group>> {
        resolve_chain(&self.groups, start)
    }

    /// Tri-state decision for `principal` on `node`
    pub fn has_permission(&self, principal: &Principal, node: &str) -> Tristate {
        let group = self.group_of(principal);
        let result = self.group_permission(&group, node);
        debug!(principal = %principal.id, group = %group, node, %result, "Resolved permission");
        result
    }

    /// Tri-state value a member of `group` would get for `node`
    pub fn group_permission(&self, group: &str, node: &str) -> Tristate {
        let value = self
            .resolve_chain(group)
            .iter()
            .find_map(|g| g.permission(node));
        Tristate::from_option(value)
    }

    /// Every definition of every node along the chain of `group`, grouped by
    /// node (sorted) and in chain order within a node.
    pub fn permission_details(&self, group: &str) -> Vec<PermissionDetail> {
        let chain = self.resolve_chain(group);

        let mut details: Vec<PermissionDetail> = Vec::new();
        for g in &chain {
            for (node, value) in &g.permissions {
                details.push(PermissionDetail {
                    node: node.clone(),
                    group: g.name.clone(),
                    value: *value,
                    effective: false,
                });
            }
        }

        // Stable: keeps chain order within a node
        details.sort_by(|a, b| a.node.cmp(&b.node));

        let mut last_node: Option<String> = None;
        for detail in &mut details {
            if last_node.as_deref() != Some(detail.node.as_str()) {
                detail.effective = true;
                last_node = Some(detail.node.clone());
            }
        }

        details
    }

    /// Give a never-seen principal the fallback group of its tier.
    ///
    /// Returns the assigned group after invoking `on_assigned` with it. Does
    /// nothing when the principal already has an assignment, or when the
    /// tier's fallback is the empty "no group" name, which is equivalent to
    /// staying unassigned.
    pub fn init_for_first_time<F>(&self, principal: &Principal, on_assigned: F) -> Option<String>
    where
        F: FnOnce(&str),
    {
        if self.assignments.is_assigned(&principal.id) {
            return None;
        }

        let group = self.fallback.resolve(principal.tier);
        if group.is_empty() {
            debug!(principal = %principal.id, tier = principal.tier, "No fallback group to assign");
            return None;
        }

        if !self.assignments.assign_if_absent(principal.id, &group) {
            return None;
        }

        info!(principal = %principal.id, group = %group, "Assigned default group");
        on_assigned(&group);
        Some(group)
    }
}
