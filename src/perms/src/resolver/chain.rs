//! Breadth-first walk of the parent graph
//!
//! Parent graphs may contain cycles (including self-parents) and dangling
//! names. Neither is an error: each name is visited at most once and unknown
//! names stand for the empty virtual group.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::group::{Group, GroupStore};

/// Level-order inheritance chain starting at `start`.
///
/// The start group comes first, then its parents in insertion order, then
/// grandparents, and so on.
pub fn resolve_chain(groups: &GroupStore, start: &str) -> Vec<Arc<Group>> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = VecDeque::new();
    let mut chain = Vec::new();

    visited.insert(start.to_string());
    queue.push_back(start.to_string());

    while let Some(name) = queue.pop_front() {
        let group = groups.get_group(&name);

        for parent in &group.parents {
            if visited.insert(parent.clone()) {
                queue.push_back(parent.clone());
            }
        }

        chain.push(group);
    }

    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChangeTracker;

    fn names(chain: &[Arc<Group>]) -> Vec<&str> {
        chain.iter().map(|g| g.name.as_str()).collect()
    }

    #[test]
    fn test_single_group() {
        let store = GroupStore::new(ChangeTracker::new());
        store.create_group("solo");

        assert_eq!(names(&resolve_chain(&store, "solo")), vec!["solo"]);
    }

    #[test]
    fn test_level_order() {
        // a -> [b, c], b -> [d], c -> [e]
        let store = GroupStore::new(ChangeTracker::new());
        for g in ["a", "b", "c", "d", "e"] {
            store.create_group(g);
        }
        store.add_parent("a", "b");
        store.add_parent("a", "c");
        store.add_parent("b", "d");
        store.add_parent("c", "e");

        assert_eq!(
            names(&resolve_chain(&store, "a")),
            vec!["a", "b", "c", "d", "e"]
        );
    }

    #[test]
    fn test_two_group_cycle() {
        let store = GroupStore::new(ChangeTracker::new());
        store.create_group("a");
        store.create_group("b");
        store.add_parent("a", "b");
        store.add_parent("b", "a");

        assert_eq!(names(&resolve_chain(&store, "a")), vec!["a", "b"]);
        assert_eq!(names(&resolve_chain(&store, "b")), vec!["b", "a"]);
    }

    #[test]
    fn test_self_parent() {
        let store = GroupStore::new(ChangeTracker::new());
        store.create_group("loop");
        store.add_parent("loop", "loop");

        assert_eq!(names(&resolve_chain(&store, "loop")), vec!["loop"]);
    }

    #[test]
    fn test_dangling_parent_is_virtual() {
        let store = GroupStore::new(ChangeTracker::new());
        store.create_group("a");
        store.add_parent("a", "ghost");

        let chain = resolve_chain(&store, "a");
        assert_eq!(names(&chain), vec!["a", "ghost"]);
        assert!(chain[1].permissions.is_empty());
        assert!(!store.has_group("ghost"));
    }

    #[test]
    fn test_unknown_start() {
        let store = GroupStore::new(ChangeTracker::new());
        let chain = resolve_chain(&store, "");
        assert_eq!(chain.len(), 1);
        assert!(chain[0].parents.is_empty());
    }
}
