//! Resolver tests
//!
//! Tests cover:
//! - Direct and inherited lookups
//! - Cyclic and dangling parent graphs
//! - Fallback tiers for unassigned principals
//! - First-time assignment
//! - Permission details

use super::*;
use crate::types::ChangeTracker;
use proptest::prelude::*;
use std::cell::RefCell;
use std::collections::HashSet;
use uuid::Uuid;

struct Fixture {
    groups: Arc<GroupStore>,
    assignments: Arc<AssignmentStore>,
    fallback: Arc<FallbackPolicy>,
    resolver: PermissionResolver,
}

fn fixture() -> Fixture {
    let tracker = ChangeTracker::new();
    let groups = Arc::new(GroupStore::new(tracker.clone()));
    let assignments = Arc::new(AssignmentStore::new(tracker.clone()));
    let fallback = Arc::new(FallbackPolicy::new(tracker));
    let resolver = PermissionResolver::new(
        Arc::clone(&groups),
        Arc::clone(&assignments),
        Arc::clone(&fallback),
    );
    Fixture {
        groups,
        assignments,
        fallback,
        resolver,
    }
}

fn member_of(f: &Fixture, group: &str) -> Principal {
    let id = Uuid::new_v4();
    f.assignments.assign(id, group);
    Principal::new(id)
}

// ============================================================================
// Direct Lookup Tests
// ============================================================================

#[test]
fn test_group_without_parents() {
    let f = fixture();
    f.groups.create_group("member");
    f.groups.grant("member", "chat.send", true);
    f.groups.grant("member", "world.edit", false);
    let p = member_of(&f, "member");

    assert_eq!(f.resolver.has_permission(&p, "chat.send"), Tristate::Granted);
    assert_eq!(f.resolver.has_permission(&p, "world.edit"), Tristate::Denied);
    assert_eq!(f.resolver.has_permission(&p, "other"), Tristate::Undecided);
}

#[test]
fn test_regrant_overrides_value() {
    let f = fixture();
    f.groups.create_group("g");
    f.groups.grant("g", "x", true);
    f.groups.grant("g", "x", false);
    let p = member_of(&f, "g");

    assert_eq!(f.resolver.has_permission(&p, "x"), Tristate::Denied);
}

#[test]
fn test_unknown_assigned_group_is_undecided() {
    let f = fixture();
    let p = member_of(&f, "deleted-long-ago");

    assert_eq!(f.resolver.has_permission(&p, "anything"), Tristate::Undecided);
}

#[test]
fn test_explicit_no_group_ignores_fallback() {
    let f = fixture();
    f.groups.create_group("guest");
    f.groups.grant("guest", "chat.send", true);
    f.fallback.set(0, "guest");
    let p = member_of(&f, "");

    assert_eq!(f.resolver.group_of(&p), "");
    assert_eq!(f.resolver.has_permission(&p, "chat.send"), Tristate::Undecided);
}

// ============================================================================
// Inheritance Tests
// ============================================================================

#[test]
fn test_own_definition_beats_parent() {
    let f = fixture();
    f.groups.create_group("member");
    f.groups.create_group("muted");
    f.groups.add_parent("muted", "member");
    f.groups.grant("member", "chat.send", true);
    f.groups.grant("muted", "chat.send", false);
    let p = member_of(&f, "muted");

    assert_eq!(f.resolver.has_permission(&p, "chat.send"), Tristate::Denied);
}

#[test]
fn test_grandparent_is_consulted() {
    let f = fixture();
    for g in ["guest", "member", "builder"] {
        f.groups.create_group(g);
    }
    f.groups.add_parent("builder", "member");
    f.groups.add_parent("member", "guest");
    f.groups.grant("guest", "spawn.visit", true);
    let p = member_of(&f, "builder");

    assert_eq!(f.resolver.has_permission(&p, "spawn.visit"), Tristate::Granted);
}

#[test]
fn test_nearer_ancestor_wins() {
    // builder -> [member, trusted], member -> [guest]
    // guest is deeper than trusted, so trusted decides.
    let f = fixture();
    for g in ["guest", "member", "trusted", "builder"] {
        f.groups.create_group(g);
    }
    f.groups.add_parent("builder", "member");
    f.groups.add_parent("builder", "trusted");
    f.groups.add_parent("member", "guest");
    f.groups.grant("guest", "tp", false);
    f.groups.grant("trusted", "tp", true);
    let p = member_of(&f, "builder");

    assert_eq!(f.resolver.has_permission(&p, "tp"), Tristate::Granted);
}

#[test]
fn test_parent_insertion_order_breaks_ties() {
    let f = fixture();
    for g in ["a", "b", "child"] {
        f.groups.create_group(g);
    }
    f.groups.grant("a", "x", true);
    f.groups.grant("b", "x", false);
    f.groups.add_parent("child", "b");
    f.groups.add_parent("child", "a");
    let p = member_of(&f, "child");

    assert_eq!(f.resolver.has_permission(&p, "x"), Tristate::Denied);
}

#[test]
fn test_cycle_terminates_and_visits_once() {
    let f = fixture();
    f.groups.create_group("A");
    f.groups.create_group("B");
    f.groups.add_parent("A", "B");
    f.groups.add_parent("B", "A");
    let p = member_of(&f, "A");

    assert_eq!(f.resolver.has_permission(&p, "missing"), Tristate::Undecided);

    let chain = f.resolver.resolve_chain("A");
    let visited: Vec<&str> = chain.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(visited, vec!["A", "B"]);
}

#[test]
fn test_dangling_parent_contributes_nothing() {
    let f = fixture();
    f.groups.create_group("g");
    f.groups.add_parent("g", "ghost");
    f.groups.add_parent("g", "g");
    let p = member_of(&f, "g");

    assert_eq!(f.resolver.has_permission(&p, "x"), Tristate::Undecided);
}

// ============================================================================
// Fallback Tests
// ============================================================================

#[test]
fn test_unassigned_uses_tier_fallback() {
    let f = fixture();
    f.groups.create_group("guest");
    f.groups.create_group("admin");
    f.groups.grant("guest", "ban", false);
    f.groups.grant("admin", "ban", true);
    f.fallback.set(0, "guest");
    f.fallback.set(4, "admin");

    let id = Uuid::new_v4();
    let guest = Principal::new(id).with_tier(2);
    let op = Principal::new(id).with_tier(5);

    assert_eq!(f.resolver.group_of(&guest), "guest");
    assert_eq!(f.resolver.has_permission(&guest, "ban"), Tristate::Denied);
    assert_eq!(f.resolver.group_of(&op), "admin");
    assert_eq!(f.resolver.has_permission(&op, "ban"), Tristate::Granted);
}

#[test]
fn test_unconfigured_fallback_is_undecided() {
    let f = fixture();
    let p = Principal::new(Uuid::new_v4()).with_tier(3);

    assert_eq!(f.resolver.group_of(&p), "");
    assert_eq!(f.resolver.has_permission(&p, "x"), Tristate::Undecided);
}

// ============================================================================
// First-Time Assignment Tests
// ============================================================================

#[test]
fn test_init_assigns_tier_fallback_once() {
    let f = fixture();
    f.groups.create_group("guest");
    f.fallback.set(0, "guest");
    let p = Principal::new(Uuid::new_v4());

    let seen = RefCell::new(Vec::new());
    let assigned = f
        .resolver
        .init_for_first_time(&p, |g| seen.borrow_mut().push(g.to_string()));
    assert_eq!(assigned.as_deref(), Some("guest"));
    assert_eq!(f.assignments.get(&p.id).as_deref(), Some("guest"));

    let again = f
        .resolver
        .init_for_first_time(&p, |g| seen.borrow_mut().push(g.to_string()));
    assert!(again.is_none());
    assert_eq!(seen.into_inner(), vec!["guest"]);
}

#[test]
fn test_init_keeps_existing_assignment() {
    let f = fixture();
    f.fallback.set(0, "guest");
    let p = member_of(&f, "admin");

    let assigned = f
        .resolver
        .init_for_first_time(&p, |_| panic!("callback must not run"));
    assert!(assigned.is_none());
    assert_eq!(f.assignments.get(&p.id).as_deref(), Some("admin"));
}

#[test]
fn test_init_skips_empty_fallback() {
    let f = fixture();
    let p = Principal::new(Uuid::new_v4());

    let assigned = f
        .resolver
        .init_for_first_time(&p, |_| panic!("callback must not run"));
    assert!(assigned.is_none());
    assert!(!f.assignments.is_assigned(&p.id));
}

// ============================================================================
// Permission Details Tests
// ============================================================================

#[test]
fn test_permission_details_marks_effective() {
    let f = fixture();
    f.groups.create_group("member");
    f.groups.create_group("muted");
    f.groups.add_parent("muted", "member");
    f.groups.grant("member", "chat.send", true);
    f.groups.grant("member", "home", true);
    f.groups.grant("muted", "chat.send", false);

    let details = f.resolver.permission_details("muted");
    assert_eq!(
        details,
        vec![
            PermissionDetail {
                node: "chat.send".to_string(),
                group: "muted".to_string(),
                value: false,
                effective: true,
            },
            PermissionDetail {
                node: "chat.send".to_string(),
                group: "member".to_string(),
                value: true,
                effective: false,
            },
            PermissionDetail {
                node: "home".to_string(),
                group: "member".to_string(),
                value: true,
                effective: true,
            },
        ]
    );
}

#[test]
fn test_permission_details_of_unknown_group() {
    let f = fixture();
    assert!(f.resolver.permission_details("nobody").is_empty());
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #[test]
    fn prop_chain_visits_each_reachable_group_once(
        edges in prop::collection::vec((0usize..8, 0usize..8), 0..32)
    ) {
        let f = fixture();
        for i in 0..8 {
            f.groups.create_group(&format!("g{}", i));
        }
        for (from, to) in &edges {
            f.groups.add_parent(&format!("g{}", from), &format!("g{}", to));
        }

        let chain = f.resolver.resolve_chain("g0");
        let names: Vec<&str> = chain.iter().map(|g| g.name.as_str()).collect();
        let unique: HashSet<&str> = names.iter().copied().collect();

        prop_assert_eq!(names[0], "g0");
        prop_assert_eq!(unique.len(), names.len());
        prop_assert!(names.len() <= 8);
    }

    #[test]
    fn prop_first_definition_in_chain_decides(
        edges in prop::collection::vec((0usize..6, 0usize..6), 0..20),
        grants in prop::collection::vec((0usize..6, any::<bool>()), 0..6)
    ) {
        let f = fixture();
        for i in 0..6 {
            f.groups.create_group(&format!("g{}", i));
        }
        for (from, to) in &edges {
            f.groups.add_parent(&format!("g{}", from), &format!("g{}", to));
        }
        for (group, value) in &grants {
            f.groups.grant(&format!("g{}", group), "node", *value);
        }
        let p = member_of(&f, "g0");

        let expected = f
            .resolver
            .resolve_chain("g0")
            .iter()
            .find_map(|g| g.permission("node"));
        prop_assert_eq!(f.resolver.has_permission(&p, "node").as_option(), expected);
    }
}
