//! Host-supplied authorities consulted for undecided queries

use dashmap::DashMap;
use std::collections::HashMap;

use crate::types::{Principal, Tristate};

/// A permission authority outside this engine.
///
/// The facade queries its authorities in order only when the groups leave a
/// node undecided; the first definite answer wins.
pub trait FallbackAuthority: Send + Sync {
    /// Decision for `principal` on `node`, or `Undecided` to pass it on
    fn check(&self, principal: &Principal, node: &str) -> Tristate;

    /// Nodes this authority knows about
    fn registered_nodes(&self) -> Vec<String>;
}

/// Grants registered nodes to principals at or above a minimum privilege tier.
///
/// Nodes registered without a tier are open to everyone. Unregistered nodes
/// stay undecided.
#[derive(Debug, Default)]
pub struct TierAuthority {
    nodes: DashMap<String, Option<u32>>,
}

impl TierAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(node, minimum tier)` pairs
    pub fn from_nodes(nodes: HashMap<String, Option<u32>>) -> Self {
        let authority = Self::new();
        for (node, min_tier) in nodes {
            authority.register(&node, min_tier);
        }
        authority
    }

    /// Register `node`, requiring `min_tier` (or nothing when `None`)
    pub fn register(&self, node: &str, min_tier: Option<u32>) {
        self.nodes.insert(node.to_string(), min_tier);
    }
}

impl FallbackAuthority for TierAuthority {
    fn check(&self, principal: &Principal, node: &str) -> Tristate {
        match self.nodes.get(node).map(|n| *n.value()) {
            Some(None) => Tristate::Granted,
            Some(Some(min_tier)) => Tristate::from(principal.tier >= min_tier),
            None => Tristate::Undecided,
        }
    }

    fn registered_nodes(&self) -> Vec<String> {
        let mut nodes: Vec<String> = self.nodes.iter().map(|e| e.key().clone()).collect();
        nodes.sort();
        nodes
    }
}
