//! Group definition

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::types::GameMode;

/// A named group of permissions.
///
/// `parents` keeps insertion order without duplicates; the order decides which
/// parent wins when two of them define the same node. A parent may name a
/// group that does not exist, or the group itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    /// Unique group name
    #[serde(default)]
    pub name: String,

    /// Formatted text shown before member names. Never interpreted here.
    #[serde(default = "default_prefix")]
    pub prefix: Value,

    /// Game mode tag for first-time members, persisted verbatim
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Groups to consult when a node is not defined here
    #[serde(default)]
    pub parents: Vec<String>,

    /// Node -> value. A missing key means "not defined here", not denied.
    #[serde(default)]
    pub permissions: BTreeMap<String, bool>,
}

fn default_prefix() -> Value {
    Value::String(String::new())
}

fn default_mode() -> String {
    GameMode::default().as_str().to_string()
}

impl Group {
    /// Create an empty group with default prefix and mode
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: default_prefix(),
            mode: default_mode(),
            parents: Vec::new(),
            permissions: BTreeMap::new(),
        }
    }

    /// Value this group itself defines for `node`
    pub fn permission(&self, node: &str) -> Option<bool> {
        self.permissions.get(node).copied()
    }

    pub fn defines(&self, node: &str) -> bool {
        self.permissions.contains_key(node)
    }

    pub fn has_parent(&self, parent: &str) -> bool {
        self.parents.iter().any(|p| p == parent)
    }

    /// Upsert a node, returning whether the stored value changed
    pub fn set_permission(&mut self, node: &str, value: bool) -> bool {
        self.permissions.insert(node.to_string(), value) != Some(value)
    }

    /// Remove a node, returning whether it was present
    pub fn remove_permission(&mut self, node: &str) -> bool {
        self.permissions.remove(node).is_some()
    }

    /// Append a parent, returning whether the set changed
    pub fn add_parent(&mut self, parent: &str) -> bool {
        if self.has_parent(parent) {
            return false;
        }
        self.parents.push(parent.to_string());
        true
    }

    /// Drop a parent, returning whether the set changed
    pub fn remove_parent(&mut self, parent: &str) -> bool {
        let before = self.parents.len();
        self.parents.retain(|p| p != parent);
        self.parents.len() != before
    }

    /// Drop duplicate parents left over from hand-edited data files
    pub(crate) fn dedup_parents(&mut self) {
        let mut seen = Vec::with_capacity(self.parents.len());
        self.parents.retain(|p| {
            if seen.contains(p) {
                false
            } else {
                seen.push(p.clone());
                true
            }
        });
    }
}

impl Default for Group {
    fn default() -> Self {
        Self::new(String::new())
    }
}
