//! Core permission types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::PermsError;

/// Unique principal identifier
pub type PrincipalId = Uuid;

/// Permission node, e.g. `"world.edit"`
pub type Node = String;

/// A principal asking for a decision.
///
/// The privilege tier only matters when the principal has no explicit group
/// assignment; it then picks the fallback group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    /// Principal identifier
    pub id: PrincipalId,

    /// Privilege tier (operator level)
    #[serde(default)]
    pub tier: u32,
}

impl Principal {
    /// Create a tier-0 principal
    pub fn new(id: PrincipalId) -> Self {
        Self { id, tier: 0 }
    }

    /// Set the privilege tier
    pub fn with_tier(mut self, tier: u32) -> Self {
        self.tier = tier;
        self
    }
}

impl From<Uuid> for Principal {
    fn from(id: Uuid) -> Self {
        Self::new(id)
    }
}

/// Tri-state permission value.
///
/// `Undecided` means no group in the chain defines the node. It is never the
/// same as `Denied`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tristate {
    /// Permission granted
    Granted,
    /// Permission denied
    Denied,
    /// Nothing defines the node
    Undecided,
}

impl Tristate {
    /// Map a defined/undefined boolean onto the tri-state
    pub fn from_option(value: Option<bool>) -> Self {
        match value {
            Some(true) => Tristate::Granted,
            Some(false) => Tristate::Denied,
            None => Tristate::Undecided,
        }
    }

    pub fn as_option(self) -> Option<bool> {
        match self {
            Tristate::Granted => Some(true),
            Tristate::Denied => Some(false),
            Tristate::Undecided => None,
        }
    }

    pub fn is_decided(self) -> bool {
        self != Tristate::Undecided
    }

    /// Collapse to a boolean, using `default` when undecided
    pub fn unwrap_or(self, default: bool) -> bool {
        self.as_option().unwrap_or(default)
    }
}

impl From<bool> for Tristate {
    fn from(value: bool) -> Self {
        Tristate::from_option(Some(value))
    }
}

impl fmt::Display for Tristate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tristate::Granted => "granted",
            Tristate::Denied => "denied",
            Tristate::Undecided => "undecided",
        };
        f.write_str(s)
    }
}

/// Game mode a first-time member of a group is switched to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    #[default]
    Survival,
    Creative,
    Adventure,
    Spectator,
}

impl GameMode {
    pub fn as_str(self) -> &'static str {
        match self {
            GameMode::Survival => "survival",
            GameMode::Creative => "creative",
            GameMode::Adventure => "adventure",
            GameMode::Spectator => "spectator",
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameMode {
    type Err = PermsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "survival" => Ok(GameMode::Survival),
            "creative" => Ok(GameMode::Creative),
            "adventure" => Ok(GameMode::Adventure),
            "spectator" => Ok(GameMode::Spectator),
            other => Err(PermsError::InvalidInput(format!("Unknown game mode: {}", other))),
        }
    }
}

/// Dirty flag shared by every store.
///
/// Set whenever in-memory state diverges from the last successful save.
#[derive(Debug, Clone, Default)]
pub struct ChangeTracker {
    dirty: Arc<AtomicBool>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag state as diverged from disk
    pub fn mark(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Clear the flag, returning whether it was set
    pub fn take(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }
}
