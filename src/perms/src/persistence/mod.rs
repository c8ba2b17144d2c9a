//! Durable storage for groups, assignments and the fallback table
//!
//! Three JSON files live under the data directory:
//!
//! - `player_data.dat`: principal id -> group name
//! - `group_data.dat`: group name -> group definition
//! - `default_groups.dat`: privilege tier (as a string) -> group name
//!
//! A legacy `default_group.dat` holding a single raw group name is migrated
//! into tier 0 of the fallback table on load, then deleted once the new
//! table has been written.
//!
//! Load and save each have a single-flight flag instead of a lock: a call
//! that arrives while another of the same kind is running does nothing and
//! reports `Busy`. Readers and mutators are never blocked by either.

mod codec;

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::assignment::AssignmentStore;
use crate::error::Result;
use crate::fallback::FallbackPolicy;
use crate::group::{Group, GroupStore};
use crate::types::{ChangeTracker, PrincipalId};

use codec::{normalize_groups, read_json, read_legacy_name, write_json};

pub const PLAYER_DATA_FILE: &str = "player_data.dat";
pub const GROUP_DATA_FILE: &str = "group_data.dat";
pub const FALLBACK_GROUPS_FILE: &str = "default_groups.dat";
pub const LEGACY_FALLBACK_FILE: &str = "default_group.dat";

/// Locations of the data files under one root directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub root: PathBuf,
    pub player_data: PathBuf,
    pub group_data: PathBuf,
    pub fallback_groups: PathBuf,
    pub legacy_fallback: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            player_data: root.join(PLAYER_DATA_FILE),
            group_data: root.join(GROUP_DATA_FILE),
            fallback_groups: root.join(FALLBACK_GROUPS_FILE),
            legacy_fallback: root.join(LEGACY_FALLBACK_FILE),
            root,
        }
    }
}

/// Outcome of a load request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// Files were read into the stores
    Loaded,
    /// Another load was running; this request was dropped
    Busy,
}

/// Outcome of a save request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    /// All three files were written
    Saved,
    /// Nothing changed since the last save; nothing was written
    Clean,
    /// Another save was running; this request was dropped
    Busy,
}

/// Save outcome with timing for operator feedback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub status: SaveStatus,

    /// Time spent writing
    pub took: Duration,

    /// Completion time of a successful write
    pub saved_at: Option<DateTime<Utc>>,
}

impl SaveReport {
    fn skipped(status: SaveStatus) -> Self {
        Self {
            status,
            took: Duration::ZERO,
            saved_at: None,
        }
    }
}

/// Releases a single-flight flag when dropped, including on error paths
struct FlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> FlightGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Clears the dirty flag for the duration of a write and sets it again on
/// drop unless the write was committed. Covers errors and cancellation.
struct PendingWrite<'a> {
    tracker: &'a ChangeTracker,
    committed: bool,
}

impl<'a> PendingWrite<'a> {
    fn begin(tracker: &'a ChangeTracker) -> Self {
        tracker.take();
        Self {
            tracker,
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PendingWrite<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.tracker.mark();
        }
    }
}

/// Loads and saves the three stores
#[derive(Debug)]
pub struct PersistenceManager {
    paths: DataPaths,
    groups: Arc<GroupStore>,
    assignments: Arc<AssignmentStore>,
    fallback: Arc<FallbackPolicy>,
    tracker: ChangeTracker,
    loading: AtomicBool,
    saving: AtomicBool,
}

impl PersistenceManager {
    pub fn new(
        paths: DataPaths,
        groups: Arc<GroupStore>,
        assignments: Arc<AssignmentStore>,
        fallback: Arc<FallbackPolicy>,
        tracker: ChangeTracker,
    ) -> Self {
        Self {
            paths,
            groups,
            assignments,
            fallback,
            tracker,
            loading: AtomicBool::new(false),
            saving: AtomicBool::new(false),
        }
    }

    pub fn paths(&self) -> &DataPaths {
        &self.paths
    }

    pub fn is_dirty(&self) -> bool {
        self.tracker.is_dirty()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::Acquire)
    }

    /// Read every present file, replacing the matching store wholesale.
    ///
    /// Missing files are materialized with the current (default) contents by
    /// an immediate save. I/O and decode errors are returned to the caller.
    pub async fn load(&self) -> Result<LoadStatus> {
        let Some(_guard) = FlightGuard::try_acquire(&self.loading) else {
            warn!("Load already in progress, request dropped");
            return Ok(LoadStatus::Busy);
        };

        info!(root = %self.paths.root.display(), "Loading permission data");
        let mut missing = false;

        match read_json::<BTreeMap<PrincipalId, String>>(&self.paths.player_data).await? {
            Some(users) => {
                debug!(count = users.len(), "Loaded assignments");
                self.assignments.replace_all(users);
            }
            None => missing = true,
        }

        match read_json::<BTreeMap<String, Group>>(&self.paths.group_data).await? {
            Some(raw) => {
                let groups = normalize_groups(raw);
                debug!(count = groups.len(), "Loaded groups");
                self.groups.replace_all(groups);
            }
            None => missing = true,
        }

        match read_json::<BTreeMap<u32, String>>(&self.paths.fallback_groups).await? {
            Some(table) => {
                debug!(tiers = table.len(), "Loaded fallback table");
                self.fallback.replace_all(table);
            }
            None => missing = true,
        }

        let migrated = match read_legacy_name(&self.paths.legacy_fallback).await? {
            Some(name) => {
                info!(group = %name, "Migrating legacy fallback group into tier 0");
                self.fallback.set(0, &name);
                true
            }
            None => false,
        };

        if missing || migrated {
            let report = self.save().await?;
            if migrated && report.status == SaveStatus::Saved {
                self.remove_legacy().await?;
            }
        }

        info!(
            groups = self.groups.len(),
            assignments = self.assignments.len(),
            "Permission data loaded"
        );
        Ok(LoadStatus::Loaded)
    }

    /// Write all three files and clear the dirty flag.
    ///
    /// The flag is cleared before the snapshot is taken so mutations racing
    /// the write stay dirty; it is set again if the write fails or the
    /// future is dropped before the write completes.
    pub async fn save(&self) -> Result<SaveReport> {
        let Some(_guard) = FlightGuard::try_acquire(&self.saving) else {
            debug!("Save already in progress, request dropped");
            return Ok(SaveReport::skipped(SaveStatus::Busy));
        };

        let start = Instant::now();
        let pending = PendingWrite::begin(&self.tracker);
        self.write_all().await?;
        pending.commit();

        let took = start.elapsed();
        debug!(took_ms = took.as_millis() as u64, "Saved permission data");
        Ok(SaveReport {
            status: SaveStatus::Saved,
            took,
            saved_at: Some(Utc::now()),
        })
    }

    /// Save only when state diverged from disk
    pub async fn save_if_dirty(&self) -> Result<SaveReport> {
        if !self.tracker.is_dirty() {
            return Ok(SaveReport::skipped(SaveStatus::Clean));
        }
        self.save().await
    }

    async fn write_all(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.paths.root).await?;

        let users = self.assignments.snapshot();
        let groups = self.groups.snapshot();
        let table = self.fallback.snapshot();

        write_json(&self.paths.player_data, &users).await?;
        write_json(&self.paths.group_data, &groups).await?;
        write_json(&self.paths.fallback_groups, &table).await?;
        Ok(())
    }

    async fn remove_legacy(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.paths.legacy_fallback).await {
            Ok(()) => {
                info!(path = %self.paths.legacy_fallback.display(), "Removed legacy fallback file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
