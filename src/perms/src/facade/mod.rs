//! Public entry point combining the stores, the resolver and persistence
//!
//! # Architecture
//!
//! ```text
//! has_permission → PermissionResolver → AssignmentStore / FallbackPolicy
//!       ↓                  ↓
//!   decide()          GroupStore (inheritance chain)
//!       ↓
//! FallbackAuthority list (only when undecided) → VerboseSink
//! ```
//!
//! Mutations go straight to the stores and mark state dirty. Persistence
//! writes it back on `save`, on the autosave timer and on `shutdown`.

mod authority;
mod verbose;

pub use authority::{FallbackAuthority, TierAuthority};
pub use verbose::VerboseSink;

use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::assignment::AssignmentStore;
use crate::config::PermsConfig;
use crate::error::Result;
use crate::fallback::FallbackPolicy;
use crate::group::{Group, GroupStore};
use crate::persistence::{DataPaths, LoadStatus, PersistenceManager, SaveReport, SaveStatus};
use crate::resolver::{PermissionDetail, PermissionResolver};
use crate::types::{ChangeTracker, GameMode, Principal, PrincipalId, Tristate};

use verbose::VerboseWatchers;

/// Builds a [`PermissionFacade`] with its external collaborators
pub struct FacadeBuilder {
    config: PermsConfig,
    authorities: Vec<Arc<dyn FallbackAuthority>>,
    sink: Option<Arc<dyn VerboseSink>>,
}

impl FacadeBuilder {
    pub fn new(config: PermsConfig) -> Self {
        Self {
            config,
            authorities: Vec::new(),
            sink: None,
        }
    }

    /// Append an authority; earlier authorities are asked first
    pub fn authority(mut self, authority: Arc<dyn FallbackAuthority>) -> Self {
        self.authorities.push(authority);
        self
    }

    /// Channel for verbose decision reports
    pub fn verbose_sink(mut self, sink: Arc<dyn VerboseSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Wire everything up without touching the disk
    pub fn build(self) -> Result<PermissionFacade> {
        self.config.validate()?;

        let tracker = ChangeTracker::new();
        let groups = Arc::new(GroupStore::new(tracker.clone()));
        let assignments = Arc::new(AssignmentStore::new(tracker.clone()));
        let fallback = Arc::new(FallbackPolicy::new(tracker.clone()));

        let resolver = PermissionResolver::new(
            Arc::clone(&groups),
            Arc::clone(&assignments),
            Arc::clone(&fallback),
        );
        let persistence = PersistenceManager::new(
            DataPaths::new(self.config.data_dir()),
            Arc::clone(&groups),
            Arc::clone(&assignments),
            Arc::clone(&fallback),
            tracker.clone(),
        );

        Ok(PermissionFacade {
            config: self.config,
            tracker,
            groups,
            assignments,
            fallback,
            resolver,
            persistence,
            authorities: self.authorities,
            verbose: VerboseWatchers::new(self.sink),
        })
    }

    /// Build and load from disk. Any load failure is returned; hosts treat it
    /// as fatal at startup.
    pub async fn open(self) -> Result<Arc<PermissionFacade>> {
        let facade = self.build()?;
        facade.persistence.load().await?;
        info!(
            root = %facade.persistence.paths().root.display(),
            groups = facade.groups.len(),
            authorities = facade.authorities.len(),
            "Permission engine ready"
        );
        Ok(Arc::new(facade))
    }
}

/// The permission engine as seen by a host
pub struct PermissionFacade {
    config: PermsConfig,
    tracker: ChangeTracker,
    groups: Arc<GroupStore>,
    assignments: Arc<AssignmentStore>,
    fallback: Arc<FallbackPolicy>,
    resolver: PermissionResolver,
    persistence: PersistenceManager,
    authorities: Vec<Arc<dyn FallbackAuthority>>,
    verbose: VerboseWatchers,
}

impl PermissionFacade {
    pub fn builder(config: PermsConfig) -> FacadeBuilder {
        FacadeBuilder::new(config)
    }

    pub fn config(&self) -> &PermsConfig {
        &self.config
    }

    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }

    pub fn is_dirty(&self) -> bool {
        self.tracker.is_dirty()
    }

    // ------------------------------------------------------------------
    // Decisions
    // ------------------------------------------------------------------

    /// What the groups say, without consulting any authority
    pub fn has_permission(&self, principal: &Principal, node: &str) -> Tristate {
        self.resolver.has_permission(principal, node)
    }

    /// Final decision: the groups first, then each authority in order.
    /// Denied when nobody decides.
    pub fn decide(&self, principal: &Principal, node: &str) -> bool {
        let mut result = self.resolver.has_permission(principal, node);

        if !result.is_decided() {
            result = self
                .authorities
                .iter()
                .map(|a| a.check(principal, node))
                .find(|r| r.is_decided())
                .unwrap_or(Tristate::Undecided);
            debug!(principal = %principal.id, node, %result, "Deferred to fallback authorities");
        }

        let granted = result.unwrap_or(false);
        self.verbose.report(principal, node, granted);
        granted
    }

    /// Nodes known to the fallback authorities, sorted and deduplicated
    pub fn registered_nodes(&self) -> Vec<String> {
        let mut nodes: Vec<String> = self
            .authorities
            .iter()
            .flat_map(|a| a.registered_nodes())
            .collect();
        nodes.sort();
        nodes.dedup();
        nodes
    }

    /// Give a never-seen principal the fallback group of its tier
    pub fn init_for_first_time<F>(&self, principal: &Principal, on_assigned: F) -> Option<String>
    where
        F: FnOnce(&str),
    {
        self.resolver.init_for_first_time(principal, on_assigned)
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    pub fn create_group(&self, name: &str) -> bool {
        self.groups.create_group(name)
    }

    /// Assign a principal; `""` means "explicitly no group"
    pub fn assign_user_to_group(&self, id: PrincipalId, group: &str) -> bool {
        self.assignments.assign(id, group)
    }

    /// Drop the assignment so the fallback policy applies again
    pub fn unassign(&self, id: &PrincipalId) -> bool {
        self.assignments.unassign(id)
    }

    pub fn grant(&self, group: &str, node: &str, value: bool) -> bool {
        self.groups.grant(group, node, value)
    }

    pub fn revoke(&self, group: &str, node: &str) -> bool {
        self.groups.revoke(group, node)
    }

    pub fn add_parent(&self, group: &str, parent: &str) -> bool {
        self.groups.add_parent(group, parent)
    }

    pub fn remove_parent(&self, group: &str, parent: &str) -> bool {
        self.groups.remove_parent(group, parent)
    }

    /// Store `text` as the group prefix: parsed as JSON when it is JSON,
    /// kept as a plain string otherwise
    pub fn set_prefix(&self, group: &str, text: &str) -> bool {
        let prefix = serde_json::from_str::<Value>(text)
            .unwrap_or_else(|_| Value::String(text.to_string()));
        self.groups.set_prefix(group, prefix)
    }

    pub fn set_game_type(&self, group: &str, mode: GameMode) -> bool {
        self.groups.set_game_type(group, mode)
    }

    pub fn set_fallback_group(&self, tier: u32, group: &str) {
        self.fallback.set(tier, group);
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn has_group(&self, name: &str) -> bool {
        self.groups.has_group(name)
    }

    /// All group names, sorted
    pub fn groups(&self) -> Vec<String> {
        self.groups.names()
    }

    /// Stored group, or the virtual empty group
    pub fn group(&self, name: &str) -> Arc<Group> {
        self.groups.get_group(name)
    }

    pub fn reverse_lookup(&self, group: &str) -> Vec<PrincipalId> {
        self.assignments.reverse_lookup(group)
    }

    pub fn parents_of(&self, group: &str) -> Vec<String> {
        self.groups.parents_of(group)
    }

    pub fn permission_nodes(&self, group: &str) -> Vec<String> {
        self.groups.permission_nodes(group)
    }

    pub fn permission_details(&self, group: &str) -> Vec<PermissionDetail> {
        self.resolver.permission_details(group)
    }

    pub fn prefix(&self, group: &str) -> Value {
        self.groups.prefix(group)
    }

    pub fn game_type(&self, group: &str) -> Option<String> {
        self.groups.game_type(group)
    }

    /// Fallback group for an unassigned principal of `tier`
    pub fn fallback_group(&self, tier: u32) -> String {
        self.fallback.resolve(tier)
    }

    pub fn fallback_group_for(&self, principal: &Principal) -> String {
        self.fallback.resolve(principal.tier)
    }

    /// Group the principal currently resolves to
    pub fn group_of(&self, principal: &Principal) -> String {
        self.resolver.group_of(principal)
    }

    // ------------------------------------------------------------------
    // Verbose reporting
    // ------------------------------------------------------------------

    pub fn verbose(&self, watcher: PrincipalId) -> bool {
        self.verbose.add(watcher)
    }

    pub fn stop_verbose(&self, watcher: &PrincipalId) -> bool {
        self.verbose.remove(watcher)
    }

    pub fn is_verbose(&self, watcher: &PrincipalId) -> bool {
        self.verbose.contains(watcher)
    }

    /// Flip verbose reporting, returning whether it is now on
    pub fn toggle_verbose(&self, watcher: PrincipalId) -> bool {
        if self.verbose.remove(&watcher) {
            false
        } else {
            self.verbose.add(watcher)
        }
    }

    // ------------------------------------------------------------------
    // Persistence and lifecycle
    // ------------------------------------------------------------------

    /// Replace in-memory state with the files on disk
    pub async fn reload(&self) -> Result<LoadStatus> {
        self.persistence.load().await
    }

    /// Reload on a background task and hand the outcome to `feedback`
    pub fn reload_in_background<F>(self: &Arc<Self>, feedback: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<LoadStatus>) + Send + 'static,
    {
        let facade = Arc::clone(self);
        tokio::spawn(async move {
            let result = facade.persistence.load().await;
            if let Err(e) = &result {
                error!(error = %e, "Failed to reload permission data");
            }
            feedback(result);
        })
    }

    /// Write everything to disk now
    pub async fn save(&self) -> Result<SaveReport> {
        self.persistence.save().await
    }

    /// One autosave pass: write if needed, log and swallow failures
    pub async fn autosave(&self) -> Option<SaveReport> {
        let result = if self.config.skip_clean_saves {
            self.persistence.save_if_dirty().await
        } else {
            self.persistence.save().await
        };

        match result {
            Ok(report) => {
                if report.status == SaveStatus::Saved {
                    debug!(took_ms = report.took.as_millis() as u64, "Auto saved permission data");
                }
                Some(report)
            }
            Err(e) => {
                error!(error = %e, "Failed to auto save permission data");
                None
            }
        }
    }

    /// Start the periodic autosave task, or `None` when disabled
    pub fn spawn_autosave(self: &Arc<Self>) -> Option<AutosaveHandle> {
        let period = self.config.autosave_interval()?;
        Some(AutosaveHandle::spawn(Arc::clone(self), period))
    }

    /// Final save on host shutdown; failures are logged, never raised
    pub async fn shutdown(&self) -> Option<SaveReport> {
        info!("Saving permission data before shutdown");
        match self.persistence.save().await {
            Ok(report) => Some(report),
            Err(e) => {
                error!(error = %e, "Failed to save permission data on shutdown");
                None
            }
        }
    }
}

/// Running autosave task
pub struct AutosaveHandle {
    shutdown: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl AutosaveHandle {
    fn spawn(facade: Arc<PermissionFacade>, period: Duration) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&shutdown);

        let task = tokio::spawn(async move {
            info!("Starting autosave with interval: {:?}", period);
            let mut ticker = tokio::time::interval(period);
            // First tick completes immediately
            ticker.tick().await;

            while !stop.load(Ordering::Relaxed) {
                ticker.tick().await;
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                facade.autosave().await;
            }

            info!("Autosave stopped");
        });

        Self { shutdown, task }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the task without waiting for a pending tick. An autosave cut
    /// short here leaves the state dirty for the shutdown save.
    pub fn stop(self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_does_not_touch_disk() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("perms");
        let facade = PermissionFacade::builder(PermsConfig::with_data_dir(&data_dir))
            .build()
            .unwrap();

        assert!(facade.groups().is_empty());
        assert!(!data_dir.exists());
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        assert!(PermissionFacade::builder(PermsConfig::with_data_dir(""))
            .build()
            .is_err());
    }

    #[test]
    fn test_set_prefix_accepts_json_or_text() {
        let facade = PermissionFacade::builder(PermsConfig::default())
            .build()
            .unwrap();
        facade.create_group("admin");

        facade.set_prefix("admin", r#"{"text":"[A] ","color":"red"}"#);
        assert_eq!(facade.prefix("admin")["color"], "red");

        facade.set_prefix("admin", "[A] ");
        assert_eq!(facade.prefix("admin"), Value::String("[A] ".to_string()));
    }

    #[test]
    fn test_toggle_verbose() {
        let facade = PermissionFacade::builder(PermsConfig::default())
            .build()
            .unwrap();
        let id = uuid::Uuid::new_v4();

        assert!(facade.toggle_verbose(id));
        assert!(facade.is_verbose(&id));
        assert!(!facade.toggle_verbose(id));
        assert!(!facade.is_verbose(&id));
    }
}
