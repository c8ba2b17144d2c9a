//! Live decision reporting for watching principals

use dashmap::DashSet;
use std::sync::Arc;
use tracing::debug;

use crate::types::{Principal, PrincipalId};

/// Host channel that delivers decision reports to a watcher
pub trait VerboseSink: Send + Sync {
    fn notify(&self, watcher: PrincipalId, subject: &Principal, node: &str, granted: bool);
}

/// Principals that asked to see every decision as it happens
#[derive(Default)]
pub(crate) struct VerboseWatchers {
    watchers: DashSet<PrincipalId>,
    sink: Option<Arc<dyn VerboseSink>>,
}

impl VerboseWatchers {
    pub(crate) fn new(sink: Option<Arc<dyn VerboseSink>>) -> Self {
        Self {
            watchers: DashSet::new(),
            sink,
        }
    }

    pub(crate) fn add(&self, id: PrincipalId) -> bool {
        self.watchers.insert(id)
    }

    pub(crate) fn remove(&self, id: &PrincipalId) -> bool {
        self.watchers.remove(id).is_some()
    }

    pub(crate) fn contains(&self, id: &PrincipalId) -> bool {
        self.watchers.contains(id)
    }

    /// Send one decision to every watcher.
    ///
    /// Watchers are copied out first so the sink may call back into the
    /// facade (e.g. to stop watching) without holding a shard lock.
    pub(crate) fn report(&self, subject: &Principal, node: &str, granted: bool) {
        if self.watchers.is_empty() {
            return;
        }
        let Some(sink) = &self.sink else {
            debug!(node, granted, "Verbose watchers present but no sink configured");
            return;
        };
        let watchers: Vec<PrincipalId> = self.watchers.iter().map(|w| *w).collect();
        for watcher in watchers {
            sink.notify(watcher, subject, node, granted);
        }
    }
}
