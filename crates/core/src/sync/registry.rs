//! Per-account sync run state

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sellersync_domain::{StartOutcome, SyncRun, SyncScope};
use uuid::Uuid;

/// Current or last run per account.
///
/// `try_begin` checks and flips the running flag under the map's shard lock,
/// so two concurrent starts for one account yield exactly one run.
#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: DashMap<Uuid, SyncRun>,
}

impl RunRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_begin(&self, account_id: Uuid, scope: SyncScope, window_days: u32) -> StartOutcome {
        match self.runs.entry(account_id) {
            Entry::Occupied(entry) if entry.get().running => StartOutcome::AlreadyRunning,
            Entry::Occupied(mut entry) => {
                entry.insert(SyncRun::started(account_id, scope, window_days));
                StartOutcome::Started
            }
            Entry::Vacant(entry) => {
                entry.insert(SyncRun::started(account_id, scope, window_days));
                StartOutcome::Started
            }
        }
    }

    #[must_use]
    pub fn get(&self, account_id: Uuid) -> Option<SyncRun> {
        self.runs.get(&account_id).map(|run| run.clone())
    }

    pub fn update(&self, account_id: Uuid, apply: impl FnOnce(&mut SyncRun)) {
        if let Some(mut run) = self.runs.get_mut(&account_id) {
            apply(run.value_mut());
        }
    }

    #[must_use]
    pub fn is_running(&self, account_id: Uuid) -> bool {
        self.runs.get(&account_id).is_some_and(|run| run.running)
    }

    #[must_use]
    pub fn running_count(&self) -> usize {
        self.runs.iter().filter(|run| run.running).count()
    }
}
