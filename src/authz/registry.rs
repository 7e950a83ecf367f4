use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use super::builder::build_cache;
use super::cache::AuthorizationCache;
use crate::config::CacheMode;
use crate::error::Result;
use crate::store::Store;
use crate::types::TeamId;

/// The write side's handle on cached authorization state.
///
/// Anything that changes a team's ownerships must call `invalidate` before
/// reporting success. Hierarchy writes change what existing ownerships expand
/// to, so they call `invalidate_all`.
pub trait CacheInvalidator: Send + Sync {
    fn invalidate(&self, team_id: TeamId);
    fn invalidate_all(&self);
}

type Slot = Arc<Mutex<Option<Arc<AuthorizationCache>>>>;

/// Hands out authorization caches, either rebuilt per call or shared per team.
pub struct CacheRegistry {
    store: Arc<dyn Store>,
    mode: CacheMode,
    slots: DashMap<TeamId, Slot>,
}

impl CacheRegistry {
    pub fn new(store: Arc<dyn Store>, mode: CacheMode) -> Self {
        Self {
            store,
            mode,
            slots: DashMap::new(),
        }
    }

    /// Returns the team's cache, building it if needed.
    ///
    /// Concurrent callers for the same team wait on one build; other teams are
    /// not blocked.
    pub fn get(&self, team_id: TeamId) -> Result<Arc<AuthorizationCache>> {
        if self.mode == CacheMode::PerRequest {
            return build_cache(self.store.as_ref(), team_id).map(Arc::new);
        }

        let slot: Slot = self.slots.entry(team_id).or_default().value().clone();
        let mut guard = slot.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cache) = guard.as_ref() {
            return Ok(Arc::clone(cache));
        }

        let cache = Arc::new(build_cache(self.store.as_ref(), team_id)?);
        *guard = Some(Arc::clone(&cache));
        Ok(cache)
    }

    /// Number of teams with a live slot.
    #[must_use]
    pub fn cached_teams(&self) -> usize {
        self.slots.len()
    }
}

impl CacheInvalidator for CacheRegistry {
    fn invalidate(&self, team_id: TeamId) {
        // Dropping the slot detaches any in-flight build from future readers.
        if self.slots.remove(&team_id).is_some() {
            tracing::debug!(team_id, "invalidated authorization cache");
        }
    }

    fn invalidate_all(&self) {
        let teams = self.slots.len();
        self.slots.clear();
        tracing::debug!(teams, "invalidated every authorization cache");
    }
}
