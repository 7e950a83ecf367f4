use std::collections::BTreeMap;

use serde::Serialize;

use super::ids::{Ids, ScopedIds};
use crate::types::{Privilege, PrivilegeShape, ResourceId, TeamId};

/// One privilege's allowed ids, stored in the shape the privilege requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "shape", content = "ids", rename_all = "snake_case")]
pub enum CacheEntry {
    Unscoped(Ids),
    ByEnvironment(ScopedIds),
    ByTenant(ScopedIds),
}

impl CacheEntry {
    fn for_shape(shape: PrivilegeShape) -> Self {
        match shape {
            PrivilegeShape::Unscoped => Self::Unscoped(Ids::empty()),
            PrivilegeShape::ByEnvironment => Self::ByEnvironment(ScopedIds::default()),
            PrivilegeShape::ByTenant => Self::ByTenant(ScopedIds::default()),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Self::Unscoped(ids) => ids.is_empty(),
            Self::ByEnvironment(scoped) | Self::ByTenant(scoped) => scoped.is_empty(),
        }
    }
}

/// A single contribution of one ownership to one privilege.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Grant {
    /// Every id under every scope key.
    Global,
    /// Ids of an unscoped privilege.
    Ids(Ids),
    /// Ids under one environment or tenant id.
    Scoped(ResourceId, Ids),
}

/// Per-team map from privilege to allowed ids.
///
/// A privilege with no entry grants nothing. Empty sets are never stored, so
/// absence is the only representation of "no access".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationCache {
    team_id: TeamId,
    entries: BTreeMap<Privilege, CacheEntry>,
}

impl AuthorizationCache {
    #[must_use]
    pub fn new(team_id: TeamId) -> Self {
        Self {
            team_id,
            entries: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn team_id(&self) -> TeamId {
        self.team_id
    }

    #[must_use]
    pub fn entry(&self, privilege: Privilege) -> Option<&CacheEntry> {
        self.entries.get(&privilege)
    }

    pub fn privileges(&self) -> impl Iterator<Item = Privilege> + '_ {
        self.entries.keys().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Unions a grant into the privilege's entry.
    ///
    /// # Panics
    ///
    /// Panics if an unscoped grant is applied to a scoped privilege or the reverse.
    pub(crate) fn grant(&mut self, privilege: Privilege, grant: Grant) {
        let entry = self
            .entries
            .entry(privilege)
            .or_insert_with(|| CacheEntry::for_shape(privilege.shape()));

        match (entry, grant) {
            (CacheEntry::Unscoped(ids), Grant::Global) => *ids = Ids::All,
            (CacheEntry::Unscoped(ids), Grant::Ids(more)) => ids.union_with(more),
            (CacheEntry::ByEnvironment(scoped) | CacheEntry::ByTenant(scoped), Grant::Global) => {
                scoped.grant_all_scopes();
            }
            (
                CacheEntry::ByEnvironment(scoped) | CacheEntry::ByTenant(scoped),
                Grant::Scoped(scope, more),
            ) => scoped.grant(scope, more),
            (entry, grant) => {
                panic!("grant {grant:?} does not fit {privilege} stored as {entry:?}")
            }
        }

        if self.entries.get(&privilege).is_some_and(CacheEntry::is_empty) {
            self.entries.remove(&privilege);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_grants_leave_no_entry() {
        let mut cache = AuthorizationCache::new(1);
        cache.grant(Privilege::EnvironmentRead, Grant::Ids(Ids::empty()));
        cache.grant(Privilege::OdsRead, Grant::Scoped(3, Ids::empty()));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_global_grant_per_shape() {
        let mut cache = AuthorizationCache::new(1);
        cache.grant(Privilege::EnvironmentRead, Grant::Global);
        cache.grant(Privilege::TenantRead, Grant::Global);
        assert_eq!(
            cache.entry(Privilege::EnvironmentRead),
            Some(&CacheEntry::Unscoped(Ids::All))
        );
        match cache.entry(Privilege::TenantRead) {
            Some(CacheEntry::ByEnvironment(scoped)) => assert!(scoped.is_all_scopes()),
            other => panic!("unexpected entry {other:?}"),
        }
    }

    #[test]
    fn test_grants_are_unioned() {
        let mut cache = AuthorizationCache::new(1);
        cache.grant(Privilege::OdsRead, Grant::Scoped(3, Ids::from_ids([1])));
        cache.grant(Privilege::OdsRead, Grant::Scoped(3, Ids::from_ids([2])));
        match cache.entry(Privilege::OdsRead) {
            Some(CacheEntry::ByTenant(scoped)) => assert_eq!(scoped.get(3), Ids::from_ids([1, 2])),
            other => panic!("unexpected entry {other:?}"),
        }
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn test_shape_mismatch_panics() {
        let mut cache = AuthorizationCache::new(1);
        cache.grant(Privilege::OdsRead, Grant::Ids(Ids::All));
    }
}
