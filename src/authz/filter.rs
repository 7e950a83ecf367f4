use rusqlite::types::Value;
use serde::Deserialize;

use super::cache::{AuthorizationCache, CacheEntry};
use super::ids::{AuthKey, EdOrgKey, Ids};
use crate::types::{Action, AdminApiVersion, Privilege, ResourceId};

/// Scope keys a request carries on its route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ScopeParams {
    pub environment_id: Option<ResourceId>,
    pub tenant_id: Option<ResourceId>,
}

impl ScopeParams {
    #[must_use]
    pub fn environment(environment_id: ResourceId) -> Self {
        Self {
            environment_id: Some(environment_id),
            tenant_id: None,
        }
    }

    #[must_use]
    pub fn tenant(tenant_id: ResourceId) -> Self {
        Self {
            environment_id: None,
            tenant_id: Some(tenant_id),
        }
    }
}

impl AuthorizationCache {
    /// Allowed ids for `privilege` under the request's scope.
    ///
    /// Absent privileges and absent scope keys both yield the empty set. A scoped
    /// privilege asked for without its scope parameter also yields the empty set.
    #[must_use]
    pub fn extract(&self, privilege: Privilege, params: &ScopeParams) -> Ids {
        let Some(entry) = self.entry(privilege) else {
            return Ids::empty();
        };

        let (scoped, scope) = match entry {
            CacheEntry::Unscoped(ids) => return ids.clone(),
            CacheEntry::ByEnvironment(scoped) => (scoped, params.environment_id),
            CacheEntry::ByTenant(scoped) => (scoped, params.tenant_id),
        };

        match scope {
            Some(scope) => scoped.get(scope),
            None => {
                tracing::warn!(
                    team_id = self.team_id(),
                    privilege = %privilege,
                    "scoped privilege extracted without its scope parameter"
                );
                Ids::empty()
            }
        }
    }
}

/// Storage-level predicate derived from an [`Ids`] value.
///
/// The only way to obtain one is [`Ids::to_query_filter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFilter(FilterKind);

#[derive(Debug, Clone, PartialEq, Eq)]
enum FilterKind {
    Unrestricted,
    OneOf(Vec<AuthKey>),
}

impl Ids {
    #[must_use]
    pub fn to_query_filter(&self) -> QueryFilter {
        match self {
            Ids::All => QueryFilter(FilterKind::Unrestricted),
            Ids::Set(set) => QueryFilter(FilterKind::OneOf(set.iter().copied().collect())),
        }
    }
}

impl QueryFilter {
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        matches!(self.0, FilterKind::Unrestricted)
    }

    /// Renders the predicate against `column` as a SQL fragment and its parameters.
    ///
    /// An empty id list renders as a predicate that matches nothing.
    #[must_use]
    pub fn to_sql(&self, column: &str) -> (String, Vec<Value>) {
        match &self.0 {
            FilterKind::Unrestricted => ("1 = 1".to_string(), Vec::new()),
            FilterKind::OneOf(keys) if keys.is_empty() => ("1 = 0".to_string(), Vec::new()),
            FilterKind::OneOf(keys) => {
                let placeholders = vec!["?"; keys.len()].join(", ");
                let params = keys
                    .iter()
                    .map(|key| match key {
                        AuthKey::Id(id) => Value::Integer(*id),
                        AuthKey::EdOrg(key) => Value::Text(key.to_string()),
                    })
                    .collect();
                (format!("{column} IN ({placeholders})"), params)
            }
        }
    }
}

/// Application key for v1 environments, where an edorg id is unique per tenant.
#[must_use]
pub fn edorg_key_v1(education_organization_id: i64) -> EdOrgKey {
    EdOrgKey {
        ods_instance_id: None,
        education_organization_id,
    }
}

/// Application key for v2 environments, where edorgs are qualified by ODS instance.
#[must_use]
pub fn edorg_key_v2(ods_instance_id: i64, education_organization_id: i64) -> EdOrgKey {
    EdOrgKey {
        ods_instance_id: Some(ods_instance_id),
        education_organization_id,
    }
}

/// An (ODS instance, edorg) pair implicated by an Admin API resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EdOrgPair {
    #[serde(default)]
    pub ods_instance_id: Option<i64>,
    pub education_organization_id: i64,
}

impl EdOrgPair {
    /// Key for this pair under `version`. A v2 pair without an instance id has no key.
    #[must_use]
    pub fn key(&self, version: AdminApiVersion) -> Option<EdOrgKey> {
        match version {
            AdminApiVersion::V1 => Some(edorg_key_v1(self.education_organization_id)),
            AdminApiVersion::V2 => self
                .ods_instance_id
                .map(|ods| edorg_key_v2(ods, self.education_organization_id)),
        }
    }
}

/// Existential check for reads: authorized for at least one implicated key.
#[must_use]
pub fn check_safe(ids: &Ids, keys: &[EdOrgKey]) -> bool {
    ids.is_all() || keys.iter().any(|k| ids.contains_key(&AuthKey::EdOrg(*k)))
}

/// Universal check for mutations: authorized for every implicated key.
///
/// A resource that implicates nothing is only mutable under an `All` grant.
#[must_use]
pub fn check_unsafe(ids: &Ids, keys: &[EdOrgKey]) -> bool {
    ids.is_all() || (!keys.is_empty() && keys.iter().all(|k| ids.contains_key(&AuthKey::EdOrg(*k))))
}

/// Dispatches to the safe or unsafe check by the action being attempted.
#[must_use]
pub fn check_composite(ids: &Ids, action: Action, keys: &[EdOrgKey]) -> bool {
    if action.is_safe() {
        check_safe(ids, keys)
    } else {
        check_unsafe(ids, keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_filter_all_is_unrestricted() {
        let filter = Ids::All.to_query_filter();
        assert!(filter.is_unrestricted());
        assert_eq!(filter.to_sql("id"), ("1 = 1".to_string(), vec![]));
    }

    #[test]
    fn test_query_filter_set() {
        let (sql, params) = Ids::from_ids([3, 1]).to_query_filter().to_sql("t.id");
        assert_eq!(sql, "t.id IN (?, ?)");
        assert_eq!(params, vec![Value::Integer(1), Value::Integer(3)]);
    }

    #[test]
    fn test_query_filter_empty_matches_nothing() {
        let (sql, params) = Ids::empty().to_query_filter().to_sql("id");
        assert_eq!(sql, "1 = 0");
        assert!(params.is_empty());
    }

    #[test]
    fn test_v1_and_v2_keys_differ() {
        assert_ne!(edorg_key_v1(255901), edorg_key_v2(1, 255901));
        assert_eq!(edorg_key_v2(1, 255901).to_string(), "1-255901");
        assert_eq!(edorg_key_v1(255901).to_string(), "255901");
    }

    #[test]
    fn test_safe_unsafe_asymmetry() {
        let ids = Ids::from_keys([AuthKey::EdOrg(edorg_key_v2(1, 100))]);
        let keys = [edorg_key_v2(1, 100), edorg_key_v2(2, 200)];
        assert!(check_safe(&ids, &keys));
        assert!(!check_unsafe(&ids, &keys));
        assert!(check_composite(&ids, Action::Read, &keys));
        assert!(!check_composite(&ids, Action::Update, &keys));
    }

    #[test]
    fn test_wrong_key_version_never_matches() {
        let ids = Ids::from_keys([AuthKey::EdOrg(edorg_key_v2(1, 100))]);
        assert!(!check_safe(&ids, &[edorg_key_v1(100)]));
    }

    #[test]
    fn test_empty_implicated_set() {
        assert!(!check_safe(&Ids::empty(), &[]));
        assert!(!check_unsafe(&Ids::from_ids([1]), &[]));
        assert!(check_unsafe(&Ids::All, &[]));
    }

    #[test]
    fn test_pair_keys() {
        let pair = EdOrgPair {
            ods_instance_id: Some(4),
            education_organization_id: 9,
        };
        assert_eq!(pair.key(AdminApiVersion::V1), Some(edorg_key_v1(9)));
        assert_eq!(pair.key(AdminApiVersion::V2), Some(edorg_key_v2(4, 9)));
        let bare = EdOrgPair {
            ods_instance_id: None,
            education_organization_id: 9,
        };
        assert_eq!(bare.key(AdminApiVersion::V2), None);
    }
}
