use std::collections::HashMap;
use std::collections::hash_map::Entry;

use super::cache::AuthorizationCache;
use super::resolver::{Expansion, Resolver};
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Role, RoleId, RoleScope, TeamId};

/// Builds a team's authorization cache from its ownerships.
///
/// Storage failures are returned as-is. Callers must deny the request rather
/// than fall back to a partial or permissive cache.
pub fn build_cache(store: &dyn Store, team_id: TeamId) -> Result<AuthorizationCache> {
    let ownerships = store.list_team_ownerships(team_id)?;
    let mut roles: HashMap<RoleId, Role> = HashMap::new();
    let mut resolver = Resolver::new(store);
    let mut cache = AuthorizationCache::new(team_id);

    for ownership in &ownerships {
        let role = match roles.entry(ownership.role_id) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => e.insert(store.get_role(ownership.role_id)?.ok_or(Error::NotFound)?),
        };

        if let RoleScope::Team(owner) = role.scope {
            if owner != team_id {
                tracing::warn!(
                    team_id,
                    ownership_id = ownership.id,
                    role_id = role.id,
                    "ownership uses another team's custom role, ignoring"
                );
                continue;
            }
        }

        let expansion = resolver.expand(ownership.resource)?;
        if expansion == Expansion::Dangling {
            tracing::warn!(
                team_id,
                ownership_id = ownership.id,
                resource = %ownership.resource,
                "ownership points at a missing resource, ignoring"
            );
            continue;
        }

        for &privilege in &role.privileges {
            for grant in expansion.grants(privilege) {
                cache.grant(privilege, grant);
            }
        }
    }

    tracing::debug!(
        team_id,
        ownerships = ownerships.len(),
        entries = cache.len(),
        "built authorization cache"
    );

    Ok(cache)
}
