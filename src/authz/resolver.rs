use std::collections::{BTreeSet, HashMap};

use super::cache::Grant;
use super::filter::{edorg_key_v1, edorg_key_v2};
use super::ids::{AuthKey, EdOrgKey, Ids};
use crate::error::Result;
use crate::store::Store;
use crate::types::{
    AdminApiVersion, EdOrg, Environment, Ods, Privilege, ResourceId, ResourceRef, Subject, Tenant,
};

/// Everything one ownership covers, down the hierarchy and through the edorg closure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion {
    Global,
    Environment {
        environment_id: ResourceId,
        tenant_ids: Vec<ResourceId>,
    },
    Tenant {
        environment_id: ResourceId,
        tenant_id: ResourceId,
    },
    /// Part of a single tenant: an ODS, or an edorg and its descendants.
    Partial(PartialCoverage),
    /// The owned resource (or one of its ancestors) no longer exists.
    Dangling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialCoverage {
    pub environment_id: ResourceId,
    pub tenant_id: ResourceId,
    pub ods_id: ResourceId,
    /// The ODS itself is owned, not just an edorg inside it.
    pub owns_ods: bool,
    pub edorg_ids: BTreeSet<ResourceId>,
    pub edorg_keys: BTreeSet<EdOrgKey>,
}

impl Expansion {
    /// The contributions this expansion makes to one privilege.
    ///
    /// Each privilege is evaluated on its own because privileges differ in the
    /// resource types able to grant them. Owning a resource gives read access
    /// to its ancestors as singleton sets so the team can navigate to it.
    pub(crate) fn grants(&self, privilege: Privilege) -> Vec<Grant> {
        let read_only = |grant: Grant| {
            if privilege.action().is_safe() {
                vec![grant]
            } else {
                Vec::new()
            }
        };

        match self {
            Expansion::Dangling => Vec::new(),
            Expansion::Global => vec![Grant::Global],
            Expansion::Environment {
                environment_id,
                tenant_ids,
            } => match privilege.subject() {
                Subject::Environment => vec![Grant::Ids(Ids::from_ids([*environment_id]))],
                Subject::Tenant => vec![Grant::Scoped(*environment_id, Ids::All)],
                _ => tenant_ids
                    .iter()
                    .map(|tenant_id| Grant::Scoped(*tenant_id, Ids::All))
                    .collect(),
            },
            Expansion::Tenant {
                environment_id,
                tenant_id,
            } => match privilege.subject() {
                Subject::Environment => read_only(Grant::Ids(Ids::from_ids([*environment_id]))),
                Subject::Tenant => vec![Grant::Scoped(
                    *environment_id,
                    Ids::from_ids([*tenant_id]),
                )],
                _ => vec![Grant::Scoped(*tenant_id, Ids::All)],
            },
            Expansion::Partial(c) => match privilege.subject() {
                Subject::Environment => read_only(Grant::Ids(Ids::from_ids([c.environment_id]))),
                Subject::Tenant => read_only(Grant::Scoped(
                    c.environment_id,
                    Ids::from_ids([c.tenant_id]),
                )),
                Subject::Ods => {
                    let grant = Grant::Scoped(c.tenant_id, Ids::from_ids([c.ods_id]));
                    if c.owns_ods { vec![grant] } else { read_only(grant) }
                }
                Subject::EdOrg => vec![Grant::Scoped(
                    c.tenant_id,
                    Ids::from_ids(c.edorg_ids.iter().copied()),
                )],
                Subject::Application => vec![Grant::Scoped(
                    c.tenant_id,
                    Ids::from_keys(c.edorg_keys.iter().copied().map(AuthKey::EdOrg)),
                )],
                // Tenant-wide resources need the whole tenant.
                Subject::Vendor | Subject::ClaimSet => Vec::new(),
            },
        }
    }
}

/// Expands ownerships against storage, memoizing hierarchy lookups for one build.
pub struct Resolver<'a> {
    store: &'a dyn Store,
    environments: HashMap<ResourceId, Option<Environment>>,
    tenants: HashMap<ResourceId, Option<Tenant>>,
    odss: HashMap<ResourceId, Option<Ods>>,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self {
            store,
            environments: HashMap::new(),
            tenants: HashMap::new(),
            odss: HashMap::new(),
        }
    }

    pub fn expand(&mut self, resource: ResourceRef) -> Result<Expansion> {
        match resource {
            ResourceRef::Global => Ok(Expansion::Global),
            ResourceRef::Environment(id) => {
                if self.environment(id)?.is_none() {
                    return Ok(Expansion::Dangling);
                }
                let all = Ids::All.to_query_filter();
                let tenant_ids = self
                    .store
                    .list_tenants(id, &all)?
                    .into_iter()
                    .map(|t| t.id)
                    .collect();
                Ok(Expansion::Environment {
                    environment_id: id,
                    tenant_ids,
                })
            }
            ResourceRef::Tenant(id) => Ok(match self.tenant(id)? {
                Some(tenant) if self.environment(tenant.environment_id)?.is_some() => {
                    Expansion::Tenant {
                        environment_id: tenant.environment_id,
                        tenant_id: id,
                    }
                }
                _ => Expansion::Dangling,
            }),
            ResourceRef::Ods(id) => {
                let edorgs = self.store.list_ods_edorgs(id)?;
                self.partial(id, true, edorgs)
            }
            ResourceRef::EdOrg(id) => {
                let Some(root) = self.store.get_edorg(id)? else {
                    return Ok(Expansion::Dangling);
                };
                let mut edorgs = self.store.list_edorg_descendants(id)?;
                if !edorgs.iter().any(|e| e.id == root.id) {
                    edorgs.push(root.clone());
                }
                self.partial(root.ods_id, false, edorgs)
            }
        }
    }

    fn partial(&mut self, ods_id: ResourceId, owns_ods: bool, edorgs: Vec<EdOrg>) -> Result<Expansion> {
        let Some(ods) = self.ods(ods_id)? else {
            return Ok(Expansion::Dangling);
        };
        let Some(tenant) = self.tenant(ods.tenant_id)? else {
            return Ok(Expansion::Dangling);
        };
        let Some(environment) = self.environment(tenant.environment_id)? else {
            return Ok(Expansion::Dangling);
        };

        let mut edorg_keys = BTreeSet::new();
        for edorg in &edorgs {
            if let Some(key) = self.edorg_key(environment.version, edorg)? {
                edorg_keys.insert(key);
            }
        }

        Ok(Expansion::Partial(PartialCoverage {
            environment_id: environment.id,
            tenant_id: tenant.id,
            ods_id,
            owns_ods,
            edorg_ids: edorgs.iter().map(|e| e.id).collect(),
            edorg_keys,
        }))
    }

    fn edorg_key(&mut self, version: AdminApiVersion, edorg: &EdOrg) -> Result<Option<EdOrgKey>> {
        match version {
            AdminApiVersion::V1 => Ok(Some(edorg_key_v1(edorg.education_organization_id))),
            AdminApiVersion::V2 => {
                let instance = self.ods(edorg.ods_id)?.and_then(|o| o.ods_instance_id);
                match instance {
                    Some(ods_instance_id) => Ok(Some(edorg_key_v2(
                        ods_instance_id,
                        edorg.education_organization_id,
                    ))),
                    None => {
                        tracing::warn!(
                            edorg_id = edorg.id,
                            ods_id = edorg.ods_id,
                            "v2 edorg has no ODS instance id, skipping application key"
                        );
                        Ok(None)
                    }
                }
            }
        }
    }

    fn environment(&mut self, id: ResourceId) -> Result<Option<Environment>> {
        if let Some(cached) = self.environments.get(&id) {
            return Ok(cached.clone());
        }
        let found = self.store.get_environment(id)?;
        self.environments.insert(id, found.clone());
        Ok(found)
    }

    fn tenant(&mut self, id: ResourceId) -> Result<Option<Tenant>> {
        if let Some(cached) = self.tenants.get(&id) {
            return Ok(cached.clone());
        }
        let found = self.store.get_tenant(id)?;
        self.tenants.insert(id, found.clone());
        Ok(found)
    }

    fn ods(&mut self, id: ResourceId) -> Result<Option<Ods>> {
        if let Some(cached) = self.odss.get(&id) {
            return Ok(cached.clone());
        }
        let found = self.store.get_ods(id)?;
        self.odss.insert(id, found.clone());
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partial(owns_ods: bool) -> Expansion {
        Expansion::Partial(PartialCoverage {
            environment_id: 1,
            tenant_id: 5,
            ods_id: 9,
            owns_ods,
            edorg_ids: [7, 42].into_iter().collect(),
            edorg_keys: [edorg_key_v1(255901)].into_iter().collect(),
        })
    }

    #[test]
    fn test_environment_covers_every_tenant() {
        let e = Expansion::Environment {
            environment_id: 1,
            tenant_ids: vec![5, 6],
        };
        assert_eq!(
            e.grants(Privilege::TenantRead),
            vec![Grant::Scoped(1, Ids::All)]
        );
        assert_eq!(
            e.grants(Privilege::EdOrgRead),
            vec![Grant::Scoped(5, Ids::All), Grant::Scoped(6, Ids::All)]
        );
        assert_eq!(
            e.grants(Privilege::EnvironmentRead),
            vec![Grant::Ids(Ids::from_ids([1]))]
        );
    }

    #[test]
    fn test_tenant_grants_tenant_wide_resources() {
        let e = Expansion::Tenant {
            environment_id: 1,
            tenant_id: 5,
        };
        assert_eq!(e.grants(Privilege::VendorUpdate), vec![Grant::Scoped(5, Ids::All)]);
        assert_eq!(
            e.grants(Privilege::TenantRead),
            vec![Grant::Scoped(1, Ids::from_ids([5]))]
        );
    }

    #[test]
    fn test_partial_coverage_is_read_only_upwards() {
        let e = partial(false);
        assert_eq!(
            e.grants(Privilege::OdsRead),
            vec![Grant::Scoped(5, Ids::from_ids([9]))]
        );
        assert!(e.grants(Privilege::OdsDelete).is_empty());
        assert!(e.grants(Privilege::TenantDelete).is_empty());
        assert!(e.grants(Privilege::VendorRead).is_empty());
        assert_eq!(
            e.grants(Privilege::EdOrgRead),
            vec![Grant::Scoped(5, Ids::from_ids([7, 42]))]
        );
    }

    #[test]
    fn test_owned_ods_allows_mutation() {
        assert_eq!(
            partial(true).grants(Privilege::OdsDelete),
            vec![Grant::Scoped(5, Ids::from_ids([9]))]
        );
    }

    #[test]
    fn test_dangling_grants_nothing() {
        for p in Privilege::ALL {
            assert!(Expansion::Dangling.grants(p).is_empty());
        }
    }
}
