use super::registry::CacheInvalidator;
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{NewOwnership, Ownership, ResourceRef, RoleScope};

/// The only write path for ownerships. Every successful write invalidates the
/// affected team's cache before returning.
pub struct OwnershipWriter<'a> {
    store: &'a dyn Store,
    invalidator: &'a dyn CacheInvalidator,
}

impl<'a> OwnershipWriter<'a> {
    pub fn new(store: &'a dyn Store, invalidator: &'a dyn CacheInvalidator) -> Self {
        Self { store, invalidator }
    }

    pub fn create(&self, new: &NewOwnership) -> Result<Ownership> {
        self.validate(new)?;

        let ownership = self.store.create_ownership(new)?;
        self.invalidator.invalidate(ownership.team_id);
        tracing::info!(
            ownership_id = ownership.id,
            team_id = ownership.team_id,
            role_id = ownership.role_id,
            resource = %ownership.resource,
            "created ownership"
        );
        Ok(ownership)
    }

    /// Returns false if no such ownership exists.
    pub fn delete(&self, id: i64) -> Result<bool> {
        let Some(existing) = self.store.get_ownership(id)? else {
            return Ok(false);
        };
        let deleted = self.store.delete_ownership(id)?;
        if deleted {
            self.invalidator.invalidate(existing.team_id);
            tracing::info!(ownership_id = id, team_id = existing.team_id, "deleted ownership");
        }
        Ok(deleted)
    }

    /// Ownerships are never edited in place: the replacement is inserted and
    /// the original deleted in one store transaction.
    pub fn replace(&self, id: i64, new: &NewOwnership) -> Result<Ownership> {
        let existing = self.store.get_ownership(id)?.ok_or(Error::NotFound)?;
        self.validate(new)?;

        let created = self.store.replace_ownership(id, new)?;
        self.invalidator.invalidate(existing.team_id);
        self.invalidator.invalidate(created.team_id);
        tracing::info!(
            replaced_id = id,
            ownership_id = created.id,
            team_id = created.team_id,
            resource = %created.resource,
            "replaced ownership"
        );
        Ok(created)
    }

    fn validate(&self, new: &NewOwnership) -> Result<()> {
        self.store.get_team(new.team_id)?.ok_or(Error::NotFound)?;

        let role = self.store.get_role(new.role_id)?.ok_or(Error::NotFound)?;
        if let RoleScope::Team(owner) = role.scope {
            if owner != new.team_id {
                return Err(Error::BadRequest(format!(
                    "role {} belongs to another team",
                    role.id
                )));
            }
        }

        if !self.resource_exists(new.resource)? {
            return Err(Error::InvalidResource(format!("{} does not exist", new.resource)));
        }
        Ok(())
    }

    fn resource_exists(&self, resource: ResourceRef) -> Result<bool> {
        Ok(match resource {
            ResourceRef::Global => true,
            ResourceRef::Environment(id) => self.store.get_environment(id)?.is_some(),
            ResourceRef::Tenant(id) => self.store.get_tenant(id)?.is_some(),
            ResourceRef::Ods(id) => self.store.get_ods(id)?.is_some(),
            ResourceRef::EdOrg(id) => self.store.get_edorg(id)?.is_some(),
        })
    }
}
