use super::registry::CacheInvalidator;
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{EdOrg, Environment, Ods, ResourceId, Tenant};

/// Write path for the resource hierarchy, used by the sync process.
///
/// Environment and edorg ownerships expand to whatever sits below them when
/// the cache is built, so any change here drops every team's cache.
pub struct HierarchyWriter<'a> {
    store: &'a dyn Store,
    invalidator: &'a dyn CacheInvalidator,
}

impl<'a> HierarchyWriter<'a> {
    pub fn new(store: &'a dyn Store, invalidator: &'a dyn CacheInvalidator) -> Self {
        Self { store, invalidator }
    }

    pub fn create_environment(&self, env: &Environment) -> Result<()> {
        self.store.create_environment(env)?;
        self.invalidator.invalidate_all();
        tracing::info!(environment_id = env.id, version = env.version.as_str(), "synced environment");
        Ok(())
    }

    pub fn create_tenant(&self, tenant: &Tenant) -> Result<()> {
        self.store
            .get_environment(tenant.environment_id)?
            .ok_or_else(|| {
                Error::InvalidResource(format!("environment {} does not exist", tenant.environment_id))
            })?;

        self.store.create_tenant(tenant)?;
        self.invalidator.invalidate_all();
        tracing::info!(
            tenant_id = tenant.id,
            environment_id = tenant.environment_id,
            "synced tenant"
        );
        Ok(())
    }

    pub fn create_ods(&self, ods: &Ods) -> Result<()> {
        self.store
            .get_tenant(ods.tenant_id)?
            .ok_or_else(|| Error::InvalidResource(format!("tenant {} does not exist", ods.tenant_id)))?;

        self.store.create_ods(ods)?;
        self.invalidator.invalidate_all();
        tracing::info!(ods_id = ods.id, tenant_id = ods.tenant_id, "synced ods");
        Ok(())
    }

    /// Inserts the edorg and rebuilds its ODS's closure rows.
    pub fn create_edorg(&self, edorg: &EdOrg) -> Result<()> {
        self.store
            .get_ods(edorg.ods_id)?
            .ok_or_else(|| Error::InvalidResource(format!("ods {} does not exist", edorg.ods_id)))?;

        if let Some(parent_id) = edorg.parent_id {
            let parent = self
                .store
                .get_edorg(parent_id)?
                .ok_or_else(|| Error::InvalidResource(format!("edorg {parent_id} does not exist")))?;
            if parent.ods_id != edorg.ods_id {
                return Err(Error::BadRequest(format!(
                    "parent edorg {parent_id} belongs to another ods"
                )));
            }
        }

        self.store.create_edorg(edorg)?;
        self.store.rebuild_edorg_closure(edorg.ods_id)?;
        self.invalidator.invalidate_all();
        tracing::info!(edorg_id = edorg.id, ods_id = edorg.ods_id, "synced edorg");
        Ok(())
    }

    /// For syncs that rewrite `parent_id` links in bulk.
    pub fn rebuild_edorg_closure(&self, ods_id: ResourceId) -> Result<()> {
        self.store.get_ods(ods_id)?.ok_or(Error::NotFound)?;

        self.store.rebuild_edorg_closure(ods_id)?;
        self.invalidator.invalidate_all();
        Ok(())
    }
}
