mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use std::collections::BTreeSet;

use crate::authz::QueryFilter;
use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
///
/// Hierarchy writes go through [`HierarchyWriter`](crate::authz::HierarchyWriter)
/// and ownership writes through [`OwnershipWriter`](crate::authz::OwnershipWriter)
/// so caches get invalidated.
pub trait Store: Send + Sync {
    /// Creates tables and seeds the built-in roles.
    fn initialize(&self) -> Result<()>;

    // Environment operations
    fn create_environment(&self, env: &Environment) -> Result<()>;
    fn get_environment(&self, id: ResourceId) -> Result<Option<Environment>>;
    fn list_environments(&self, filter: &QueryFilter) -> Result<Vec<Environment>>;

    // Tenant operations
    fn create_tenant(&self, tenant: &Tenant) -> Result<()>;
    fn get_tenant(&self, id: ResourceId) -> Result<Option<Tenant>>;
    fn list_tenants(&self, environment_id: ResourceId, filter: &QueryFilter) -> Result<Vec<Tenant>>;

    // ODS operations
    fn create_ods(&self, ods: &Ods) -> Result<()>;
    fn get_ods(&self, id: ResourceId) -> Result<Option<Ods>>;
    fn list_odss(&self, tenant_id: ResourceId, filter: &QueryFilter) -> Result<Vec<Ods>>;

    // Edorg operations
    fn create_edorg(&self, edorg: &EdOrg) -> Result<()>;
    fn get_edorg(&self, id: ResourceId) -> Result<Option<EdOrg>>;
    fn list_edorgs(&self, tenant_id: ResourceId, filter: &QueryFilter) -> Result<Vec<EdOrg>>;
    fn list_ods_edorgs(&self, ods_id: ResourceId) -> Result<Vec<EdOrg>>;

    // Edorg closure operations
    /// Recomputes closure rows for every edorg in the ODS from `parent_id` links.
    fn rebuild_edorg_closure(&self, ods_id: ResourceId) -> Result<()>;
    /// The edorg and everything below it, per the closure table.
    fn list_edorg_descendants(&self, edorg_id: ResourceId) -> Result<Vec<EdOrg>>;

    // Team operations
    fn create_team(&self, name: &str) -> Result<Team>;
    fn get_team(&self, id: TeamId) -> Result<Option<Team>>;

    // Role operations
    fn create_role(
        &self,
        name: &str,
        scope: RoleScope,
        privileges: &BTreeSet<Privilege>,
    ) -> Result<Role>;
    fn get_role(&self, id: RoleId) -> Result<Option<Role>>;
    fn get_role_by_name(&self, scope: RoleScope, name: &str) -> Result<Option<Role>>;

    // Ownership operations
    fn create_ownership(&self, ownership: &NewOwnership) -> Result<Ownership>;
    fn get_ownership(&self, id: i64) -> Result<Option<Ownership>>;
    fn list_team_ownerships(&self, team_id: TeamId) -> Result<Vec<Ownership>>;
    fn delete_ownership(&self, id: i64) -> Result<bool>;
    /// Inserts `ownership` and deletes `id` atomically. `NotFound` if `id` is
    /// gone, in which case nothing is written.
    fn replace_ownership(&self, id: i64, ownership: &NewOwnership) -> Result<Ownership>;
}
