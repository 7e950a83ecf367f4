//! Shared fixtures: an in-memory store seeded with a small hierarchy.
//!
//! ```text
//! env 1 "prod" (v1)
//!   tenant 5
//!     ods 10
//!       edorg 7 (255901) ── edorg 42 (255901001) ── edorg 43 (255901002)
//!       edorg 99 (255950)
//!   tenant 6
//!     ods 11
//!       edorg 60 (255960)
//! env 2 "staging" (v2)
//!   tenant 8
//!     ods 20 (instance 2001)
//!       edorg 70 (255901) ── edorg 71 (255901001)
//!     ods 21 (instance 2002)
//!       edorg 80 (255901)
//! ```

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;

use tierguard::store::{SqliteStore, Store};
use tierguard::types::{
    AdminApiVersion, EdOrg, Environment, NewOwnership, Ods, Ownership, Privilege, ResourceId,
    ResourceRef, RoleId, RoleScope, Tenant, TeamId,
};

pub struct Fixture {
    pub store: Arc<dyn Store>,
    /// The same store, for tests that need the raw connection.
    pub sqlite: Arc<SqliteStore>,
}

impl Fixture {
    /// Empty, initialized store.
    pub fn empty() -> Self {
        let sqlite = Arc::new(SqliteStore::in_memory().expect("open in-memory store"));
        sqlite.initialize().expect("initialize schema");
        Self {
            store: Arc::clone(&sqlite) as Arc<dyn Store>,
            sqlite,
        }
    }

    /// Store seeded with the hierarchy in the module docs.
    pub fn new() -> Self {
        let fx = Self::empty();

        fx.environment(1, "prod", AdminApiVersion::V1);
        fx.environment(2, "staging", AdminApiVersion::V2);

        fx.tenant(5, 1, "district-a");
        fx.tenant(6, 1, "district-b");
        fx.tenant(8, 2, "district-c");

        fx.ods(10, 5, None);
        fx.ods(11, 6, None);
        fx.ods(20, 8, Some(2001));
        fx.ods(21, 8, Some(2002));

        fx.edorg(7, 10, 255901, None);
        fx.edorg(42, 10, 255901001, Some(7));
        fx.edorg(43, 10, 255901002, Some(42));
        fx.edorg(99, 10, 255950, None);
        fx.edorg(60, 11, 255960, None);
        fx.edorg(70, 20, 255901, None);
        fx.edorg(71, 20, 255901001, Some(70));
        fx.edorg(80, 21, 255901, None);

        for ods_id in [10, 11, 20, 21] {
            fx.store
                .rebuild_edorg_closure(ods_id)
                .expect("rebuild closure");
        }

        fx
    }

    pub fn environment(&self, id: ResourceId, name: &str, version: AdminApiVersion) {
        self.store
            .create_environment(&Environment {
                id,
                name: name.to_string(),
                version,
            })
            .expect("create environment");
    }

    pub fn tenant(&self, id: ResourceId, environment_id: ResourceId, name: &str) {
        self.store
            .create_tenant(&Tenant {
                id,
                environment_id,
                name: name.to_string(),
            })
            .expect("create tenant");
    }

    pub fn ods(&self, id: ResourceId, tenant_id: ResourceId, ods_instance_id: Option<i64>) {
        self.store
            .create_ods(&Ods {
                id,
                tenant_id,
                name: format!("ods-{id}"),
                ods_instance_id,
            })
            .expect("create ods");
    }

    pub fn edorg(
        &self,
        id: ResourceId,
        ods_id: ResourceId,
        education_organization_id: i64,
        parent_id: Option<ResourceId>,
    ) {
        self.store
            .create_edorg(&EdOrg {
                id,
                ods_id,
                education_organization_id,
                name: format!("edorg-{education_organization_id}"),
                parent_id,
            })
            .expect("create edorg");
    }

    pub fn team(&self, name: &str) -> TeamId {
        self.store.create_team(name).expect("create team").id
    }

    pub fn builtin_role(&self, name: &str) -> RoleId {
        self.store
            .get_role_by_name(RoleScope::Global, name)
            .expect("get role")
            .expect("built-in role seeded")
            .id
    }

    pub fn custom_role(&self, team_id: TeamId, name: &str, privileges: &[Privilege]) -> RoleId {
        let privileges: BTreeSet<Privilege> = privileges.iter().copied().collect();
        self.store
            .create_role(name, RoleScope::Team(team_id), &privileges)
            .expect("create role")
            .id
    }

    /// Writes an ownership straight to storage, bypassing invalidation.
    pub fn own(&self, team_id: TeamId, role_id: RoleId, resource: ResourceRef) -> Ownership {
        self.store
            .create_ownership(&NewOwnership {
                team_id,
                role_id,
                resource,
            })
            .expect("create ownership")
    }
}
