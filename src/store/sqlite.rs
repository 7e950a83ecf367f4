use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use super::Store;
use super::schema::SCHEMA;
use crate::authz::QueryFilter;
use crate::authz::catalog::BUILTIN_ROLES;
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// A private database that disappears with the store.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    /// This allows consuming applications to execute custom SQL.
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn()
    }

    fn load_privileges(conn: &Connection, role_id: RoleId) -> Result<BTreeSet<Privilege>> {
        let mut stmt =
            conn.prepare("SELECT privilege FROM role_privileges WHERE role_id = ?1 ORDER BY privilege")?;
        let codes = stmt
            .query_map(params![role_id], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // An unknown code in storage fails the whole load rather than being skipped.
        codes.iter().map(|code| code.parse()).collect()
    }

    fn seed_builtin_roles(&self) -> Result<()> {
        for builtin in BUILTIN_ROLES {
            if self.get_role_by_name(RoleScope::Global, builtin.name)?.is_none() {
                self.create_role(builtin.name, RoleScope::Global, &builtin.privileges())?;
                tracing::debug!(role = builtin.name, "seeded built-in role");
            }
        }
        Ok(())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation)
}

/// Hierarchy rows carry their own ids, so a constraint failure is a re-sync of
/// an existing row.
fn hierarchy_insert(result: rusqlite::Result<usize>) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if is_constraint_violation(&e) => Err(Error::AlreadyExists),
        Err(e) => Err(Error::from(e)),
    }
}

fn environment_from_row(row: &Row<'_>) -> rusqlite::Result<Environment> {
    let version: String = row.get(2)?;
    Ok(Environment {
        id: row.get(0)?,
        name: row.get(1)?,
        version: AdminApiVersion::parse(&version)
            .ok_or_else(|| rusqlite::Error::InvalidColumnType(2, "version".to_string(), Type::Text))?,
    })
}

fn tenant_from_row(row: &Row<'_>) -> rusqlite::Result<Tenant> {
    Ok(Tenant {
        id: row.get(0)?,
        environment_id: row.get(1)?,
        name: row.get(2)?,
    })
}

fn ods_from_row(row: &Row<'_>) -> rusqlite::Result<Ods> {
    Ok(Ods {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        name: row.get(2)?,
        ods_instance_id: row.get(3)?,
    })
}

fn edorg_from_row(row: &Row<'_>) -> rusqlite::Result<EdOrg> {
    Ok(EdOrg {
        id: row.get(0)?,
        ods_id: row.get(1)?,
        education_organization_id: row.get(2)?,
        name: row.get(3)?,
        parent_id: row.get(4)?,
    })
}

/// Ownership columns before the resource reference is validated.
struct OwnershipRow {
    id: i64,
    team_id: TeamId,
    role_id: RoleId,
    resource_type: String,
    resource_id: Option<ResourceId>,
    created_at: String,
}

impl OwnershipRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            team_id: row.get(1)?,
            role_id: row.get(2)?,
            resource_type: row.get(3)?,
            resource_id: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn into_ownership(self) -> Result<Ownership> {
        Ok(Ownership {
            id: self.id,
            team_id: self.team_id,
            role_id: self.role_id,
            resource: ResourceRef::from_parts(&self.resource_type, self.resource_id)?,
            created_at: parse_datetime(&self.created_at),
        })
    }
}

const EDORG_COLUMNS: &str = "e.id, e.ods_id, e.education_organization_id, e.name, e.parent_id";
const OWNERSHIP_COLUMNS: &str = "id, team_id, role_id, resource_type, resource_id, created_at";

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        self.seed_builtin_roles()
    }

    // Environment operations

    fn create_environment(&self, env: &Environment) -> Result<()> {
        hierarchy_insert(self.conn().execute(
            "INSERT INTO environments (id, name, version) VALUES (?1, ?2, ?3)",
            params![env.id, env.name, env.version.as_str()],
        ))
    }

    fn get_environment(&self, id: ResourceId) -> Result<Option<Environment>> {
        self.conn()
            .query_row(
                "SELECT id, name, version FROM environments WHERE id = ?1",
                params![id],
                environment_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_environments(&self, filter: &QueryFilter) -> Result<Vec<Environment>> {
        let (predicate, values) = filter.to_sql("id");
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, name, version FROM environments WHERE {predicate} ORDER BY id"
        ))?;

        let rows = stmt.query_map(params_from_iter(values), environment_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Tenant operations

    fn create_tenant(&self, tenant: &Tenant) -> Result<()> {
        hierarchy_insert(self.conn().execute(
            "INSERT INTO tenants (id, environment_id, name) VALUES (?1, ?2, ?3)",
            params![tenant.id, tenant.environment_id, tenant.name],
        ))
    }

    fn get_tenant(&self, id: ResourceId) -> Result<Option<Tenant>> {
        self.conn()
            .query_row(
                "SELECT id, environment_id, name FROM tenants WHERE id = ?1",
                params![id],
                tenant_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_tenants(&self, environment_id: ResourceId, filter: &QueryFilter) -> Result<Vec<Tenant>> {
        let (predicate, values) = filter.to_sql("id");
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, environment_id, name FROM tenants
             WHERE environment_id = ? AND {predicate} ORDER BY id"
        ))?;

        let bound = std::iter::once(Value::Integer(environment_id)).chain(values);
        let rows = stmt.query_map(params_from_iter(bound), tenant_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // ODS operations

    fn create_ods(&self, ods: &Ods) -> Result<()> {
        hierarchy_insert(self.conn().execute(
            "INSERT INTO odss (id, tenant_id, name, ods_instance_id) VALUES (?1, ?2, ?3, ?4)",
            params![ods.id, ods.tenant_id, ods.name, ods.ods_instance_id],
        ))
    }

    fn get_ods(&self, id: ResourceId) -> Result<Option<Ods>> {
        self.conn()
            .query_row(
                "SELECT id, tenant_id, name, ods_instance_id FROM odss WHERE id = ?1",
                params![id],
                ods_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_odss(&self, tenant_id: ResourceId, filter: &QueryFilter) -> Result<Vec<Ods>> {
        let (predicate, values) = filter.to_sql("id");
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, tenant_id, name, ods_instance_id FROM odss
             WHERE tenant_id = ? AND {predicate} ORDER BY id"
        ))?;

        let bound = std::iter::once(Value::Integer(tenant_id)).chain(values);
        let rows = stmt.query_map(params_from_iter(bound), ods_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Edorg operations

    fn create_edorg(&self, edorg: &EdOrg) -> Result<()> {
        hierarchy_insert(self.conn().execute(
            "INSERT INTO edorgs (id, ods_id, education_organization_id, name, parent_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                edorg.id,
                edorg.ods_id,
                edorg.education_organization_id,
                edorg.name,
                edorg.parent_id,
            ],
        ))
    }

    fn get_edorg(&self, id: ResourceId) -> Result<Option<EdOrg>> {
        self.conn()
            .query_row(
                &format!("SELECT {EDORG_COLUMNS} FROM edorgs e WHERE e.id = ?1"),
                params![id],
                edorg_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_edorgs(&self, tenant_id: ResourceId, filter: &QueryFilter) -> Result<Vec<EdOrg>> {
        let (predicate, values) = filter.to_sql("e.id");
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {EDORG_COLUMNS} FROM edorgs e
             JOIN odss o ON o.id = e.ods_id
             WHERE o.tenant_id = ? AND {predicate} ORDER BY e.id"
        ))?;

        let bound = std::iter::once(Value::Integer(tenant_id)).chain(values);
        let rows = stmt.query_map(params_from_iter(bound), edorg_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_ods_edorgs(&self, ods_id: ResourceId) -> Result<Vec<EdOrg>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {EDORG_COLUMNS} FROM edorgs e WHERE e.ods_id = ?1 ORDER BY e.id"
        ))?;

        let rows = stmt.query_map(params![ods_id], edorg_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Edorg closure operations

    fn rebuild_edorg_closure(&self, ods_id: ResourceId) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM edorg_closure
             WHERE descendant_id IN (SELECT id FROM edorgs WHERE ods_id = ?1)",
            params![ods_id],
        )?;

        // Depth bound keeps a parent cycle from recursing forever.
        let inserted = tx.execute(
            "WITH RECURSIVE chain(ancestor_id, descendant_id, depth) AS (
                 SELECT id, id, 0 FROM edorgs WHERE ods_id = ?1
                 UNION ALL
                 SELECT e.parent_id, chain.descendant_id, chain.depth + 1
                 FROM chain JOIN edorgs e ON e.id = chain.ancestor_id
                 WHERE e.parent_id IS NOT NULL AND chain.depth < 64
             )
             INSERT OR IGNORE INTO edorg_closure (ancestor_id, descendant_id, depth)
             SELECT ancestor_id, descendant_id, depth FROM chain",
            params![ods_id],
        )?;

        tx.commit()?;
        tracing::debug!(ods_id, pairs = inserted, "rebuilt edorg closure");
        Ok(())
    }

    fn list_edorg_descendants(&self, edorg_id: ResourceId) -> Result<Vec<EdOrg>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {EDORG_COLUMNS} FROM edorg_closure c
             JOIN edorgs e ON e.id = c.descendant_id
             WHERE c.ancestor_id = ?1 ORDER BY e.id"
        ))?;

        let rows = stmt.query_map(params![edorg_id], edorg_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Team operations

    fn create_team(&self, name: &str) -> Result<Team> {
        let conn = self.conn();
        match conn.execute("INSERT INTO teams (name) VALUES (?1)", params![name]) {
            Ok(_) => Ok(Team {
                id: conn.last_insert_rowid(),
                name: name.to_string(),
            }),
            Err(e) if is_constraint_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_team(&self, id: TeamId) -> Result<Option<Team>> {
        self.conn()
            .query_row(
                "SELECT id, name FROM teams WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Team {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(Error::from)
    }

    // Role operations

    fn create_role(
        &self,
        name: &str,
        scope: RoleScope,
        privileges: &BTreeSet<Privilege>,
    ) -> Result<Role> {
        let team_id = match scope {
            RoleScope::Global => None,
            RoleScope::Team(id) => Some(id),
        };

        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM roles WHERE team_id IS ?1 AND name = ?2)",
            params![team_id, name],
            |row| row.get(0),
        )?;
        if exists {
            return Err(Error::AlreadyExists);
        }

        tx.execute(
            "INSERT INTO roles (name, team_id) VALUES (?1, ?2)",
            params![name, team_id],
        )?;
        let id = tx.last_insert_rowid();

        for privilege in privileges {
            tx.execute(
                "INSERT INTO role_privileges (role_id, privilege) VALUES (?1, ?2)",
                params![id, privilege.code()],
            )?;
        }

        tx.commit()?;

        Ok(Role {
            id,
            name: name.to_string(),
            scope,
            privileges: privileges.clone(),
        })
    }

    fn get_role(&self, id: RoleId) -> Result<Option<Role>> {
        let conn = self.conn();
        let head = conn
            .query_row(
                "SELECT id, name, team_id FROM roles WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, RoleId>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<TeamId>>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, name, team_id)) = head else {
            return Ok(None);
        };

        Ok(Some(Role {
            id,
            name,
            scope: team_id.map_or(RoleScope::Global, RoleScope::Team),
            privileges: Self::load_privileges(&conn, id)?,
        }))
    }

    fn get_role_by_name(&self, scope: RoleScope, name: &str) -> Result<Option<Role>> {
        let team_id = match scope {
            RoleScope::Global => None,
            RoleScope::Team(id) => Some(id),
        };

        let id = self
            .conn()
            .query_row(
                "SELECT id FROM roles WHERE team_id IS ?1 AND name = ?2",
                params![team_id, name],
                |row| row.get::<_, RoleId>(0),
            )
            .optional()?;

        match id {
            Some(id) => self.get_role(id),
            None => Ok(None),
        }
    }

    // Ownership operations

    fn create_ownership(&self, ownership: &NewOwnership) -> Result<Ownership> {
        let created_at = Utc::now();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO ownerships (team_id, role_id, resource_type, resource_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                ownership.team_id,
                ownership.role_id,
                ownership.resource.resource_type().as_str(),
                ownership.resource.resource_id(),
                format_datetime(&created_at),
            ],
        )?;

        Ok(Ownership {
            id: conn.last_insert_rowid(),
            team_id: ownership.team_id,
            role_id: ownership.role_id,
            resource: ownership.resource,
            created_at,
        })
    }

    fn get_ownership(&self, id: i64) -> Result<Option<Ownership>> {
        let row = self
            .conn()
            .query_row(
                &format!("SELECT {OWNERSHIP_COLUMNS} FROM ownerships WHERE id = ?1"),
                params![id],
                OwnershipRow::from_row,
            )
            .optional()?;

        row.map(OwnershipRow::into_ownership).transpose()
    }

    fn list_team_ownerships(&self, team_id: TeamId) -> Result<Vec<Ownership>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {OWNERSHIP_COLUMNS} FROM ownerships WHERE team_id = ?1 ORDER BY id"
        ))?;

        let rows = stmt
            .query_map(params![team_id], OwnershipRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(OwnershipRow::into_ownership).collect()
    }

    fn delete_ownership(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM ownerships WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn replace_ownership(&self, id: i64, ownership: &NewOwnership) -> Result<Ownership> {
        let created_at = Utc::now();
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO ownerships (team_id, role_id, resource_type, resource_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                ownership.team_id,
                ownership.role_id,
                ownership.resource.resource_type().as_str(),
                ownership.resource.resource_id(),
                format_datetime(&created_at),
            ],
        )?;
        let new_id = tx.last_insert_rowid();

        // Dropping the transaction rolls the insert back.
        if tx.execute("DELETE FROM ownerships WHERE id = ?1", params![id])? == 0 {
            return Err(Error::NotFound);
        }
        tx.commit()?;

        Ok(Ownership {
            id: new_id,
            team_id: ownership.team_id,
            role_id: ownership.role_id,
            resource: ownership.resource,
            created_at,
        })
    }
}
