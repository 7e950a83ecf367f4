pub const SCHEMA: &str = r#"
-- Resource hierarchy, written by the sync process
CREATE TABLE IF NOT EXISTS environments (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    version TEXT NOT NULL DEFAULT 'v1' CHECK (version IN ('v1', 'v2'))
);

CREATE TABLE IF NOT EXISTS tenants (
    id INTEGER PRIMARY KEY,
    environment_id INTEGER NOT NULL REFERENCES environments(id) ON DELETE CASCADE,
    name TEXT NOT NULL,

    UNIQUE(environment_id, name)
);

CREATE TABLE IF NOT EXISTS odss (
    id INTEGER PRIMARY KEY,
    tenant_id INTEGER NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    ods_instance_id INTEGER          -- Admin API instance id, v2 only
);

CREATE TABLE IF NOT EXISTS edorgs (
    id INTEGER PRIMARY KEY,
    ods_id INTEGER NOT NULL REFERENCES odss(id) ON DELETE CASCADE,
    education_organization_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    parent_id INTEGER REFERENCES edorgs(id) ON DELETE SET NULL,

    UNIQUE(ods_id, education_organization_id)
);

-- Transitive closure over edorgs, self pairs included
CREATE TABLE IF NOT EXISTS edorg_closure (
    ancestor_id INTEGER NOT NULL REFERENCES edorgs(id) ON DELETE CASCADE,
    descendant_id INTEGER NOT NULL REFERENCES edorgs(id) ON DELETE CASCADE,
    depth INTEGER NOT NULL,
    PRIMARY KEY (ancestor_id, descendant_id)
);

-- Teams hold ownerships
CREATE TABLE IF NOT EXISTS teams (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

-- Roles: global (team_id NULL) or custom to one team
CREATE TABLE IF NOT EXISTS roles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    team_id INTEGER REFERENCES teams(id) ON DELETE CASCADE,

    UNIQUE(team_id, name)
);

CREATE TABLE IF NOT EXISTS role_privileges (
    role_id INTEGER NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
    privilege TEXT NOT NULL,
    PRIMARY KEY (role_id, privilege)
);

-- Ownership: a role granted to a team over one resource, or globally
CREATE TABLE IF NOT EXISTS ownerships (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    team_id INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
    role_id INTEGER NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
    resource_type TEXT NOT NULL
        CHECK (resource_type IN ('global', 'environment', 'tenant', 'ods', 'edorg')),
    resource_id INTEGER,
    created_at TEXT DEFAULT (datetime('now')),

    CHECK ((resource_type = 'global') = (resource_id IS NULL))
);

CREATE INDEX IF NOT EXISTS idx_tenants_environment ON tenants(environment_id);
CREATE INDEX IF NOT EXISTS idx_odss_tenant ON odss(tenant_id);
CREATE INDEX IF NOT EXISTS idx_edorgs_ods ON edorgs(ods_id);
CREATE INDEX IF NOT EXISTS idx_edorg_closure_descendant ON edorg_closure(descendant_id);
CREATE INDEX IF NOT EXISTS idx_ownerships_team ON ownerships(team_id);
CREATE INDEX IF NOT EXISTS idx_ownerships_resource ON ownerships(resource_type, resource_id);
"#;
