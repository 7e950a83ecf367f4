use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// How a privilege's allowed ids are stored in the authorization cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivilegeShape {
    /// One id set for the whole team.
    Unscoped,
    /// One id set per environment id.
    ByEnvironment,
    /// One id set per tenant id.
    ByTenant,
}

/// The kind of resource a privilege acts upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Environment,
    Tenant,
    Ods,
    EdOrg,
    /// Admin API applications, keyed by the composite keys of their edorgs.
    Application,
    /// Tenant-wide resource: granted as a whole or not at all.
    Vendor,
    /// Tenant-wide resource: granted as a whole or not at all.
    ClaimSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
    ResetCredentials,
}

impl Action {
    /// Read-type actions are checked existentially, everything else universally.
    #[must_use]
    pub const fn is_safe(self) -> bool {
        matches!(self, Action::Read)
    }
}

/// Every privilege code the catalog knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Privilege {
    EnvironmentRead,
    TenantRead,
    TenantCreate,
    TenantDelete,
    OdsRead,
    OdsCreate,
    OdsDelete,
    EdOrgRead,
    ApplicationRead,
    ApplicationCreate,
    ApplicationUpdate,
    ApplicationDelete,
    ApplicationResetCredentials,
    VendorRead,
    VendorCreate,
    VendorUpdate,
    VendorDelete,
    ClaimSetRead,
    ClaimSetCreate,
    ClaimSetUpdate,
    ClaimSetDelete,
}

impl Privilege {
    pub const ALL: [Privilege; 21] = [
        Privilege::EnvironmentRead,
        Privilege::TenantRead,
        Privilege::TenantCreate,
        Privilege::TenantDelete,
        Privilege::OdsRead,
        Privilege::OdsCreate,
        Privilege::OdsDelete,
        Privilege::EdOrgRead,
        Privilege::ApplicationRead,
        Privilege::ApplicationCreate,
        Privilege::ApplicationUpdate,
        Privilege::ApplicationDelete,
        Privilege::ApplicationResetCredentials,
        Privilege::VendorRead,
        Privilege::VendorCreate,
        Privilege::VendorUpdate,
        Privilege::VendorDelete,
        Privilege::ClaimSetRead,
        Privilege::ClaimSetCreate,
        Privilege::ClaimSetUpdate,
        Privilege::ClaimSetDelete,
    ];

    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Privilege::EnvironmentRead => "team.sb-environment:read",
            Privilege::TenantRead => "team.sb-environment.edfi-tenant:read",
            Privilege::TenantCreate => "team.sb-environment.edfi-tenant:create",
            Privilege::TenantDelete => "team.sb-environment.edfi-tenant:delete",
            Privilege::OdsRead => "team.sb-environment.edfi-tenant.ods:read",
            Privilege::OdsCreate => "team.sb-environment.edfi-tenant.ods:create",
            Privilege::OdsDelete => "team.sb-environment.edfi-tenant.ods:delete",
            Privilege::EdOrgRead => "team.sb-environment.edfi-tenant.ods.edorg:read",
            Privilege::ApplicationRead => {
                "team.sb-environment.edfi-tenant.ods.edorg.application:read"
            }
            Privilege::ApplicationCreate => {
                "team.sb-environment.edfi-tenant.ods.edorg.application:create"
            }
            Privilege::ApplicationUpdate => {
                "team.sb-environment.edfi-tenant.ods.edorg.application:update"
            }
            Privilege::ApplicationDelete => {
                "team.sb-environment.edfi-tenant.ods.edorg.application:delete"
            }
            Privilege::ApplicationResetCredentials => {
                "team.sb-environment.edfi-tenant.ods.edorg.application:reset-credentials"
            }
            Privilege::VendorRead => "team.sb-environment.edfi-tenant.vendor:read",
            Privilege::VendorCreate => "team.sb-environment.edfi-tenant.vendor:create",
            Privilege::VendorUpdate => "team.sb-environment.edfi-tenant.vendor:update",
            Privilege::VendorDelete => "team.sb-environment.edfi-tenant.vendor:delete",
            Privilege::ClaimSetRead => "team.sb-environment.edfi-tenant.claimset:read",
            Privilege::ClaimSetCreate => "team.sb-environment.edfi-tenant.claimset:create",
            Privilege::ClaimSetUpdate => "team.sb-environment.edfi-tenant.claimset:update",
            Privilege::ClaimSetDelete => "team.sb-environment.edfi-tenant.claimset:delete",
        }
    }

    #[must_use]
    pub const fn subject(self) -> Subject {
        match self {
            Privilege::EnvironmentRead => Subject::Environment,
            Privilege::TenantRead | Privilege::TenantCreate | Privilege::TenantDelete => {
                Subject::Tenant
            }
            Privilege::OdsRead | Privilege::OdsCreate | Privilege::OdsDelete => Subject::Ods,
            Privilege::EdOrgRead => Subject::EdOrg,
            Privilege::ApplicationRead
            | Privilege::ApplicationCreate
            | Privilege::ApplicationUpdate
            | Privilege::ApplicationDelete
            | Privilege::ApplicationResetCredentials => Subject::Application,
            Privilege::VendorRead
            | Privilege::VendorCreate
            | Privilege::VendorUpdate
            | Privilege::VendorDelete => Subject::Vendor,
            Privilege::ClaimSetRead
            | Privilege::ClaimSetCreate
            | Privilege::ClaimSetUpdate
            | Privilege::ClaimSetDelete => Subject::ClaimSet,
        }
    }

    #[must_use]
    pub const fn action(self) -> Action {
        match self {
            Privilege::EnvironmentRead
            | Privilege::TenantRead
            | Privilege::OdsRead
            | Privilege::EdOrgRead
            | Privilege::ApplicationRead
            | Privilege::VendorRead
            | Privilege::ClaimSetRead => Action::Read,
            Privilege::TenantCreate
            | Privilege::OdsCreate
            | Privilege::ApplicationCreate
            | Privilege::VendorCreate
            | Privilege::ClaimSetCreate => Action::Create,
            Privilege::ApplicationUpdate | Privilege::VendorUpdate | Privilege::ClaimSetUpdate => {
                Action::Update
            }
            Privilege::TenantDelete
            | Privilege::OdsDelete
            | Privilege::ApplicationDelete
            | Privilege::VendorDelete
            | Privilege::ClaimSetDelete => Action::Delete,
            Privilege::ApplicationResetCredentials => Action::ResetCredentials,
        }
    }

    /// Shape classification. Adding a variant without a shape fails to compile.
    #[must_use]
    pub const fn shape(self) -> PrivilegeShape {
        match self.subject() {
            Subject::Environment => PrivilegeShape::Unscoped,
            Subject::Tenant => PrivilegeShape::ByEnvironment,
            Subject::Ods
            | Subject::EdOrg
            | Subject::Application
            | Subject::Vendor
            | Subject::ClaimSet => PrivilegeShape::ByTenant,
        }
    }

    /// Converts a privilege code to its catalog entry.
    pub fn parse(s: &str) -> Option<Privilege> {
        Self::ALL.into_iter().find(|p| p.code() == s)
    }

    /// Converts a slice of privilege codes, failing on the first unknown one.
    pub fn parse_many<S: AsRef<str>>(codes: &[S]) -> Result<Vec<Privilege>, Error> {
        codes
            .iter()
            .map(|c| {
                Self::parse(c.as_ref()).ok_or_else(|| Error::InvalidPrivilege(c.as_ref().to_string()))
            })
            .collect()
    }
}

/// Shape lookup for a raw code.
///
/// # Panics
///
/// Panics when `code` is not in the catalog. Guessing a shape for an unknown
/// code could grant or deny the wrong resources.
#[must_use]
pub fn shape_of(code: &str) -> PrivilegeShape {
    match Privilege::parse(code) {
        Some(p) => p.shape(),
        None => panic!("privilege code `{code}` has no shape classification"),
    }
}

#[must_use]
pub fn is_cached_by_environment(code: &str) -> bool {
    shape_of(code) == PrivilegeShape::ByEnvironment
}

#[must_use]
pub fn is_cached_by_tenant(code: &str) -> bool {
    shape_of(code) == PrivilegeShape::ByTenant
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Privilege {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| Error::InvalidPrivilege(s.to_string()))
    }
}

impl Serialize for Privilege {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for Privilege {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        code.parse().map_err(serde::de::Error::custom)
    }
}
