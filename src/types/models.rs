use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Privilege;
use crate::error::{Error, Result};

pub type ResourceId = i64;
pub type TeamId = i64;
pub type RoleId = i64;

/// Admin API generation an environment speaks. Decides how edorgs are identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminApiVersion {
    /// Single ODS per tenant; edorg ids are unique within the tenant.
    #[default]
    V1,
    /// Many ODS instances per tenant; edorgs are qualified by instance.
    V2,
}

impl AdminApiVersion {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "v1" => Some(Self::V1),
            "v2" => Some(Self::V2),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    pub id: ResourceId,
    pub name: String,
    pub version: AdminApiVersion,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: ResourceId,
    pub environment_id: ResourceId,
    pub name: String,
}

/// A database instance (operational data store) inside a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ods {
    pub id: ResourceId,
    pub tenant_id: ResourceId,
    pub name: String,
    /// The instance id the Admin API knows this ODS by (v2 only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ods_instance_id: Option<i64>,
}

/// An education organization synced from an ODS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdOrg {
    pub id: ResourceId,
    pub ods_id: ResourceId,
    /// Natural id, as the Admin API reports it.
    pub education_organization_id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ResourceId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "team_id", rename_all = "snake_case")]
pub enum RoleScope {
    Global,
    /// Custom role defined by and visible to one team.
    Team(TeamId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub scope: RoleScope,
    pub privileges: BTreeSet<Privilege>,
}

/// The storage discriminator for a [`ResourceRef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Global,
    Environment,
    Tenant,
    Ods,
    #[serde(rename = "edorg")]
    EdOrg,
}

impl ResourceType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Environment => "environment",
            Self::Tenant => "tenant",
            Self::Ods => "ods",
            Self::EdOrg => "edorg",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "global" => Some(Self::Global),
            "environment" => Some(Self::Environment),
            "tenant" => Some(Self::Tenant),
            "ods" => Some(Self::Ods),
            "edorg" => Some(Self::EdOrg),
            _ => None,
        }
    }
}

/// What an ownership grants its role over: one resource, or everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum ResourceRef {
    Global,
    Environment(ResourceId),
    Tenant(ResourceId),
    Ods(ResourceId),
    #[serde(rename = "edorg")]
    EdOrg(ResourceId),
}

impl ResourceRef {
    #[must_use]
    pub const fn resource_type(self) -> ResourceType {
        match self {
            Self::Global => ResourceType::Global,
            Self::Environment(_) => ResourceType::Environment,
            Self::Tenant(_) => ResourceType::Tenant,
            Self::Ods(_) => ResourceType::Ods,
            Self::EdOrg(_) => ResourceType::EdOrg,
        }
    }

    #[must_use]
    pub const fn resource_id(self) -> Option<ResourceId> {
        match self {
            Self::Global => None,
            Self::Environment(id) | Self::Tenant(id) | Self::Ods(id) | Self::EdOrg(id) => Some(id),
        }
    }

    /// Rebuilds a reference from its storage columns.
    pub fn from_parts(resource_type: &str, resource_id: Option<ResourceId>) -> Result<Self> {
        let kind = ResourceType::parse(resource_type)
            .ok_or_else(|| Error::InvalidResource(format!("unknown type `{resource_type}`")))?;
        match (kind, resource_id) {
            (ResourceType::Global, None) => Ok(Self::Global),
            (ResourceType::Environment, Some(id)) => Ok(Self::Environment(id)),
            (ResourceType::Tenant, Some(id)) => Ok(Self::Tenant(id)),
            (ResourceType::Ods, Some(id)) => Ok(Self::Ods(id)),
            (ResourceType::EdOrg, Some(id)) => Ok(Self::EdOrg(id)),
            (ResourceType::Global, Some(id)) => Err(Error::InvalidResource(format!(
                "global ownership cannot name resource {id}"
            ))),
            (kind, None) => Err(Error::InvalidResource(format!(
                "{} ownership requires a resource id",
                kind.as_str()
            ))),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.resource_id() {
            Some(id) => write!(f, "{}:{id}", self.resource_type().as_str()),
            None => f.write_str("global"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ownership {
    pub id: i64,
    pub team_id: TeamId,
    pub role_id: RoleId,
    pub resource: ResourceRef,
    pub created_at: DateTime<Utc>,
}

/// An ownership that has not been persisted yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOwnership {
    pub team_id: TeamId,
    pub role_id: RoleId,
    pub resource: ResourceRef,
}
