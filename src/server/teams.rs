use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use crate::authz::{EdOrgKey, EdOrgPair, check_composite};
use crate::server::AppState;
use crate::server::extract::TeamAuthz;
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::types::{Action, Privilege, ResourceId};

pub async fn get_authorization_cache(authz: TeamAuthz) -> impl IntoResponse {
    Json(ApiResponse::success(authz.cache.as_ref().clone()))
}

pub async fn list_environments(
    authz: TeamAuthz,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let filter = authz.ids(Privilege::EnvironmentRead).to_query_filter();
    let environments = state
        .store
        .list_environments(&filter)
        .api_err("Failed to list environments")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(environments)))
}

pub async fn list_tenants(
    authz: TeamAuthz,
    State(state): State<Arc<AppState>>,
    Path((_team_id, environment_id)): Path<(i64, ResourceId)>,
) -> impl IntoResponse {
    let filter = authz.ids(Privilege::TenantRead).to_query_filter();
    let tenants = state
        .store
        .list_tenants(environment_id, &filter)
        .api_err("Failed to list tenants")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(tenants)))
}

pub async fn list_odss(
    authz: TeamAuthz,
    State(state): State<Arc<AppState>>,
    Path((_team_id, tenant_id)): Path<(i64, ResourceId)>,
) -> impl IntoResponse {
    let filter = authz.ids(Privilege::OdsRead).to_query_filter();
    let odss = state
        .store
        .list_odss(tenant_id, &filter)
        .api_err("Failed to list ODSs")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(odss)))
}

pub async fn list_edorgs(
    authz: TeamAuthz,
    State(state): State<Arc<AppState>>,
    Path((_team_id, tenant_id)): Path<(i64, ResourceId)>,
) -> impl IntoResponse {
    let filter = authz.ids(Privilege::EdOrgRead).to_query_filter();
    let edorgs = state
        .store
        .list_edorgs(tenant_id, &filter)
        .api_err("Failed to list edorgs")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(edorgs)))
}

#[derive(Debug, Deserialize)]
pub struct ApplicationCheckRequest {
    pub action: Action,
    pub edorgs: Vec<EdOrgPair>,
}

#[derive(Debug, Serialize)]
pub struct ApplicationCheckResponse {
    pub allowed: bool,
    pub privilege: Privilege,
    pub keys: Vec<String>,
}

fn application_privilege(action: Action) -> Privilege {
    match action {
        Action::Read => Privilege::ApplicationRead,
        Action::Create => Privilege::ApplicationCreate,
        Action::Update => Privilege::ApplicationUpdate,
        Action::Delete => Privilege::ApplicationDelete,
        Action::ResetCredentials => Privilege::ApplicationResetCredentials,
    }
}

/// Checks an Admin API application's implicated edorgs against the team's grants.
///
/// Reads pass if any edorg is authorized; mutations need all of them.
pub async fn check_application(
    authz: TeamAuthz,
    State(state): State<Arc<AppState>>,
    Path((_team_id, tenant_id)): Path<(i64, ResourceId)>,
    Json(req): Json<ApplicationCheckRequest>,
) -> impl IntoResponse {
    let tenant = state
        .store
        .get_tenant(tenant_id)
        .api_err("Failed to get tenant")?
        .or_not_found("Tenant not found")?;
    let environment = state
        .store
        .get_environment(tenant.environment_id)
        .api_err("Failed to get environment")?
        .or_not_found("Environment not found")?;

    let keys = req
        .edorgs
        .iter()
        .map(|pair| {
            pair.key(environment.version).ok_or_else(|| {
                ApiError::bad_request(format!(
                    "edorg {} needs an ods_instance_id in a {} environment",
                    pair.education_organization_id,
                    environment.version.as_str()
                ))
            })
        })
        .collect::<Result<Vec<EdOrgKey>, ApiError>>()?;

    let privilege = application_privilege(req.action);
    let allowed = check_composite(&authz.ids(privilege), req.action, &keys);

    Ok::<_, ApiError>(Json(ApiResponse::success(ApplicationCheckResponse {
        allowed,
        privilege,
        keys: keys.iter().map(ToString::to_string).collect(),
    })))
}
