use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, post},
};
use serde::Deserialize;

use crate::authz::{HierarchyWriter, OwnershipWriter};
use crate::error::Error;
use crate::server::AppState;
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::types::{
    EdOrg, Environment, NewOwnership, Ods, Privilege, ResourceId, RoleScope, TeamId, Tenant,
};

pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/environments", post(sync_environment))
        .route("/tenants", post(sync_tenant))
        .route("/odss", post(sync_ods))
        .route("/odss/{ods_id}/edorg-closure", post(rebuild_edorg_closure))
        .route("/edorgs", post(sync_edorg))
        .route("/teams", post(create_team))
        .route("/teams/{team_id}/roles", post(create_role))
        .route("/ownerships", post(create_ownership))
        .route(
            "/ownerships/{id}",
            delete(delete_ownership).put(replace_ownership),
        )
}

fn hierarchy(state: &AppState) -> HierarchyWriter<'_> {
    HierarchyWriter::new(state.store.as_ref(), state.authz.as_ref())
}

pub async fn sync_environment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<Environment>,
) -> impl IntoResponse {
    hierarchy(&state)
        .create_environment(&req)
        .map_err(|e| ApiError::from_write(e, "Failed to sync environment"))?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(req))))
}

pub async fn sync_tenant(
    State(state): State<Arc<AppState>>,
    Json(req): Json<Tenant>,
) -> impl IntoResponse {
    hierarchy(&state)
        .create_tenant(&req)
        .map_err(|e| ApiError::from_write(e, "Failed to sync tenant"))?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(req))))
}

pub async fn sync_ods(
    State(state): State<Arc<AppState>>,
    Json(req): Json<Ods>,
) -> impl IntoResponse {
    hierarchy(&state)
        .create_ods(&req)
        .map_err(|e| ApiError::from_write(e, "Failed to sync ods"))?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(req))))
}

pub async fn sync_edorg(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EdOrg>,
) -> impl IntoResponse {
    hierarchy(&state)
        .create_edorg(&req)
        .map_err(|e| ApiError::from_write(e, "Failed to sync edorg"))?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(req))))
}

pub async fn rebuild_edorg_closure(
    State(state): State<Arc<AppState>>,
    Path(ods_id): Path<ResourceId>,
) -> impl IntoResponse {
    hierarchy(&state).rebuild_edorg_closure(ods_id).map_err(|e| match e {
        Error::NotFound => ApiError::not_found("ODS not found"),
        e => ApiError::from_write(e, "Failed to rebuild edorg closure"),
    })?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    pub privileges: Vec<String>,
}

pub async fn create_team(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTeamRequest>,
) -> impl IntoResponse {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("Team name cannot be empty"));
    }

    let team = state
        .store
        .create_team(name)
        .map_err(|e| ApiError::from_write(e, "Failed to create team"))?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(team))))
}

/// Creates a custom role owned by one team. Unknown privilege codes are rejected.
pub async fn create_role(
    State(state): State<Arc<AppState>>,
    Path(team_id): Path<TeamId>,
    Json(req): Json<CreateRoleRequest>,
) -> impl IntoResponse {
    state
        .store
        .get_team(team_id)
        .api_err("Failed to get team")?
        .or_not_found("Team not found")?;

    let privileges: BTreeSet<Privilege> = Privilege::parse_many(&req.privileges)
        .map_err(|e| ApiError::bad_request(e.to_string()))?
        .into_iter()
        .collect();

    let role = state
        .store
        .create_role(&req.name, RoleScope::Team(team_id), &privileges)
        .map_err(|e| ApiError::from_write(e, "Failed to create role"))?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(role))))
}

fn writer(state: &AppState) -> OwnershipWriter<'_> {
    OwnershipWriter::new(state.store.as_ref(), state.authz.as_ref())
}

pub async fn create_ownership(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewOwnership>,
) -> impl IntoResponse {
    let ownership = writer(&state)
        .create(&req)
        .map_err(|e| ApiError::from_write(e, "Failed to create ownership"))?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(ownership))))
}

pub async fn replace_ownership(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<NewOwnership>,
) -> impl IntoResponse {
    let ownership = writer(&state)
        .replace(id, &req)
        .map_err(|e| ApiError::from_write(e, "Failed to replace ownership"))?;

    Ok::<_, ApiError>(Json(ApiResponse::success(ownership)))
}

pub async fn delete_ownership(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let deleted = writer(&state)
        .delete(id)
        .map_err(|e| ApiError::from_write(e, "Failed to delete ownership"))?;

    if !deleted {
        return Err(ApiError::not_found("Ownership not found"));
    }

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
