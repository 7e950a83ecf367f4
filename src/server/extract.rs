use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;

use crate::authz::{AuthorizationCache, Ids, ScopeParams};
use crate::server::AppState;
use crate::server::response::{ApiError, StoreOptionExt, StoreResultExt};
use crate::types::{Privilege, ResourceId, Team};

/// The calling team's authorization cache plus the scope keys on the route.
///
/// Rejects with 404 for an unknown team and 500 when the cache cannot be built.
/// A handler that received one never sees a partially built cache.
pub struct TeamAuthz {
    pub team: Team,
    pub cache: Arc<AuthorizationCache>,
    pub params: ScopeParams,
}

impl TeamAuthz {
    /// Allowed ids for `privilege` under this request's scope.
    #[must_use]
    pub fn ids(&self, privilege: Privilege) -> Ids {
        self.cache.extract(privilege, &self.params)
    }
}

fn path_id(params: &HashMap<String, String>, name: &str) -> Result<Option<ResourceId>, ApiError> {
    params
        .get(name)
        .map(|raw| {
            raw.parse::<ResourceId>()
                .map_err(|_| ApiError::bad_request(format!("Invalid {name}: {raw}")))
        })
        .transpose()
}

impl FromRequestParts<Arc<AppState>> for TeamAuthz {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Path(params) = Path::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;

        let team_id = path_id(&params, "team_id")?
            .ok_or_else(|| ApiError::bad_request("Missing team_id"))?;

        let team = state
            .store
            .get_team(team_id)
            .api_err("Failed to get team")?
            .or_not_found("Team not found")?;

        let cache = state
            .authz
            .get(team.id)
            .api_err("Failed to load authorization cache")?;

        let params = ScopeParams {
            environment_id: path_id(&params, "environment_id")?,
            tenant_id: path_id(&params, "tenant_id")?,
        };

        Ok(Self {
            team,
            cache,
            params,
        })
    }
}
