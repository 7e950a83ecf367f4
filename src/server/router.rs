use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{
    Router,
    routing::{get, post},
};

use super::admin::admin_router;
use super::teams;
use crate::authz::CacheRegistry;
use crate::store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    /// Team caches; also the invalidation target for ownership writes.
    pub authz: Arc<CacheRegistry>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, authz: Arc<CacheRegistry>) -> Self {
        Self { store, authz }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

fn team_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/{team_id}/authorization-cache",
            get(teams::get_authorization_cache),
        )
        .route("/{team_id}/sb-environments", get(teams::list_environments))
        .route(
            "/{team_id}/sb-environments/{environment_id}/edfi-tenants",
            get(teams::list_tenants),
        )
        .route(
            "/{team_id}/edfi-tenants/{tenant_id}/odss",
            get(teams::list_odss),
        )
        .route(
            "/{team_id}/edfi-tenants/{tenant_id}/edorgs",
            get(teams::list_edorgs),
        )
        .route(
            "/{team_id}/edfi-tenants/{tenant_id}/applications/check",
            post(teams::check_application),
        )
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/teams", team_router())
        .nest("/api/admin", admin_router())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
