//! Router tests: requests go through the full axum stack without a socket.

mod common;

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use common::Fixture;
use tierguard::authz::CacheRegistry;
use tierguard::config::CacheMode;
use tierguard::server::{AppState, create_router};
use tierguard::types::{ResourceRef, TeamId};

struct TestApp {
    fx: Fixture,
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        let fx = Fixture::new();
        let registry = Arc::new(CacheRegistry::new(Arc::clone(&fx.store), CacheMode::Shared));
        let state = Arc::new(AppState::new(Arc::clone(&fx.store), registry));
        Self {
            router: create_router(state),
            fx,
        }
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(body)).await
    }

    async fn ids(&self, uri: &str) -> Vec<i64> {
        let (status, body) = self.get(uri).await;
        assert_eq!(status, StatusCode::OK, "{uri}: {body}");
        body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["id"].as_i64().unwrap())
            .collect()
    }

    fn school_team(&self) -> TeamId {
        let team = self.fx.team("school-42");
        self.fx.own(
            team,
            self.fx.builtin_role("Environment Owner"),
            ResourceRef::EdOrg(42),
        );
        team
    }
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".into()));
}

#[tokio::test]
async fn test_authorization_cache_dump() {
    let app = TestApp::new();
    let team = app.school_team();

    let (status, body) = app.get(&format!("/api/teams/{team}/authorization-cache")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["team_id"], json!(team));

    let edorgs = &body["data"]["entries"]["team.sb-environment.edfi-tenant.ods.edorg:read"];
    assert_eq!(edorgs["shape"], "by_tenant");
    assert_eq!(edorgs["ids"]["scopes"]["5"], json!([42, 43]));

    let apps = &body["data"]["entries"]["team.sb-environment.edfi-tenant.ods.edorg.application:read"];
    assert_eq!(apps["ids"]["scopes"]["5"], json!(["255901001", "255901002"]));
}

#[tokio::test]
async fn test_unknown_team_is_not_found() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/teams/404/sb-environments").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Team not found");

    let (status, _) = app.get("/api/teams/abc/sb-environments").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_lists_are_filtered_by_the_cache() {
    let app = TestApp::new();
    let team = app.school_team();

    assert_eq!(app.ids(&format!("/api/teams/{team}/sb-environments")).await, vec![1]);
    assert_eq!(
        app.ids(&format!("/api/teams/{team}/sb-environments/1/edfi-tenants")).await,
        vec![5]
    );
    assert!(
        app.ids(&format!("/api/teams/{team}/sb-environments/2/edfi-tenants"))
            .await
            .is_empty()
    );
    assert_eq!(
        app.ids(&format!("/api/teams/{team}/edfi-tenants/5/odss")).await,
        vec![10]
    );
    assert_eq!(
        app.ids(&format!("/api/teams/{team}/edfi-tenants/5/edorgs")).await,
        vec![42, 43]
    );
    assert!(
        app.ids(&format!("/api/teams/{team}/edfi-tenants/6/edorgs"))
            .await
            .is_empty()
    );
}

#[tokio::test]
async fn test_global_team_sees_everything() {
    let app = TestApp::new();
    let team = app.fx.team("platform");
    app.fx
        .own(team, app.fx.builtin_role("Read Only"), ResourceRef::Global);

    assert_eq!(app.ids(&format!("/api/teams/{team}/sb-environments")).await, vec![1, 2]);
    assert_eq!(
        app.ids(&format!("/api/teams/{team}/edfi-tenants/5/edorgs")).await,
        vec![7, 42, 43, 99]
    );
}

#[tokio::test]
async fn test_application_check_v1() {
    let app = TestApp::new();
    let team = app.school_team();
    let uri = format!("/api/teams/{team}/edfi-tenants/5/applications/check");

    let mixed = json!([
        { "education_organization_id": 255901001 },
        { "education_organization_id": 255950 },
    ]);

    let (status, body) = app
        .post(&uri, json!({ "action": "read", "edorgs": mixed }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["allowed"], true);
    assert_eq!(
        body["data"]["privilege"],
        "team.sb-environment.edfi-tenant.ods.edorg.application:read"
    );

    let (_, body) = app
        .post(&uri, json!({ "action": "update", "edorgs": mixed }))
        .await;
    assert_eq!(body["data"]["allowed"], false);

    let (_, body) = app
        .post(
            &uri,
            json!({
                "action": "reset-credentials",
                "edorgs": [{ "education_organization_id": 255901002 }],
            }),
        )
        .await;
    assert_eq!(body["data"]["allowed"], true);

    let (_, body) = app
        .post(&uri, json!({ "action": "delete", "edorgs": [] }))
        .await;
    assert_eq!(body["data"]["allowed"], false);
}

#[tokio::test]
async fn test_application_check_v2_requires_instance_ids() {
    let app = TestApp::new();
    let team = app.fx.team("v2");
    app.fx.own(
        team,
        app.fx.builtin_role("Environment Owner"),
        ResourceRef::Ods(20),
    );
    let uri = format!("/api/teams/{team}/edfi-tenants/8/applications/check");

    let (status, body) = app
        .post(
            &uri,
            json!({
                "action": "update",
                "edorgs": [
                    { "ods_instance_id": 2001, "education_organization_id": 255901 },
                    { "ods_instance_id": 2001, "education_organization_id": 255901001 },
                ],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["allowed"], true);
    assert_eq!(body["data"]["keys"], json!(["2001-255901", "2001-255901001"]));

    let (_, body) = app
        .post(
            &uri,
            json!({
                "action": "update",
                "edorgs": [{ "ods_instance_id": 2002, "education_organization_id": 255901 }],
            }),
        )
        .await;
    assert_eq!(body["data"]["allowed"], false);

    let (status, _) = app
        .post(
            &uri,
            json!({
                "action": "read",
                "edorgs": [{ "education_organization_id": 255901 }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ownership_writes_invalidate_the_cache() {
    let app = TestApp::new();
    let team = app.fx.team("new-team");
    let edorgs_uri = format!("/api/teams/{team}/edfi-tenants/6/edorgs");

    // Prime the shared cache while the team owns nothing.
    assert!(app.ids(&edorgs_uri).await.is_empty());

    let (status, body) = app
        .post(
            "/api/admin/ownerships",
            json!({
                "team_id": team,
                "role_id": app.fx.builtin_role("Read Only"),
                "resource": { "type": "tenant", "id": 6 },
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let ownership_id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["resource"], json!({ "type": "tenant", "id": 6 }));

    assert_eq!(app.ids(&edorgs_uri).await, vec![60]);

    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/api/admin/ownerships/{ownership_id}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(app.ids(&edorgs_uri).await.is_empty());

    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/api/admin/ownerships/{ownership_id}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ownership_replace() {
    let app = TestApp::new();
    let team = app.school_team();
    let ownership = app.fx.store.list_team_ownerships(team).unwrap().remove(0);
    let odss_uri = format!("/api/teams/{team}/edfi-tenants/6/odss");

    assert!(app.ids(&odss_uri).await.is_empty());

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/api/admin/ownerships/{}", ownership.id),
            Some(json!({
                "team_id": team,
                "role_id": ownership.role_id,
                "resource": { "type": "ods", "id": 11 },
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    assert_eq!(app.ids(&odss_uri).await, vec![11]);
    assert!(
        app.ids(&format!("/api/teams/{team}/edfi-tenants/5/edorgs"))
            .await
            .is_empty()
    );
    assert_eq!(app.fx.store.list_team_ownerships(team).unwrap().len(), 1);
}

#[tokio::test]
async fn test_ownership_create_rejects_missing_resource() {
    let app = TestApp::new();
    let team = app.fx.team("careless");

    let (status, body) = app
        .post(
            "/api/admin/ownerships",
            json!({
                "team_id": team,
                "role_id": app.fx.builtin_role("Read Only"),
                "resource": { "type": "edorg", "id": 404 },
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("edorg:404"));
}

#[tokio::test]
async fn test_cache_load_failure_fails_closed() {
    let app = TestApp::new();
    let team = app.school_team();

    app.fx
        .sqlite
        .connection()
        .execute_batch("DROP TABLE ownerships")
        .unwrap();

    let (status, body) = app.get(&format!("/api/teams/{team}/sb-environments")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["data"], Value::Null);
    assert_eq!(body["error"], "Failed to load authorization cache");
}

#[tokio::test]
async fn test_custom_role_flow() {
    let app = TestApp::new();

    let (status, body) = app
        .post("/api/admin/teams", json!({ "name": "auditors" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let team = body["data"]["id"].as_i64().unwrap();

    let (status, _) = app
        .post("/api/admin/teams", json!({ "name": "auditors" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .post(
            &format!("/api/admin/teams/{team}/roles"),
            json!({ "name": "broken", "privileges": ["team.sb-environment:launch"] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("team.sb-environment:launch"));

    let (status, body) = app
        .post(
            &format!("/api/admin/teams/{team}/roles"),
            json!({
                "name": "edorg viewer",
                "privileges": ["team.sb-environment.edfi-tenant.ods.edorg:read"],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["scope"], json!({ "kind": "team", "team_id": team }));
    let role = body["data"]["id"].as_i64().unwrap();

    let (status, _) = app
        .post(
            "/api/admin/ownerships",
            json!({ "team_id": team, "role_id": role, "resource": { "type": "ods", "id": 10 } }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    assert_eq!(
        app.ids(&format!("/api/teams/{team}/edfi-tenants/5/edorgs")).await,
        vec![7, 42, 43, 99]
    );
    assert!(app.ids(&format!("/api/teams/{team}/edfi-tenants/5/odss")).await.is_empty());

    let (status, _) = app
        .post(
            "/api/admin/teams/404/roles",
            json!({ "name": "orphan", "privileges": [] }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_hierarchy_sync_invalidates_the_cache() {
    let app = TestApp::new();
    let team = app.fx.team("prod-owner");
    app.fx.own(
        team,
        app.fx.builtin_role("Environment Owner"),
        ResourceRef::Environment(1),
    );
    let tenants_uri = format!("/api/teams/{team}/sb-environments/1/edfi-tenants");
    let odss_uri = format!("/api/teams/{team}/edfi-tenants/7/odss");

    assert_eq!(app.ids(&tenants_uri).await, vec![5, 6]);

    let (status, body) = app
        .post(
            "/api/admin/tenants",
            json!({ "id": 7, "environment_id": 1, "name": "district-new" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let (status, body) = app
        .post(
            "/api/admin/odss",
            json!({ "id": 12, "tenant_id": 7, "name": "ods-12" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    assert_eq!(app.ids(&tenants_uri).await, vec![5, 6, 7]);
    assert_eq!(app.ids(&odss_uri).await, vec![12]);

    let (status, _) = app
        .post(
            "/api/admin/tenants",
            json!({ "id": 7, "environment_id": 1, "name": "district-new" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .send(Method::POST, "/api/admin/odss/404/edorg-closure", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
