//! API route definitions

mod apis;
mod configs;
mod execute;
mod health;
mod runs;
mod tenant;
mod workflows;

use axum::routing::{get, post};
use axum::Router;

use splice_db::EntityKind;

use crate::middleware::auth_middleware;
use crate::state::AppState;
use crate::ws;

/// Build the API router with all routes
pub fn api_routes(state: AppState) -> Router {
    let protected = Router::new()
        .nest("/workflows", workflows::routes())
        .nest("/apis", apis::routes())
        .nest("/extracts", configs::routes(EntityKind::Extract))
        .nest("/transforms", configs::routes(EntityKind::Transform))
        .nest("/runs", runs::routes())
        .nest("/tenant", tenant::routes())
        .route("/execute", post(execute::execute_workflow))
        .route("/logs", get(ws::logs::logs_subscription))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(health::routes())
        .nest("/v1", protected)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatastoreBackend, ServerConfig};
    use axum::body::Body;
    use http::{Request, StatusCode};
    use splice_db::MemoryStore;
    use std::sync::Arc;
    use tower::ServiceExt;

    const TOKEN: &str = "sk-test";

    fn app() -> Router {
        api_routes(AppState::new(
            ServerConfig {
                port: 0,
                datastore: DatastoreBackend::Memory,
                database_url: None,
                auth_token: TOKEN.to_string(),
            },
            Arc::new(MemoryStore::new()),
        ))
    }

    fn request(
        method: &str,
        uri: &str,
        tenant: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {TOKEN}"));
        if let Some(tenant) = tenant {
            builder = builder.header("x-tenant-id", tenant);
        }
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn sample_workflow() -> serde_json::Value {
        serde_json::json!({
            "id": "ignored",
            "steps": [{
                "id": "fetch",
                "apiConfig": {
                    "id": "fetch",
                    "urlHost": "https://api.example.com",
                    "urlPath": "/items",
                    "method": "GET"
                }
            }]
        })
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_requests_without_token_are_rejected_at_the_gateway() {
        let response = app()
            .oneshot(Request::get("/v1/workflows").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app()
            .oneshot(
                Request::get("/v1/workflows")
                    .header("authorization", "Bearer wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_workflow_roundtrip_is_tenant_scoped() {
        let app = app();

        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/v1/workflows/w1",
                Some("t"),
                Some(sample_workflow()),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let stored = body_json(response).await;
        assert_eq!(stored["id"], "w1");
        assert!(stored["createdAt"].is_string());

        // Visible under the writing tenant
        let response = app
            .clone()
            .oneshot(request("GET", "/v1/workflows/w1", Some("t"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Invisible under another tenant
        let response = app
            .clone()
            .oneshot(request("GET", "/v1/workflows/w1", Some("u"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .clone()
            .oneshot(request("GET", "/v1/workflows", Some("u"), None))
            .await
            .unwrap();
        let listed = body_json(response).await;
        assert_eq!(listed["total"], 0);

        // The admin scope (no tenant header) sees the row
        let response = app
            .clone()
            .oneshot(request("GET", "/v1/workflows", None, None))
            .await
            .unwrap();
        let listed = body_json(response).await;
        assert_eq!(listed["total"], 1);
    }

    #[tokio::test]
    async fn test_upsert_rejects_workflows_without_steps() {
        let response = app()
            .oneshot(request(
                "POST",
                "/v1/workflows/w1",
                Some("t"),
                Some(serde_json::json!({"id": "w1", "steps": []})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "ValidationError");
    }

    #[tokio::test]
    async fn test_execute_validates_before_running() {
        let response = app()
            .oneshot(request(
                "POST",
                "/v1/execute",
                Some("t"),
                Some(serde_json::json!({
                    "workflow": {"id": "w", "steps": []}
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app()
            .oneshot(request("POST", "/v1/execute", Some("t"), Some(serde_json::json!({}))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_api_config_rename_moves_the_record() {
        let app = app();
        let config = serde_json::json!({
            "id": "ignored",
            "urlHost": "https://api.example.com",
            "method": "GET"
        });

        app.clone()
            .oneshot(request("POST", "/v1/apis/old-name", Some("t"), Some(config)))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/v1/apis/old-name/rename",
                Some("t"),
                Some(serde_json::json!({"newId": "new-name"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(request("GET", "/v1/apis/old-name", Some("t"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .clone()
            .oneshot(request("GET", "/v1/apis/new-name", Some("t"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_tenant_info_roundtrip() {
        let app = app();

        let response = app
            .clone()
            .oneshot(request(
                "PUT",
                "/v1/tenant",
                Some("t"),
                Some(serde_json::json!({"email": "ops@example.com", "emailEntrySkipped": false})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(request("GET", "/v1/tenant", Some("t"), None))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["email"], "ops@example.com");
    }
}
