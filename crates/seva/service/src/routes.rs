//! API router configuration.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the main API router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Applications
        .route("/applications", post(handlers::submit_application))
        .route("/applications/:arn", get(handlers::get_application))
        .route(
            "/applications/:arn/transitions",
            post(handlers::execute_transition),
        )
        .route("/applications/:arn/queries", post(handlers::raise_query))
        .route("/applications/:arn/audit", get(handlers::application_audit))
        // Inbox and tasks
        .route("/inbox", get(handlers::inbox))
        .route("/tasks/:id/claim", post(handlers::claim_task))
        .route("/tasks/:id/release", post(handlers::release_task))
        // Queries
        .route("/queries/:id/response", post(handlers::respond_to_query))
        // Audit
        .route("/audit/verify", get(handlers::verify_audit));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use seva_engine::fixtures::three_officer_chain;
    use seva_engine::{EngineBuilder, StaticDefinitionSource};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let engine = EngineBuilder::new(Arc::new(StaticDefinitionSource::with_definition(
            three_officer_chain(),
        )))
        .build();
        AppState::new(Arc::new(engine))
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn submit_transition_and_verify_roundtrip() {
        let router = create_router(test_state());

        // Submit.
        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/applications",
                serde_json::json!({
                    "arn": "ARN-1",
                    "service_key": "water_connection",
                    "version": 1,
                    "authority_id": "DIST-01",
                    "data": {"applicant": {"age": 34}, "fee_paid": true},
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Transition at the clerk desk.
        let response = router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/applications/ARN-1/transitions",
                serde_json::json!({
                    "transition_id": "clerk_forward",
                    "officer_id": "off-clerk",
                    "roles": ["CLERK"],
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["new_state"], "SA_REVIEW");

        // The chain verifies.
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/audit/verify")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["ok"], serde_json::json!(true));
    }

    #[tokio::test]
    async fn role_mismatch_maps_to_forbidden() {
        let router = create_router(test_state());

        router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/applications",
                serde_json::json!({
                    "arn": "ARN-1",
                    "service_key": "water_connection",
                    "version": 1,
                    "authority_id": "DIST-01",
                    "data": {"applicant": {"age": 34}, "fee_paid": true},
                }),
            ))
            .await
            .unwrap();

        let response = router
            .oneshot(json_request(
                "POST",
                "/api/v1/applications/ARN-1/transitions",
                serde_json::json!({
                    "transition_id": "clerk_forward",
                    "officer_id": "off-x",
                    "roles": ["ACCOUNT_OFFICER"],
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert_eq!(body["error"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn inbox_requires_roles_and_filters() {
        let router = create_router(test_state());

        router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/applications",
                serde_json::json!({
                    "arn": "ARN-1",
                    "service_key": "water_connection",
                    "version": 1,
                    "authority_id": "DIST-01",
                    "data": {"applicant": {"age": 34}, "fee_paid": true},
                }),
            ))
            .await
            .unwrap();

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/inbox?roles=CLERK")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        // A different role pool sees nothing.
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/inbox?roles=ACCOUNT_OFFICER")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn unknown_application_is_not_found() {
        let router = create_router(test_state());
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/v1/applications/ARN-404")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
