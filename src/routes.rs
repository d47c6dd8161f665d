// routes.rs
use std::sync::Arc;

use axum::{middleware, routing::get, Extension, Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    handler::{
        admin::admin_handler, bookings::bookings_handler, jobs::jobs_handler,
        users::users_handler,
    },
    middleware::identify,
    AppState,
};

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Server is running"
    }))
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_route = Router::new()
        .nest("/users", users_handler())
        .nest("/jobs", jobs_handler())
        .nest(
            "/bookings",
            bookings_handler().layer(middleware::from_fn(identify)),
        )
        .nest(
            "/admin",
            admin_handler().layer(middleware::from_fn(identify)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(Extension(app_state));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_route)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        db::memorydb::MemoryStore,
        middleware::USER_ID_HEADER,
        service::notification_service::testing::RecordingNotifier,
    };
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_config() -> Config {
        Config {
            database_url: None,
            database_max_connections: 1,
            port: 0,
            allowed_origins: vec![],
            smtp: None,
            mail_from: "test@example.com".to_string(),
            enforce_quoted_price: false,
        }
    }

    fn test_router() -> Router {
        let (notifier, _rx) = RecordingNotifier::new();
        let state = AppState::new(
            Arc::new(MemoryStore::new()),
            test_config(),
            Arc::new(notifier),
        );
        create_router(Arc::new(state))
    }

    async fn send(
        router: &Router,
        method: &str,
        uri: &str,
        user_id: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(id) = user_id {
            builder = builder.header(USER_ID_HEADER, id);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn register(router: &Router, email: &str, role: &str) -> String {
        let (status, body) = send(
            router,
            "POST",
            "/api/users/register",
            None,
            Some(json!({
                "name": "Test User",
                "email": email,
                "role": role,
                "city": "Austin",
                "lat": 30.2672,
                "lng": -97.7431
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["data"]["id"].as_str().unwrap().to_string()
    }

    fn job_body() -> Value {
        json!({
            "title": "Move-out clean",
            "description": "Two bedroom apartment",
            "category": "cleaning",
            "date": "2030-06-01",
            "startTime": "14:00",
            "durationHours": 2.5,
            "city": "Austin",
            "lat": 30.2672,
            "lng": -97.7431
        })
    }

    #[tokio::test]
    async fn test_health_check() {
        let router = test_router();
        let (status, body) = send(&router, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_identity_header_is_required() {
        let router = test_router();

        let (status, body) = send(&router, "GET", "/api/users/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["status"], "fail");

        let (status, _) = send(&router, "GET", "/api/users/me", Some("not-a-uuid"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let unknown = uuid::Uuid::new_v4().to_string();
        let (status, _) = send(&router, "GET", "/api/bookings", Some(&unknown), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_browsing_needs_no_identity() {
        let router = test_router();
        let requester = register(&router, "req@example.com", "requester").await;
        let provider = register(&router, "pro@example.com", "provider").await;

        let (status, body) =
            send(&router, "POST", "/api/jobs", Some(&requester), Some(job_body())).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let job_id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(&router, "GET", "/api/jobs", None, None).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        // unknown sort keys use the default order
        let (status, body) = send(&router, "GET", "/api/jobs?sort=newest", None, None).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (status, body) = send(&router, "GET", &format!("/api/jobs/{job_id}"), None, None).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["id"], job_id.as_str());

        let (status, _) = send(
            &router,
            "GET",
            &format!("/api/users/providers/{provider}"),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            &router,
            "GET",
            &format!("/api/users/providers/{provider}/reviews"),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // writes and the owner's offer list still need the header
        let (status, _) = send(&router, "POST", "/api/jobs", None, Some(job_body())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&router, "GET", &format!("/api/jobs/{job_id}/offers"), None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let router = test_router();
        register(&router, "sam@example.com", "requester").await;

        let (status, _) = send(
            &router,
            "POST",
            "/api/users/register",
            None,
            Some(json!({
                "name": "Sam Again",
                "email": "SAM@example.com",
                "role": "provider",
                "city": "Austin"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_roles_gate_job_posting_and_admin_routes() {
        let router = test_router();
        let provider = register(&router, "pro@example.com", "provider").await;

        let (status, _) = send(&router, "POST", "/api/jobs", Some(&provider), Some(job_body())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&router, "GET", "/api/admin/users", Some(&provider), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_post_offer_accept_over_http() {
        let router = test_router();
        let requester = register(&router, "req@example.com", "requester").await;
        let provider = register(&router, "pro@example.com", "provider").await;

        let (status, body) =
            send(&router, "POST", "/api/jobs", Some(&requester), Some(job_body())).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let job_id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &router,
            "POST",
            &format!("/api/jobs/{job_id}/offers"),
            Some(&provider),
            Some(json!({
                "hourlyRate": 30.0,
                "message": "Happy to help",
                "availabilityStart": "2030-06-01T13:00:00Z",
                "availabilityEnd": "2030-06-01T18:00:00Z"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let offer_id = body["data"]["id"].as_str().unwrap().to_string();

        // only the owner sees the offers
        let (status, _) = send(
            &router,
            "GET",
            &format!("/api/jobs/{job_id}/offers"),
            Some(&provider),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            &router,
            "GET",
            "/api/jobs?sort=price",
            Some(&provider),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["min_rate"], 30.0);

        let (status, body) = send(
            &router,
            "POST",
            &format!("/api/jobs/{job_id}/offers/{offer_id}/accept"),
            Some(&requester),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["booking"]["start_time"], "2030-06-01T14:00:00Z");
        assert_eq!(body["data"]["booking"]["end_time"], "2030-06-01T16:30:00Z");

        // a second accept is refused on the booked job
        let (status, _) = send(
            &router,
            "POST",
            &format!("/api/jobs/{job_id}/offers/{offer_id}/accept"),
            Some(&requester),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&router, "GET", "/api/bookings", Some(&provider), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        let booking_id = body["data"][0]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &router,
            "POST",
            &format!("/api/bookings/{booking_id}/messages"),
            Some(&provider),
            Some(json!({ "text": "On my way" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");

        let read_uri = format!("/api/bookings/{booking_id}/messages/read");
        let (status, _) = send(&router, "POST", &read_uri, Some(&requester), None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

        let (status, body) = send(&router, "PATCH", &read_uri, Some(&requester), None).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["updated"], 1);
    }
}
