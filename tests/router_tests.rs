//! End-to-end routing through `create_router`: public surface, the
//! authentication layer on the protected groups, and the admin nesting.
//! Uses the local header bypass so no token plumbing is needed.

mod support;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use course_portal::{create_router, models::Role};
use std::sync::Arc;
use support::{GOOD_PASSWORD, MockGateway, MockRepo, test_state};
use tower::ServiceExt;
use uuid::Uuid;

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let app = create_router(test_state(
        Arc::new(MockRepo::new()),
        Arc::new(MockGateway::new()),
    ));

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ok");
}

#[tokio::test]
async fn catalog_is_readable_without_authentication() {
    let repo = Arc::new(MockRepo::new());
    repo.add_course(Uuid::new_v4(), "Rust 101");
    let app = create_router(test_state(repo, Arc::new(MockGateway::new())));

    let response = app
        .oneshot(Request::get("/courses").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("Rust 101"));
}

#[tokio::test]
async fn login_round_trip_through_the_router() {
    let gateway = Arc::new(MockGateway::new());
    gateway.add_identity("ada@example.com", &[Role::Student]);
    let app = create_router(test_state(Arc::new(MockRepo::new()), gateway));

    let response = app
        .oneshot(
            Request::post("/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(format!(
                    r#"{{"email":"ada@example.com","password":"{GOOD_PASSWORD}","role":"student"}}"#
                )))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("\"token\""));
    assert!(body.contains("\"/student\""));
}

#[tokio::test]
async fn protected_routes_reject_anonymous_requests() {
    let app = create_router(test_state(
        Arc::new(MockRepo::new()),
        Arc::new(MockGateway::new()),
    ));

    for uri in ["/me", "/student/dashboard", "/instructor/courses", "/admin/stats"] {
        let response = app
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }
}

#[tokio::test]
async fn authenticated_student_reaches_their_area_but_not_admin() {
    let gateway = Arc::new(MockGateway::new());
    let identity = gateway.add_identity("ada@example.com", &[Role::Student]);
    let app = create_router(test_state(Arc::new(MockRepo::new()), gateway));

    let dashboard = app
        .clone()
        .oneshot(
            Request::get("/student/dashboard")
                .header("x-user-id", identity.id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(dashboard.status(), StatusCode::OK);

    let admin = app
        .oneshot(
            Request::get("/admin/stats")
                .header("x-user-id", identity.id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(admin.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_area_is_nested_under_admin() {
    let gateway = Arc::new(MockGateway::new());
    let identity = gateway.add_identity("boss@example.com", &[Role::Admin]);
    let app = create_router(test_state(Arc::new(MockRepo::new()), gateway));

    let response = app
        .oneshot(
            Request::get("/admin/stats")
                .header("x-user-id", identity.id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("course_count"));
}

#[tokio::test]
async fn every_response_carries_a_request_id() {
    let app = create_router(test_state(
        Arc::new(MockRepo::new()),
        Arc::new(MockGateway::new()),
    ));

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn course_filters_route_is_not_swallowed_by_the_id_route() {
    let repo = Arc::new(MockRepo::new());
    repo.add_category("Systems");
    let app = create_router(test_state(repo, Arc::new(MockGateway::new())));

    let response = app
        .oneshot(Request::get("/courses/filters").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("Systems"));
}
