use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use service_core::config::ConfigResolver;
use service_core::startup::ServiceHandle;
use std::sync::Arc;
use tower::ServiceExt;

fn handle(name: Option<&str>) -> ServiceHandle {
    let vars: Vec<(&str, &str)> = name.map(|n| ("SERVICE_NAME", n)).into_iter().collect();
    let settings = ConfigResolver::new()
        .without_env_file()
        .with_vars(vars)
        .resolve()
        .unwrap();
    ServiceHandle::initialize(Arc::new(settings))
}

async fn get_json(handle: &ServiceHandle, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = handle
        .router()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_route_uses_default_name() {
    let (status, body) = get_json(&handle(None), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "service");
    assert_eq!(body.as_object().unwrap().len(), 2);
}

#[tokio::test]
async fn ready_route_uses_configured_name() {
    let (status, body) = get_json(&handle(Some("invoicing")), "/ready").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["service"], "invoicing");
}

#[tokio::test]
async fn post_to_health_route_is_rejected() {
    let response = handle(None)
        .router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
