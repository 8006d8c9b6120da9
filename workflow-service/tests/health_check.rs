use reqwest::Client;
use service_core::config::ConfigResolver;
use std::sync::Arc;
use workflow_service::{SERVICE_VERSION, build_service};

async fn spawn_app(vars: &[(&str, &str)]) -> String {
    let settings = ConfigResolver::new()
        .without_env_file()
        .with_vars(vars.iter().copied())
        .resolve()
        .expect("Failed to resolve settings");

    let app = build_service(Arc::new(settings))
        .bind("127.0.0.1", 0)
        .await
        .expect("Failed to bind");
    let address = format!("http://127.0.0.1:{}", app.port());

    tokio::spawn(app.run_until(std::future::pending()));

    address
}

#[test]
fn service_is_tagged_with_package_version() {
    let settings = ConfigResolver::new()
        .without_env_file()
        .with_vars([("SERVICE_NAME", "workflow-service")])
        .resolve()
        .unwrap();

    let handle = build_service(Arc::new(settings));

    assert_eq!(handle.identity().version(), SERVICE_VERSION);
    assert_eq!(handle.identity().to_string(), "workflow-service v1.0.0");
}

#[tokio::test]
async fn health_check_uses_default_name() {
    let address = spawn_app(&[]).await;

    let response = Client::new()
        .get(format!("{}/health", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body, serde_json::json!({"status": "healthy", "service": "service"}));
}

#[tokio::test]
async fn readiness_check_works() {
    let address = spawn_app(&[("SERVICE_NAME", "workflow-service")]).await;

    let response = Client::new()
        .get(format!("{}/ready", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ready");
    assert_eq!(body["service"], "workflow-service");
}
