use document_service::build_service;
use service_core::config::Settings;
use service_core::observability::init_tracing_from_settings;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing_from_settings(&settings)?;

    let settings = Arc::new(settings);
    let host = settings.service.host.clone();
    let port = settings.service.port;

    build_service(settings)
        .serve(&host, port)
        .await
        .map_err(|e| {
            tracing::error!("document-service failed: {}", e);
            anyhow::anyhow!(e)
        })?;

    Ok(())
}
