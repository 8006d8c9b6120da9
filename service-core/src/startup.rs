//! Service bootstrap: settings in, serving HTTP listener out.
//!
//! [`ServiceHandle`] is the unstarted service (router built, nothing bound).
//! [`ServiceHandle::serve`] binds and blocks until the process is told to
//! stop; there is no way back to the unstarted state.

use crate::config::{Settings, format_address};
use crate::error::AppError;
use crate::handlers::{health_check, readiness_check};
use crate::middleware::{RequestId, request_id_middleware};
use axum::{Router, middleware::from_fn, routing::get};
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Name and version tag used to label a running service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceIdentity {
    name: String,
    version: String,
}

impl ServiceIdentity {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Identity for `settings`, tagged with this crate's version.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.service.name.clone(), env!("CARGO_PKG_VERSION"))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.name, self.version)
    }
}

/// State shared by the health handlers.
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<ServiceIdentity>,
}

/// Router with the liveness and readiness routes and the common layers.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .extensions()
                    .get::<RequestId>()
                    .map(RequestId::as_str)
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// An initialized, not yet listening service.
pub struct ServiceHandle {
    settings: Arc<Settings>,
    identity: ServiceIdentity,
}

impl ServiceHandle {
    pub fn initialize(settings: Arc<Settings>) -> Self {
        let identity = ServiceIdentity::from_settings(&settings);

        if !settings.environment.is_recognized() {
            tracing::warn!(
                environment = %settings.environment,
                "Unrecognized ENVIRONMENT, keeping it as free text"
            );
        }

        Self { settings, identity }
    }

    /// Replace the version tag, typically with the binary's own package version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.identity.version = version.into();
        self
    }

    pub fn identity(&self) -> &ServiceIdentity {
        &self.identity
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn router(&self) -> Router {
        build_router(AppState {
            identity: Arc::new(self.identity.clone()),
        })
    }

    /// Bind the listener. Port 0 picks a free port.
    pub async fn bind(self, host: &str, port: u16) -> Result<Application, AppError> {
        let addr = format_address(host, port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", addr, e);
            AppError::ListenerBind {
                addr: addr.clone(),
                source: e,
            }
        })?;
        let local_addr = listener.local_addr()?;

        tracing::info!(
            service = %self.identity,
            environment = %self.settings.environment,
            "Listening on {}",
            local_addr
        );

        Ok(Application {
            local_addr,
            listener,
            router: self.router(),
        })
    }

    /// Bind on `host:port` and serve until SIGINT or SIGTERM.
    pub async fn serve(self, host: &str, port: u16) -> Result<(), AppError> {
        self.bind(host, port).await?.run_until_stopped().await
    }
}

/// A bound listener ready to serve the health routes.
pub struct Application {
    local_addr: SocketAddr,
    listener: TcpListener,
    router: Router,
}

impl Application {
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn run_until_stopped(self) -> Result<(), AppError> {
        self.run_until(shutdown_signal()).await
    }

    /// Serve until `shutdown` completes, then drain in-flight requests.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), AppError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| {
                tracing::error!("Server error: {}", e);
                AppError::Server(e)
            })?;

        tracing::info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigResolver;

    fn settings() -> Arc<Settings> {
        Arc::new(
            ConfigResolver::new()
                .without_env_file()
                .with_vars([("SERVICE_NAME", "ledger")])
                .resolve()
                .unwrap(),
        )
    }

    #[test]
    fn identity_comes_from_settings() {
        let handle = ServiceHandle::initialize(settings());

        assert_eq!(handle.identity().name(), "ledger");
        assert_eq!(handle.identity().version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn version_can_be_overridden() {
        let handle = ServiceHandle::initialize(settings()).with_version("1.0.0");

        assert_eq!(handle.identity().to_string(), "ledger v1.0.0");
    }
}
