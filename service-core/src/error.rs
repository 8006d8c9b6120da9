use thiserror::Error;

/// Startup failures shared by every service.
///
/// Each variant is fatal: the binaries log it and exit non-zero. Once a
/// listener is serving, the health handlers have no way to produce one.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid value for {key}: {value:?} is not a valid {expected}")]
    ConfigCoercion {
        key: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),

    #[error("Failed to bind listener to {addr}: {source}")]
    ListenerBind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<dotenvy::Error> for AppError {
    fn from(err: dotenvy::Error) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}
