//! service-core: configuration resolution and bootstrap shared by every service.
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod startup;

pub use axum;
pub use secrecy;
pub use tokio;
pub use tracing;
