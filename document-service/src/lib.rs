use service_core::config::Settings;
use service_core::startup::ServiceHandle;
use std::sync::Arc;

pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the document service from a resolved settings snapshot.
pub fn build_service(settings: Arc<Settings>) -> ServiceHandle {
    ServiceHandle::initialize(settings).with_version(SERVICE_VERSION)
}
