use service_core::config::{ConfigResolver, Settings};
use service_core::startup::ServiceHandle;
use std::sync::Arc;
use tokio::sync::oneshot;

pub struct TestApp {
    pub http_address: String,
    pub port: u16,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestApp {
    /// Spawn a service resolved from `vars` on a random local port.
    pub async fn spawn(vars: &[(&str, &str)]) -> Self {
        let settings = settings_from(vars);
        let app = ServiceHandle::initialize(Arc::new(settings))
            .bind("127.0.0.1", 0)
            .await
            .expect("Failed to bind test application");

        let port = app.port();
        let (tx, rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            app.run_until(async move {
                rx.await.ok();
            })
            .await
            .ok();
        });

        TestApp {
            http_address: format!("http://127.0.0.1:{}", port),
            port,
            shutdown: Some(tx),
        }
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            tx.send(()).ok();
        }
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.stop();
    }
}

pub fn settings_from(vars: &[(&str, &str)]) -> Settings {
    ConfigResolver::new()
        .without_env_file()
        .with_vars(vars.iter().copied())
        .resolve()
        .expect("Failed to resolve test settings")
}
