use crate::{KafkaOperations, KafkaTemplate, KafkaTemplateError, Producer, Result};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::time::Duration;
use tracing::{info, warn, error};

/// Graceful shutdown coordinator
#[derive(Clone)]
pub struct ShutdownCoordinator {
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: Arc<Mutex<broadcast::Receiver<()>>>,
    components: Arc<Mutex<Vec<Box<dyn ShutdownComponent + Send + Sync>>>>,
    shutdown_timeout: Duration,
}

/// Trait for components that need graceful shutdown
#[async_trait::async_trait]
pub trait ShutdownComponent {
    async fn shutdown(&self) -> Result<()>;
    fn name(&self) -> &str;
}

impl ShutdownCoordinator {
    pub fn new(shutdown_timeout: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        Self {
            shutdown_tx,
            shutdown_rx: Arc::new(Mutex::new(shutdown_rx)),
            components: Arc::new(Mutex::new(Vec::new())),
            shutdown_timeout,
        }
    }

    /// Register a component for graceful shutdown
    pub async fn register_component(&self, component: Box<dyn ShutdownComponent + Send + Sync>) {
        let mut components = self.components.lock().await;
        info!("Registering component '{}' for graceful shutdown", component.name());
        components.push(component);
    }

    /// Get a shutdown signal receiver
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Broadcast the shutdown signal without waiting for components.
    pub fn trigger(&self) {
        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal: {}", e);
        }
    }

    /// Trigger graceful shutdown and wait for every registered component.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Initiating graceful shutdown...");
        self.trigger();

        let components = self.components.lock().await;
        let shutdown_all = async {
            let mut failures = 0;
            for component in components.iter() {
                info!("Shutting down component '{}'", component.name());
                match component.shutdown().await {
                    Ok(()) => info!("Component '{}' shutdown successfully", component.name()),
                    Err(e) => {
                        error!("Component '{}' shutdown failed: {}", component.name(), e);
                        failures += 1;
                    }
                }
            }
            failures
        };

        match tokio::time::timeout(self.shutdown_timeout, shutdown_all).await {
            Ok(0) => {
                info!("All components shutdown successfully");
                Ok(())
            }
            Ok(failures) => Err(KafkaTemplateError::Producer(format!(
                "{} component(s) failed to shut down",
                failures
            ))),
            Err(_) => {
                error!("Shutdown timeout exceeded, forcing exit");
                Err(KafkaTemplateError::ShutdownTimeout(self.shutdown_timeout))
            }
        }
    }

    /// Wait for shutdown signal
    pub async fn wait_for_shutdown(&self) {
        let mut rx = self.shutdown_rx.lock().await;
        let _ = rx.recv().await;
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

/// Flushes a template so no buffered record is lost on exit.
pub struct TemplateShutdown<K, V, P> {
    name: String,
    template: KafkaTemplate<K, V, P>,
}

impl<K, V, P> TemplateShutdown<K, V, P> {
    pub fn new(name: &str, template: KafkaTemplate<K, V, P>) -> Self {
        Self {
            name: name.to_string(),
            template,
        }
    }
}

#[async_trait::async_trait]
impl<K, V, P> ShutdownComponent for TemplateShutdown<K, V, P>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
    P: Producer<K, V> + 'static,
{
    async fn shutdown(&self) -> Result<()> {
        info!("Flushing Kafka template '{}'...", self.name);
        let template = self.template.clone();
        tokio::task::spawn_blocking(move || template.flush())
            .await
            .map_err(|e| KafkaTemplateError::Producer(format!("flush task failed: {}", e)))??;
        info!("Kafka template '{}' flushed successfully", self.name);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Signal handler for graceful shutdown
pub async fn setup_signal_handlers(coordinator: ShutdownCoordinator) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let signals = (signal(SignalKind::terminate()), signal(SignalKind::interrupt()));
            let (mut sigterm, mut sigint) = match signals {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                (Err(e), _) | (_, Err(e)) => {
                    error!("Failed to set up signal handlers: {}", e);
                    return;
                }
            };

            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, initiating graceful shutdown");
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                return;
            }
            info!("Received Ctrl+C, initiating graceful shutdown");
        }

        coordinator.trigger();
    });
}

/// Utility for running services with graceful shutdown
pub async fn run_with_graceful_shutdown<F, Fut>(
    service_name: &str,
    service_future: F,
    shutdown_coordinator: ShutdownCoordinator,
) -> Result<()>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<()>>,
{
    info!("Starting service '{}'", service_name);

    setup_signal_handlers(shutdown_coordinator.clone()).await;

    let service_result = tokio::select! {
        result = service_future() => {
            info!("Service '{}' completed", service_name);
            result
        }
        _ = shutdown_coordinator.wait_for_shutdown() => {
            info!("Service '{}' received shutdown signal", service_name);
            Ok(())
        }
    };

    if let Err(e) = shutdown_coordinator.shutdown().await {
        error!("Failed to shutdown service '{}': {}", service_name, e);
        return Err(e);
    }

    service_result
}
