//! Process lifecycle: startup wiring and ordered shutdown.
//!
//! Shutdown runs in a fixed order:
//!
//! 1. the shutdown signal fires and new delete tasks are refused
//! 2. the deletion pipeline drains and performs its final flush
//! 3. the registry is closed
//!
//! The registry is never closed while the pipeline can still write to it.

pub mod shutdown;

pub use shutdown::{ShutdownListener, ShutdownSignal, wait_for_termination};

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::config::Config;
use crate::domain::deletion::{DeletionPipeline, DeletionSender, FlushSummary, PipelineConfig};
use crate::domain::repositories::UrlRegistry;
use crate::infrastructure::persistence::open_registry;

/// Owns the registry and the deletion pipeline for the lifetime of the process.
pub struct LifecycleController {
    signal: ShutdownSignal,
    registry: Arc<dyn UrlRegistry>,
    pipeline: DeletionPipeline,
}

impl LifecycleController {
    /// Starts the deletion pipeline over an already opened registry.
    pub fn start(registry: Arc<dyn UrlRegistry>, config: PipelineConfig) -> Self {
        let signal = ShutdownSignal::new();
        let pipeline = DeletionPipeline::spawn(registry.clone(), config, signal.subscribe());

        Self {
            signal,
            registry,
            pipeline,
        }
    }

    pub fn registry(&self) -> Arc<dyn UrlRegistry> {
        self.registry.clone()
    }

    /// Producer handle for delete tasks.
    pub fn deletions(&self) -> DeletionSender {
        self.pipeline.sender()
    }

    /// Listener for components that need to stop together with the pipeline.
    pub fn shutdown_listener(&self) -> ShutdownListener {
        self.signal.subscribe()
    }

    /// Stops the pipeline, waits for its final flush, then closes the registry.
    ///
    /// The registry is closed even if a pipeline stage panicked.
    ///
    /// # Errors
    ///
    /// Returns the first error among joining the pipeline and closing the registry.
    pub async fn shutdown(self) -> Result<FlushSummary> {
        let Self {
            signal,
            registry,
            pipeline,
        } = self;

        info!("Shutting down");
        signal.trigger();

        let joined = pipeline.join().await;
        if let Err(ref e) = joined {
            error!("Deletion pipeline stopped abnormally: {}", e);
        }

        registry
            .close()
            .await
            .context("Failed to close registry")?;
        let summary = joined.context("Failed to drain deletion pipeline")?;

        info!(
            applied = summary.applied,
            dropped = summary.dropped,
            "Shutdown complete"
        );
        Ok(summary)
    }

    /// Blocks until the process receives Ctrl+C or SIGTERM, then shuts down.
    pub async fn run_until_terminated(self) -> Result<FlushSummary> {
        wait_for_termination().await;
        self.shutdown().await
    }
}

/// Opens the configured registry and starts the lifecycle controller.
///
/// # Errors
///
/// Returns an error if the registry cannot be opened (corrupt log, unreachable database).
pub async fn start(config: &Config) -> Result<LifecycleController> {
    let registry = open_registry(&config.backend(), &config.pg_settings())
        .await
        .context("Failed to open registry")?;

    Ok(LifecycleController::start(
        registry,
        config.pipeline_config(),
    ))
}

/// Runs the service until terminated.
pub async fn run(config: Config) -> Result<()> {
    let controller = start(&config).await?;
    controller.run_until_terminated().await?;
    Ok(())
}
