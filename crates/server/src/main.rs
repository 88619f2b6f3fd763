//! Rent predictor server
//!
//! Loads (or trains) the rent model and serves predictions over HTTP.

use anyhow::{Context, Result};
use rent_lib::{
    artifact::ArtifactStore,
    create_source, init_tracing,
    lifecycle::ModelService,
    observability::{ServiceMetrics, StructuredLogger},
    HealthRegistry, Settings, Trainer, TrainingConfig,
};
use rent_server::{api, ServerConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load().context("Failed to load settings")?;
    init_tracing(&settings);

    info!("Starting rent-server");

    let config = ServerConfig::load()?;
    info!(
        bind_addr = %config.bind_addr(),
        auto_train = config.auto_train,
        model_file = %settings.model_file().display(),
        "Server configured"
    );

    let health_registry = HealthRegistry::new();
    let metrics = ServiceMetrics::new().context("Failed to create metrics registry")?;
    let logger = StructuredLogger::new("rent-server");

    let store = ArtifactStore::from_settings(&settings);
    let service = if config.auto_train {
        let source = create_source(&settings.source()?);
        ModelService::new(store, Trainer::new(TrainingConfig::from_settings(&settings)), source)
    } else {
        ModelService::serve_only(store)
    };
    let service = service
        .with_lock_timeout(Duration::from_secs(settings.lock_timeout_secs))
        .with_metrics(metrics.clone())
        .with_logger(logger.clone());

    let app_state = Arc::new(api::AppState::new(
        Arc::new(service),
        health_registry,
        metrics,
    ));

    // Probes answer while the model loads; readiness flips once it is in memory
    let loader = tokio::spawn({
        let state = Arc::clone(&app_state);
        async move {
            if let Err(e) = state.load_model().await {
                error!(error = %e, "Starting without a model");
            }
        }
    });

    logger.log_startup(SERVER_VERSION, &config.bind_addr());

    let shutdown_logger = logger.clone();
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
        shutdown_logger.log_shutdown("SIGINT received");
    };

    api::serve(&config.bind_addr(), app_state, shutdown).await?;
    loader.abort();
    info!("Shut down");

    Ok(())
}
