//! Subcommand implementations

pub mod inspect;
pub mod predict;
pub mod remote;
pub mod train;

use anyhow::{Context, Result};
use rent_lib::{
    create_source, init_tracing, ArtifactStore, LogFormat, ModelService, Settings, Trainer,
    TrainingConfig,
};
use std::time::Duration;

/// Load library settings for commands that work on the local artifact
pub fn load_settings(verbose: bool) -> Result<Settings> {
    let mut settings = Settings::load().context("Failed to load settings (RENT_* variables)")?;
    // Keep the terminal for command output unless asked otherwise
    settings.log_level = if verbose { "debug" } else { "warn" }.to_string();
    settings.log_format = LogFormat::Pretty;
    init_tracing(&settings);
    Ok(settings)
}

/// Lifecycle service able to train from the configured source
pub fn local_service(settings: &Settings, seed: Option<u64>) -> Result<ModelService> {
    let mut config = TrainingConfig::from_settings(settings);
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }
    let source = create_source(&settings.source()?);
    Ok(ModelService::new(
        ArtifactStore::from_settings(settings),
        Trainer::new(config),
        source,
    )
    .with_lock_timeout(Duration::from_secs(settings.lock_timeout_secs)))
}
