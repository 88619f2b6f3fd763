//! Local training command

use anyhow::Result;
use colored::Colorize;
use rent_lib::{LoadOutcome, Settings};
use serde_json::json;

use super::local_service;
use crate::output::{print_info, print_json, print_model_summary, print_success, OutputFormat};

/// Make sure a model exists, or retrain it with `force`
pub async fn train(settings: &Settings, force: bool, seed: Option<u64>, format: OutputFormat) -> Result<()> {
    let service = local_service(settings, seed)?;

    let outcome = if force {
        service.retrain().await?;
        LoadOutcome::TrainedAndLoaded
    } else {
        service.ensure_loaded().await?
    };
    let model = match service.model().await {
        Some(model) => model,
        None => anyhow::bail!("model was not loaded after training"),
    };
    let summary = model.summary();

    match format {
        OutputFormat::Json => print_json(&json!({
            "outcome": outcome.as_str(),
            "path": service.store().path(),
            "model": summary,
        }))?,
        OutputFormat::Table => {
            match outcome {
                LoadOutcome::TrainedAndLoaded => print_success(&format!(
                    "Trained a new model at {}",
                    service.store().path().display().to_string().cyan()
                )),
                _ => print_info(&format!(
                    "Model already present at {} (use --force to retrain)",
                    service.store().path().display().to_string().cyan()
                )),
            }
            println!();
            print_model_summary(&summary);
        }
    }

    Ok(())
}
