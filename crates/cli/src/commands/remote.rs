//! Commands against a running rent-server

use anyhow::Result;
use colored::Colorize;
use rent_lib::ApartmentFeatures;

use crate::client::ApiClient;
use crate::output::{
    color_status, format_rent, print_fields, print_json, print_model_summary, print_success,
    print_warning, OutputFormat,
};

/// Ask the server for a prediction
pub async fn query(client: &ApiClient, apartment: &ApartmentFeatures, format: OutputFormat) -> Result<()> {
    if let Err(reason) = apartment.validate() {
        anyhow::bail!("Invalid apartment: {}", reason);
    }
    let response = client.predict(apartment).await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => match response.prediction.first() {
            Some(rent) => print_success(&format!("Predicted monthly rent: {}", format_rent(*rent))),
            None => print_warning("Server returned no prediction"),
        },
    }

    Ok(())
}

/// Show server health and the loaded model
pub async fn status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health = client.health().await?;
    let model = client.model().await;

    match format {
        OutputFormat::Json => {
            let model = model.ok();
            print_json(&serde_json::json!({
                "health": health,
                "model": model,
            }))?;
        }
        OutputFormat::Table => {
            println!("{}", "Server Status".bold());
            println!("{}", "=".repeat(60));
            println!("Overall: {}", color_status(health.status.as_str()));

            let fields: Vec<(&str, String)> = health
                .components
                .iter()
                .map(|(name, component)| {
                    let status = color_status(component.status.as_str());
                    let value = match &component.message {
                        Some(message) => format!("{} ({})", status, message),
                        None => status,
                    };
                    (name.as_str(), value)
                })
                .collect();
            print_fields(&fields);
            println!();

            match model {
                Ok(summary) => print_model_summary(&summary),
                Err(e) => print_warning(&format!("No model loaded: {}", e)),
            }
        }
    }

    Ok(())
}
