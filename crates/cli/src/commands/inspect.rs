//! Artifact inspection command

use anyhow::Result;
use colored::Colorize;
use rent_lib::{ArtifactStore, Settings};

use crate::output::{format_bytes, print_fields, print_json, print_model_summary, OutputFormat};

/// Verify the stored artifact and print what it contains
pub fn inspect(settings: &Settings, format: OutputFormat) -> Result<()> {
    let info = ArtifactStore::from_settings(settings).inspect()?;

    match format {
        OutputFormat::Json => print_json(&info)?,
        OutputFormat::Table => {
            println!("{}", "Model Artifact".bold());
            println!("{}", "=".repeat(60));
            print_fields(&[
                ("Path", info.path.display().to_string()),
                ("Size", format_bytes(info.size_bytes)),
                ("SHA-256", info.checksum.clone()),
                ("Schema version", info.summary.schema_version.to_string()),
            ]);
            println!();
            print_model_summary(&info.summary);
        }
    }

    Ok(())
}
