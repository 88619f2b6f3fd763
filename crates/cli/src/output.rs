//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use rent_lib::ModelSummary;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2}Mi", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2}Ki", bytes as f64 / KB as f64)
    } else {
        format!("{}B", bytes)
    }
}

/// Format a rent amount
pub fn format_rent(rent: f64) -> String {
    format!("€{:.2}", rent)
}

/// Color an R² score: green when the model explains most of the variance
pub fn color_score(score: f64) -> String {
    if score.is_nan() {
        return "n/a".dimmed().to_string();
    }
    let formatted = format!("{:.3}", score);
    if score >= 0.8 {
        formatted.green().to_string()
    } else if score >= 0.5 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}

/// Color status based on value
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "healthy" | "ready" => status.green().to_string(),
        "degraded" => status.yellow().to_string(),
        "unhealthy" | "not ready" => status.red().to_string(),
        _ => status.to_string(),
    }
}

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct FeatureRow {
    #[tabled(rename = "Feature")]
    name: String,
    #[tabled(rename = "Importance")]
    importance: String,
}

/// Print a two-column table of labelled values
pub fn print_fields(fields: &[(&str, String)]) {
    let rows: Vec<FieldRow> = fields
        .iter()
        .map(|(field, value)| FieldRow {
            field: field.to_string(),
            value: value.clone(),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()).to_string());
}

/// Print a model summary as tables
pub fn print_model_summary(summary: &ModelSummary) {
    let max_depth = summary
        .max_depth
        .map(|d| d.to_string())
        .unwrap_or_else(|| "none".to_string());
    print_fields(&[
        ("n_estimators", summary.n_estimators.to_string()),
        ("max_depth", max_depth),
        ("Holdout R²", color_score(summary.holdout_score)),
        ("CV R²", color_score(summary.cv_score)),
        ("Seed", summary.seed.to_string()),
        ("Rows (train/holdout)", format!("{}/{}", summary.n_train, summary.n_holdout)),
        (
            "Trained at",
            summary.trained_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        ),
    ]);

    if summary.features.is_empty() {
        return;
    }
    let rows: Vec<FeatureRow> = summary
        .features
        .iter()
        .map(|f| FeatureRow {
            name: f.name.clone(),
            importance: format!("{:.1}%", f.importance * 100.0),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()).to_string());
}
