//! Raw data sources
//!
//! Fetches apartment rows from a CSV file or a database table into a
//! [`RawTable`]. Both backends produce the same column set so the
//! preparation stage does not care where rows came from.

mod csv_file;
mod database;


pub use csv_file::CsvSource;
pub use database::{is_plain_identifier, SqlSource};

use crate::error::Result;
use crate::models::RawTable;
use crate::settings::SourceConfig;
use std::sync::Arc;

pub use async_trait::async_trait;

/// Trait for raw table sources
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Read every row of the source
    async fn fetch(&self) -> Result<RawTable>;

    /// Human-readable location, used in logs and errors
    fn describe(&self) -> String;
}

/// Create the configured data source
pub fn create_source(config: &SourceConfig) -> Arc<dyn DataSource> {
    match config {
        SourceConfig::Csv { path } => {
            tracing::info!(path = %path.display(), "Using CSV data source");
            Arc::new(CsvSource::new(path))
        }
        SourceConfig::Database {
            conn_str,
            table_name,
        } => {
            tracing::info!(table = %table_name, "Using database data source");
            Arc::new(SqlSource::new(conn_str, table_name))
        }
    }
}

/// Map legacy column spellings onto the names used throughout the pipeline
pub(crate) fn canonical_column_name(name: &str) -> String {
    match name.trim() {
        "constraction_year" => "construction_year".to_string(),
        other => other.to_string(),
    }
}
