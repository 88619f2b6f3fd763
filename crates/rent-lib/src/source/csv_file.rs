//! CSV file source

use super::{canonical_column_name, DataSource};
use crate::error::{PipelineError, Result};
use crate::models::{RawTable, RawValue};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

/// Reads a comma-delimited file with a header row
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Parse a CSV document from any reader
    fn read_table<R: std::io::Read>(&self, reader: R) -> Result<RawTable> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| PipelineError::data_unavailable(self.describe(), e))?
            .iter()
            .map(canonical_column_name)
            .collect::<Vec<_>>();

        let mut table = RawTable::new(headers);
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(|e| {
                PipelineError::data_unavailable(self.describe(), format!("record {}: {}", line + 1, e))
            })?;
            let row = record.iter().map(RawValue::parse_cell).collect();
            table
                .push_row(row)
                .map_err(|e| PipelineError::data_unavailable(self.describe(), e))?;
        }
        Ok(table)
    }
}

#[async_trait]
impl DataSource for CsvSource {
    async fn fetch(&self) -> Result<RawTable> {
        info!(path = %self.path.display(), "Loading CSV file");

        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| PipelineError::data_unavailable(self.describe(), e))?;
        let table = self.read_table(bytes.as_slice())?;

        info!(
            rows = table.len(),
            columns = table.columns().len(),
            "Loaded CSV file"
        );
        Ok(table)
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}
