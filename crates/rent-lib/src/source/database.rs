//! Database table source

use super::DataSource;
use crate::error::{PipelineError, Result};
use crate::models::{RawTable, RentApartment};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

/// Reads every row of a rental apartments table
pub struct SqlSource {
    conn_str: String,
    table_name: String,
}

impl SqlSource {
    pub fn new(conn_str: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            conn_str: conn_str.into(),
            table_name: table_name.into(),
        }
    }

    fn query(&self) -> String {
        format!(
            "SELECT address, area, constraction_year, rooms, bedrooms, bathrooms, \
             balcony, storage, parking, furnished, garage, garden, energy, facilities, \
             zip, neighborhood, rent FROM \"{}\"",
            self.table_name
        )
    }
}

/// True for names made only of ASCII letters, digits and underscores, not starting with a digit
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[async_trait]
impl DataSource for SqlSource {
    async fn fetch(&self) -> Result<RawTable> {
        if !is_plain_identifier(&self.table_name) {
            return Err(PipelineError::data_unavailable(
                self.describe(),
                format!("{:?} is not a valid table name", self.table_name),
            ));
        }

        info!(table = %self.table_name, "Extracting table from the database");

        let options = SqliteConnectOptions::from_str(&self.conn_str)
            .map_err(|e| PipelineError::data_unavailable(self.describe(), e))?
            .read_only(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| PipelineError::data_unavailable(self.describe(), e))?;

        let sql = self.query();
        let rows: Vec<RentApartment> = sqlx::query_as(&sql)
            .fetch_all(&pool)
            .await
            .map_err(|e| PipelineError::data_unavailable(self.describe(), e))?;
        pool.close().await;

        let mut table = RawTable::new(RentApartment::COLUMNS.iter().map(|c| c.to_string()).collect());
        for row in rows {
            table.push_row(row.into_raw_row())?;
        }

        info!(rows = table.len(), "Extracted table from the database");
        Ok(table)
    }

    fn describe(&self) -> String {
        format!("table:{}", self.table_name)
    }
}
