//! Core data models for the rent predictor

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single raw cell as read from a CSV file or database row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Integer(i64),
    Real(f64),
    Text(String),
}

impl RawValue {
    /// Type a textual cell: integer first, then finite real, else text
    pub fn parse_cell(cell: &str) -> Self {
        let trimmed = cell.trim();
        if let Ok(i) = trimmed.parse::<i64>() {
            RawValue::Integer(i)
        } else if let Some(f) = trimmed.parse::<f64>().ok().filter(|f| f.is_finite()) {
            RawValue::Real(f)
        } else {
            RawValue::Text(cell.to_string())
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Integer(i) => Some(*i as f64),
            RawValue::Real(f) => Some(*f),
            RawValue::Text(_) => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, RawValue::Text(_))
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Integer(i) => write!(f, "{}", i),
            RawValue::Real(r) => write!(f, "{}", r),
            RawValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Integer(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Real(value)
    }
}

/// One raw row keyed by column name
pub type RawRecord = BTreeMap<String, RawValue>;

/// Row-oriented table with a fixed column set shared by every row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<RawValue>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row; its cell count must match the column count
    pub fn push_row(&mut self, row: Vec<RawValue>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(PipelineError::InvalidValue {
                column: format!("row {}", self.rows.len()),
                reason: format!("expected {} cells, got {}", self.columns.len(), row.len()),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Build a table from keyed records, using the first record's keys as columns
    pub fn from_records(records: &[RawRecord]) -> Result<Self> {
        let columns: Vec<String> = records
            .first()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default();
        let mut table = Self::new(columns);
        for record in records {
            let mut row = Vec::with_capacity(table.columns.len());
            for column in &table.columns {
                let value = record
                    .get(column)
                    .cloned()
                    .ok_or_else(|| PipelineError::MissingColumn {
                        column: column.clone(),
                    })?;
                row.push(value);
            }
            if record.len() != table.columns.len() {
                return Err(PipelineError::InvalidValue {
                    column: format!("row {}", table.rows.len()),
                    reason: "record has columns outside the table's column set".to_string(),
                });
            }
            table.rows.push(row);
        }
        Ok(table)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<RawValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Iterate over one column's values
    pub fn column(&self, name: &str) -> Result<impl Iterator<Item = &RawValue> + '_> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| PipelineError::MissingColumn {
                column: name.to_string(),
            })?;
        Ok(self.rows.iter().map(move |row| &row[idx]))
    }

    /// Materialize one row as a keyed record
    pub fn record(&self, row: usize) -> Option<RawRecord> {
        self.rows.get(row).map(|cells| {
            self.columns
                .iter()
                .cloned()
                .zip(cells.iter().cloned())
                .collect()
        })
    }
}

/// Row of the rental apartments table
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RentApartment {
    pub address: String,
    pub area: f64,
    #[sqlx(rename = "constraction_year")]
    pub construction_year: i64,
    pub rooms: i64,
    pub bedrooms: i64,
    pub bathrooms: i64,
    pub balcony: String,
    pub storage: String,
    pub parking: String,
    pub furnished: String,
    pub garage: String,
    pub garden: String,
    pub energy: String,
    pub facilities: String,
    pub zip: String,
    pub neighborhood: String,
    pub rent: i64,
}

impl RentApartment {
    /// Column order used when converting rows into a [`RawTable`]
    pub const COLUMNS: [&'static str; 17] = [
        "address",
        "area",
        "construction_year",
        "rooms",
        "bedrooms",
        "bathrooms",
        "balcony",
        "storage",
        "parking",
        "furnished",
        "garage",
        "garden",
        "energy",
        "facilities",
        "zip",
        "neighborhood",
        "rent",
    ];

    pub fn into_raw_row(self) -> Vec<RawValue> {
        vec![
            RawValue::Text(self.address),
            RawValue::Real(self.area),
            RawValue::Integer(self.construction_year),
            RawValue::Integer(self.rooms),
            RawValue::Integer(self.bedrooms),
            RawValue::Integer(self.bathrooms),
            RawValue::Text(self.balcony),
            RawValue::Text(self.storage),
            RawValue::Text(self.parking),
            RawValue::Text(self.furnished),
            RawValue::Text(self.garage),
            RawValue::Text(self.garden),
            RawValue::Text(self.energy),
            RawValue::Text(self.facilities),
            RawValue::Text(self.zip),
            RawValue::Text(self.neighborhood),
            RawValue::Integer(self.rent),
        ]
    }
}

/// Already-encoded apartment record accepted by the inference API
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ApartmentFeatures {
    pub area: u32,
    #[serde(alias = "constraction_year")]
    pub construction_year: u32,
    pub bedrooms: u32,
    pub garden_area: u32,
    pub balcony_present: u8,
    pub parking_present: u8,
    pub furnished: u8,
    pub garage_present: u8,
    pub storage_present: u8,
}

impl ApartmentFeatures {
    /// Check the indicator fields hold 0 or 1
    pub fn validate(&self) -> std::result::Result<(), String> {
        let flags = [
            ("balcony_present", self.balcony_present),
            ("parking_present", self.parking_present),
            ("furnished", self.furnished),
            ("garage_present", self.garage_present),
            ("storage_present", self.storage_present),
        ];
        for (name, value) in flags {
            if value > 1 {
                return Err(format!("{} must be 0 or 1, got {}", name, value));
            }
        }
        Ok(())
    }

    /// Ordered vector matching the training feature columns
    pub fn to_vector(&self) -> Vec<f64> {
        vec![
            self.area as f64,
            self.construction_year as f64,
            self.bedrooms as f64,
            self.garden_area as f64,
            self.balcony_present as f64,
            self.parking_present as f64,
            self.furnished as f64,
            self.garage_present as f64,
            self.storage_present as f64,
        ]
    }
}

/// Prediction payload returned by the inference API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction: Vec<f64>,
}
