//! Feature preparation
//!
//! Turns a raw apartment table into a strictly numeric feature table:
//! categorical columns become indicator columns (dropping one reference
//! category each) and the free-text garden column becomes an integer.
//! The categories seen at training time are captured in a [`FeatureSchema`]
//! that travels with the model so inference encodes records identically.

use crate::error::{PipelineError, Result};
use crate::models::{RawRecord, RawTable, RawValue};
use ndarray::{Array1, Array2, Axis};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Columns expanded into indicator columns
pub const CATEGORICAL_COLUMNS: [&str; 5] = ["balcony", "parking", "furnished", "garage", "storage"];

/// Free-text column parsed into an integer area
pub const GARDEN_COLUMN: &str = "garden";

/// Garden value meaning "no garden"
pub const GARDEN_ABSENT: &str = "Not present";

/// Regression target
pub const TARGET_COLUMN: &str = "rent";

/// Model inputs, in the order prediction vectors must follow
pub const FEATURE_COLUMNS: [&str; 9] = [
    "area",
    "construction_year",
    "bedrooms",
    "garden",
    "balcony_yes",
    "parking_yes",
    "furnished_yes",
    "garage_yes",
    "storage_yes",
];

/// Bumped whenever the encoding rules change
pub const SCHEMA_VERSION: u32 = 1;

fn garden_digits() -> &'static Regex {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    DIGITS.get_or_init(|| Regex::new(r"[0-9]+").expect("static regex"))
}

/// Parse a garden description: the sentinel maps to 0, otherwise the first run of digits
pub fn parse_garden(value: &str) -> Option<i64> {
    if value == GARDEN_ABSENT {
        return Some(0);
    }
    garden_digits()
        .find(value)
        .and_then(|m| m.as_str().parse::<i64>().ok())
}

fn garden_cell(row: usize, value: &RawValue) -> Result<f64> {
    match value {
        RawValue::Text(text) => parse_garden(text)
            .map(|v| v as f64)
            .ok_or_else(|| PipelineError::MalformedGardenValue {
                row,
                value: text.clone(),
            }),
        numeric => numeric_cell(GARDEN_COLUMN, row, numeric),
    }
}

/// Value of a numeric cell; text and non-finite numbers are rejected
fn numeric_cell(column: &str, row: usize, value: &RawValue) -> Result<f64> {
    match value.as_f64() {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(PipelineError::InvalidValue {
            column: column.to_string(),
            reason: format!("row {}: {:?} is not a finite number", row, value.to_string()),
        }),
    }
}

fn category_label(value: &RawValue) -> String {
    match value {
        RawValue::Text(text) => text.trim().to_string(),
        other => other.to_string(),
    }
}

/// Indicator encoding of one categorical column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalEncoding {
    pub column: String,
    /// Category represented by all indicators being zero
    pub reference: String,
    /// Remaining categories, one indicator column each, sorted
    pub categories: Vec<String>,
}

impl CategoricalEncoding {
    fn fit<'a>(column: &str, values: impl Iterator<Item = &'a RawValue>) -> Self {
        let observed: BTreeSet<String> = values.map(category_label).collect();
        let mut observed = observed.into_iter();
        let reference = observed.next().unwrap_or_default();
        Self {
            column: column.to_string(),
            reference,
            categories: observed.collect(),
        }
    }

    pub fn indicator_columns(&self) -> Vec<String> {
        self.categories
            .iter()
            .map(|c| format!("{}_{}", self.column, c))
            .collect()
    }

    fn is_known(&self, label: &str) -> bool {
        label == self.reference || self.categories.iter().any(|c| c == label)
    }

    /// Indicator values for one raw value; unseen categories encode as the reference
    fn encode(&self, value: &RawValue) -> Vec<f64> {
        let label = category_label(value);
        self.categories
            .iter()
            .map(|c| if *c == label { 1.0 } else { 0.0 })
            .collect()
    }
}

/// Encoding rules captured from the training table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: u32,
    /// Numeric columns carried through unchanged, in raw column order
    pub numeric_columns: Vec<String>,
    pub categorical: Vec<CategoricalEncoding>,
    /// Model inputs in prediction-vector order
    pub feature_columns: Vec<String>,
}

impl FeatureSchema {
    /// Discover numeric columns and categories from a training table
    pub fn fit(raw: &RawTable) -> Result<Self> {
        let mut categorical = Vec::with_capacity(CATEGORICAL_COLUMNS.len());
        for column in CATEGORICAL_COLUMNS {
            categorical.push(CategoricalEncoding::fit(column, raw.column(column)?));
        }
        if raw.column_index(GARDEN_COLUMN).is_none() {
            return Err(PipelineError::MissingColumn {
                column: GARDEN_COLUMN.to_string(),
            });
        }

        let mut numeric_columns = Vec::new();
        let mut dropped = Vec::new();
        for (idx, column) in raw.columns().iter().enumerate() {
            if column == GARDEN_COLUMN || CATEGORICAL_COLUMNS.contains(&column.as_str()) {
                continue;
            }
            // Model inputs stay numeric so bad cells surface as errors, not dropped columns
            let required = column == TARGET_COLUMN || FEATURE_COLUMNS.contains(&column.as_str());
            if required || raw.rows().iter().all(|row| row[idx].is_numeric()) {
                numeric_columns.push(column.clone());
            } else {
                dropped.push(column.as_str());
            }
        }
        if !dropped.is_empty() {
            debug!(columns = ?dropped, "Dropping non-numeric descriptive columns");
        }

        Ok(Self {
            version: SCHEMA_VERSION,
            numeric_columns,
            categorical,
            feature_columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        })
    }

    /// Columns of the feature table this schema produces
    pub fn output_columns(&self) -> Vec<String> {
        let mut columns = self.numeric_columns.clone();
        columns.push(GARDEN_COLUMN.to_string());
        for encoding in &self.categorical {
            columns.extend(encoding.indicator_columns());
        }
        columns
    }

    /// Apply the schema to a raw table
    pub fn transform(&self, raw: &RawTable) -> Result<FeatureTable> {
        info!(columns = ?CATEGORICAL_COLUMNS, "Encoding categorical columns");

        let numeric_idx = self
            .numeric_columns
            .iter()
            .map(|c| index_of(raw, c))
            .collect::<Result<Vec<_>>>()?;
        let garden_idx = index_of(raw, GARDEN_COLUMN)?;
        let categorical_idx = self
            .categorical
            .iter()
            .map(|e| index_of(raw, &e.column))
            .collect::<Result<Vec<_>>>()?;

        let columns = self.output_columns();
        let mut data = Vec::with_capacity(raw.len() * columns.len());
        let mut warned: HashSet<(usize, String)> = HashSet::new();

        info!("Parsing garden column");
        for (row_idx, row) in raw.rows().iter().enumerate() {
            for (column, &idx) in self.numeric_columns.iter().zip(&numeric_idx) {
                data.push(numeric_cell(column, row_idx, &row[idx])?);
            }
            data.push(garden_cell(row_idx, &row[garden_idx])?);
            for (enc_idx, (encoding, &idx)) in self.categorical.iter().zip(&categorical_idx).enumerate() {
                let label = category_label(&row[idx]);
                if !encoding.is_known(&label) && warned.insert((enc_idx, label.clone())) {
                    warn!(
                        column = %encoding.column,
                        category = %label,
                        reference = %encoding.reference,
                        "Unseen category encoded as reference category"
                    );
                }
                data.extend(encoding.encode(&row[idx]));
            }
        }

        let data = Array2::from_shape_vec((raw.len(), columns.len()), data).map_err(|e| {
            PipelineError::InvalidValue {
                column: "*".to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(FeatureTable { columns, data })
    }

    /// Encode one raw record into the model's input vector
    pub fn encode_record(&self, record: &RawRecord) -> Result<Vec<f64>> {
        let mut vector = Vec::with_capacity(self.feature_columns.len());
        for column in &self.feature_columns {
            if column == GARDEN_COLUMN {
                vector.push(garden_cell(0, field(record, column)?)?);
                continue;
            }
            if let Some((encoding, category)) = self.indicator(column) {
                let value = field(record, &encoding.column)?;
                let label = category_label(value);
                if !encoding.is_known(&label) {
                    warn!(
                        column = %encoding.column,
                        category = %label,
                        reference = %encoding.reference,
                        "Unseen category encoded as reference category"
                    );
                }
                vector.push(if label == category { 1.0 } else { 0.0 });
                continue;
            }
            vector.push(numeric_cell(column, 0, field(record, column)?)?);
        }
        Ok(vector)
    }

    fn indicator(&self, column: &str) -> Option<(&CategoricalEncoding, &str)> {
        self.categorical.iter().find_map(|encoding| {
            encoding
                .categories
                .iter()
                .find(|c| format!("{}_{}", encoding.column, c) == column)
                .map(|c| (encoding, c.as_str()))
        })
    }
}

fn index_of(raw: &RawTable, column: &str) -> Result<usize> {
    raw.column_index(column)
        .ok_or_else(|| PipelineError::MissingColumn {
            column: column.to_string(),
        })
}

fn field<'a>(record: &'a RawRecord, column: &str) -> Result<&'a RawValue> {
    record.get(column).ok_or_else(|| PipelineError::MissingColumn {
        column: column.to_string(),
    })
}

/// Numeric table produced by feature preparation
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    columns: Vec<String>,
    data: Array2<f64>,
}

impl FeatureTable {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    fn index_of(&self, column: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| PipelineError::MissingColumn {
                column: column.to_string(),
            })
    }

    /// Feature matrix with the given columns, in the given order
    pub fn select(&self, columns: &[String]) -> Result<Array2<f64>> {
        let idx = columns
            .iter()
            .map(|c| self.index_of(c))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.data.select(Axis(1), &idx))
    }

    pub fn column(&self, column: &str) -> Result<Array1<f64>> {
        let idx = self.index_of(column)?;
        Ok(self.data.column(idx).to_owned())
    }
}

/// Fit a schema on the raw table and encode it
pub fn prepare(raw: &RawTable) -> Result<(FeatureSchema, FeatureTable)> {
    info!(rows = raw.len(), "Starting preprocessing pipeline");
    let schema = FeatureSchema::fit(raw)?;
    let table = schema.transform(raw)?;
    Ok((schema, table))
}
