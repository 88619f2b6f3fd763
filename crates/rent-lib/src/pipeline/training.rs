//! Training pipeline: prepare, split, search, refit, evaluate

use super::forest::{ForestParams, RandomForestRegressor};
use super::preparation::{prepare, FeatureSchema, TARGET_COLUMN};
use super::search::{GridSearch, ParamGrid, SearchResult};
use super::validation::{r2_score, train_test_split};
use crate::error::{PipelineError, Result};
use crate::models::{RawRecord, RawTable};
use crate::settings::Settings;
use chrono::{DateTime, Utc};
use ndarray::Axis;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

pub const DEFAULT_TEST_FRACTION: f64 = 0.2;
pub const DEFAULT_CV_FOLDS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    /// Share of rows held out for the final evaluation
    pub test_fraction: f64,
    pub cv_folds: usize,
    pub grid: ParamGrid,
    /// Seed for the split and every forest; drawn from entropy when absent
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: DEFAULT_TEST_FRACTION,
            cv_folds: DEFAULT_CV_FOLDS,
            grid: ParamGrid::default(),
            seed: None,
        }
    }
}

impl TrainingConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            seed: settings.random_seed,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_grid(mut self, grid: ParamGrid) -> Self {
        self.grid = grid;
        self
    }

    fn holdout_size(&self, n_rows: usize) -> usize {
        (((n_rows as f64) * self.test_fraction).ceil() as usize).min(n_rows)
    }

    /// Smallest table that still leaves one training row per fold
    pub fn minimum_rows(&self) -> usize {
        (self.cv_folds..)
            .find(|&n| n - self.holdout_size(n) >= self.cv_folds)
            .unwrap_or(self.cv_folds)
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.test_fraction) {
            return Err(PipelineError::InvalidValue {
                column: "test_fraction".to_string(),
                reason: format!("{} is outside [0, 1)", self.test_fraction),
            });
        }
        Ok(())
    }
}

/// A fitted forest together with everything needed to use and describe it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub schema: FeatureSchema,
    pub forest: RandomForestRegressor,
    pub params: ForestParams,
    /// R² on the holdout rows
    pub holdout_score: f64,
    /// Mean cross-validated R² of the chosen parameters
    pub cv_score: f64,
    pub seed: u64,
    pub trained_at: DateTime<Utc>,
    pub n_train: usize,
    pub n_holdout: usize,
}

impl TrainedModel {
    /// Predict from an already-encoded vector in `schema.feature_columns` order
    pub fn predict(&self, features: &[f64]) -> Result<f64> {
        let expected = self.schema.feature_columns.len();
        if features.len() != expected {
            return Err(PipelineError::FeatureCountMismatch {
                expected,
                actual: features.len(),
            });
        }
        self.forest.predict_one(features)
    }

    /// Encode a raw record with the training-time schema, then predict
    pub fn predict_record(&self, record: &RawRecord) -> Result<f64> {
        let features = self.schema.encode_record(record)?;
        self.predict(&features)
    }

    pub fn summary(&self) -> ModelSummary {
        let importances = self.forest.feature_importances();
        ModelSummary {
            n_estimators: self.params.n_estimators,
            max_depth: self.params.max_depth,
            holdout_score: self.holdout_score,
            cv_score: self.cv_score,
            seed: self.seed,
            trained_at: self.trained_at,
            n_train: self.n_train,
            n_holdout: self.n_holdout,
            schema_version: self.schema.version,
            features: self
                .schema
                .feature_columns
                .iter()
                .enumerate()
                .map(|(i, name)| FeatureImportance {
                    name: name.clone(),
                    importance: importances.get(i).copied().unwrap_or(0.0),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub name: String,
    pub importance: f64,
}

/// Serializable description of a trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub holdout_score: f64,
    pub cv_score: f64,
    pub seed: u64,
    pub trained_at: DateTime<Utc>,
    pub n_train: usize,
    pub n_holdout: usize,
    pub schema_version: u32,
    pub features: Vec<FeatureImportance>,
}

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model: TrainedModel,
    pub search: SearchResult,
}

impl TrainingOutcome {
    /// Holdout R² of the trained model
    pub fn score(&self) -> f64 {
        self.model.holdout_score
    }
}

/// Runs the full training pipeline; CPU bound, call from a blocking context
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn train(&self, raw: &RawTable) -> Result<TrainingOutcome> {
        info!("Starting model building pipeline");
        let started = Instant::now();
        self.config.validate()?;

        let (schema, table) = prepare(raw)?;

        let n_rows = table.nrows();
        let required = self.config.minimum_rows();
        if n_rows < required {
            return Err(PipelineError::InsufficientData {
                rows: n_rows,
                required,
            });
        }
        let x = table.select(&schema.feature_columns)?;
        let y = table.column(TARGET_COLUMN)?;

        let seed = self
            .config
            .seed
            .unwrap_or_else(|| rand::thread_rng().gen());
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        info!(test_fraction = self.config.test_fraction, seed, "Splitting data into train and test sets");
        let (train_idx, test_idx) = train_test_split(n_rows, self.config.test_fraction, &mut rng);
        let x_train = x.select(Axis(0), &train_idx);
        let y_train = y.select(Axis(0), &train_idx);
        let x_test = x.select(Axis(0), &test_idx);
        let y_test = y.select(Axis(0), &test_idx);

        info!(
            candidates = self.config.grid.len(),
            folds = self.config.cv_folds,
            "Starting grid search"
        );
        let search = GridSearch::new(self.config.grid.clone(), self.config.cv_folds)
            .run(&x_train, &y_train, seed)?;
        let params = search.best.params;
        info!(params = %params, cv_r2 = search.best.mean_score, "Grid search finished");

        let mut forest = RandomForestRegressor::new(params, seed);
        forest.fit(&x_train, &y_train)?;

        info!("Evaluating model performance");
        let predicted = forest.predict(&x_test)?;
        let holdout_score = r2_score(y_test.view(), predicted.view());
        info!(
            holdout_r2 = holdout_score,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Model R² on holdout computed"
        );

        let model = TrainedModel {
            schema,
            forest,
            params,
            holdout_score,
            cv_score: search.best.mean_score,
            seed,
            trained_at: Utc::now(),
            n_train: train_idx.len(),
            n_holdout: test_idx.len(),
        };
        Ok(TrainingOutcome { model, search })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawRecord, RawTable, RawValue};
    use crate::testing::{apartment, apartments_table};

    fn quick_config(seed: u64) -> TrainingConfig {
        TrainingConfig::default()
            .with_seed(seed)
            .with_grid(ParamGrid {
                n_estimators: vec![5, 10],
                max_depth: vec![3, 6],
            })
    }

    #[test]
    fn test_minimum_rows() {
        let config = TrainingConfig::default();
        // 7 rows: holdout 2, train 5
        assert_eq!(config.minimum_rows(), 7);
    }

    #[test]
    fn test_train_end_to_end() {
        let outcome = Trainer::new(quick_config(42)).train(&apartments_table(50)).unwrap();
        let model = &outcome.model;

        assert_eq!(model.n_holdout, 10);
        assert_eq!(model.n_train, 40);
        assert_eq!(outcome.search.candidates.len(), 4);
        assert_eq!(model.params, outcome.search.best.params);
        assert!(model.holdout_score.is_finite());
        assert_eq!(outcome.score(), model.holdout_score);
        assert_eq!(model.schema.feature_columns.len(), 9);

        let prediction = model
            .predict(&[85.0, 2015.0, 2.0, 20.0, 1.0, 1.0, 0.0, 0.0, 1.0])
            .unwrap();
        assert!(prediction > 0.0);
    }

    #[test]
    fn test_same_seed_same_model() {
        let table = apartments_table(40);
        let a = Trainer::new(quick_config(7)).train(&table).unwrap().model;
        let b = Trainer::new(quick_config(7)).train(&table).unwrap().model;
        assert_eq!(a.holdout_score, b.holdout_score);
        assert_eq!(a.params, b.params);
        assert_eq!(a.forest, b.forest);
    }

    #[test]
    fn test_seed_is_recorded_when_drawn() {
        let config = TrainingConfig {
            seed: None,
            ..quick_config(0)
        };
        let model = Trainer::new(config).train(&apartments_table(30)).unwrap().model;
        let replay = Trainer::new(quick_config(model.seed))
            .train(&apartments_table(30))
            .unwrap()
            .model;
        assert_eq!(model.forest, replay.forest);
    }

    #[test]
    fn test_too_few_rows() {
        let err = Trainer::new(quick_config(1)).train(&apartments_table(4)).unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientData { rows: 4, required: 7 }));
    }

    #[test]
    fn test_preparation_errors_win_over_row_count() {
        let mut records: Vec<RawRecord> = (0..4).map(apartment).collect();
        records[1].insert("garden".into(), "big".into());
        let table = RawTable::from_records(&records).unwrap();

        let err = Trainer::new(quick_config(1)).train(&table).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedGardenValue { row: 1, .. }));
    }

    #[test]
    fn test_non_finite_cells_are_rejected() {
        let mut records: Vec<RawRecord> = (0..30).map(apartment).collect();
        for (i, record) in records.iter_mut().enumerate() {
            if i % 2 == 0 {
                record.insert("area".into(), RawValue::parse_cell("NaN"));
                record.insert("rent".into(), 9_000_000i64.into());
            }
        }
        let table = RawTable::from_records(&records).unwrap();
        let err = Trainer::new(quick_config(2)).train(&table).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidValue { ref column, .. } if column == "area"));

        let mut records: Vec<RawRecord> = (0..30).map(apartment).collect();
        records[7].insert("area".into(), RawValue::Real(f64::INFINITY));
        let table = RawTable::from_records(&records).unwrap();
        let err = Trainer::new(quick_config(2)).train(&table).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidValue { ref column, .. } if column == "area"));
    }

    #[test]
    fn test_wrong_vector_length() {
        let model = Trainer::new(quick_config(3)).train(&apartments_table(30)).unwrap().model;
        let err = model.predict(&[1.0; 8]).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::FeatureCountMismatch { expected: 9, actual: 8 }
        ));
    }

    #[test]
    fn test_predict_record_uses_schema() {
        let table = apartments_table(30);
        let model = Trainer::new(quick_config(5)).train(&table).unwrap().model;
        let record = table.record(3).unwrap();
        let vector = model.schema.encode_record(&record).unwrap();
        assert_eq!(
            model.predict_record(&record).unwrap(),
            model.predict(&vector).unwrap()
        );
    }

    #[test]
    fn test_summary() {
        let model = Trainer::new(quick_config(9)).train(&apartments_table(30)).unwrap().model;
        let summary = model.summary();
        assert_eq!(summary.features.len(), 9);
        assert_eq!(summary.features[0].name, "area");
        assert_eq!(summary.seed, 9);
        let total: f64 = summary.features.iter().map(|f| f.importance).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }
}
