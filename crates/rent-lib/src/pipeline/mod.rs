//! Feature preparation and model training
//!
//! Everything here is synchronous and CPU bound. Async callers run
//! [`Trainer::train`] on the blocking pool.

pub mod forest;
pub mod preparation;
pub mod search;
pub mod training;
pub mod tree;
pub mod validation;

pub use forest::{ForestParams, RandomForestRegressor};
pub use preparation::{
    parse_garden, prepare, CategoricalEncoding, FeatureSchema, FeatureTable, CATEGORICAL_COLUMNS,
    FEATURE_COLUMNS, GARDEN_COLUMN, TARGET_COLUMN,
};
pub use search::{CandidateScore, GridSearch, ParamGrid, SearchResult};
pub use training::{
    FeatureImportance, ModelSummary, TrainedModel, Trainer, TrainingConfig, TrainingOutcome,
};
pub use validation::{r2_score, train_test_split, Fold, KFold};
