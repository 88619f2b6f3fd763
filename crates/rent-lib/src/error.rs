//! Error taxonomy for the rent prediction pipeline
//!
//! Lower layers never swallow these; they propagate up to the lifecycle
//! service, which is the only place a missing or corrupt artifact is turned
//! into a retraining run.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the data, training, persistence and lifecycle layers
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The configured file or table could not be read
    #[error("data source {source_name} unavailable: {reason}")]
    DataUnavailable { source_name: String, reason: String },

    /// A garden value is neither the "Not present" sentinel nor contains a number
    #[error("malformed garden value {value:?} in row {row}")]
    MalformedGardenValue { row: usize, value: String },

    /// Too few rows for the configured cross-validation
    #[error("insufficient data: {rows} rows, at least {required} required")]
    InsufficientData { rows: usize, required: usize },

    #[error("model artifact not found at {}", path.display())]
    ArtifactNotFound { path: PathBuf },

    #[error("model artifact at {} is corrupt: {reason}", path.display())]
    ArtifactCorrupt { path: PathBuf, reason: String },

    /// `predict` was called before `ensure_loaded`
    #[error("model not loaded")]
    ModelNotLoaded,

    #[error("required column {column:?} is missing")]
    MissingColumn { column: String },

    #[error("expected {expected} features, got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    #[error("invalid value in column {column:?}: {reason}")]
    InvalidValue { column: String, reason: String },

    /// Another process held the training lock for too long
    #[error("timed out after {waited_secs}s waiting for lock {}", path.display())]
    LockTimeout { path: PathBuf, waited_secs: u64 },

    /// Retraining was requested from a service built without a data source
    #[error("training is not configured for this service")]
    TrainingDisabled,

    #[error("background task failed: {0}")]
    TaskFailed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn data_unavailable(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::DataUnavailable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    /// Failures where trying the same operation again may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::DataUnavailable { .. }
                | PipelineError::LockTimeout { .. }
                | PipelineError::Io(_)
        )
    }

    /// Failures the lifecycle service answers with a training run
    pub fn is_missing_artifact(&self) -> bool {
        matches!(
            self,
            PipelineError::ArtifactNotFound { .. } | PipelineError::ArtifactCorrupt { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(PipelineError::data_unavailable("rent.csv", "missing").is_retryable());
        assert!(!PipelineError::ModelNotLoaded.is_retryable());
        assert!(!PipelineError::MalformedGardenValue {
            row: 3,
            value: "big".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_missing_artifact_classification() {
        let path = PathBuf::from("/tmp/model.bin");
        assert!(PipelineError::ArtifactNotFound { path: path.clone() }.is_missing_artifact());
        assert!(PipelineError::ArtifactCorrupt {
            path,
            reason: "bad magic".into()
        }
        .is_missing_artifact());
        assert!(!PipelineError::ModelNotLoaded.is_missing_artifact());
    }

    #[test]
    fn test_display_messages() {
        let err = PipelineError::InsufficientData { rows: 3, required: 5 };
        assert_eq!(err.to_string(), "insufficient data: 3 rows, at least 5 required");
        assert_eq!(PipelineError::ModelNotLoaded.to_string(), "model not loaded");
    }
}
