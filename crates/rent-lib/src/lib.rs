//! Rent prediction library
//!
//! This crate provides the core functionality for:
//! - Reading raw apartment rows from a CSV file or a SQL table
//! - Feature preparation and random forest training with grid search
//! - Checksummed model artifacts and the load-or-train lifecycle
//! - Health checks and observability

pub mod artifact;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod settings;
pub mod source;

#[cfg(test)]
pub(crate) mod testing;

pub use artifact::{ArtifactInfo, ArtifactLock, ArtifactStore};
pub use error::{PipelineError, Result};
pub use health::{
    Component, ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use lifecycle::{LoadOutcome, ModelService};
pub use models::*;
pub use observability::{init_tracing, ServiceMetrics, StructuredLogger};
pub use pipeline::{ModelSummary, TrainedModel, Trainer, TrainingConfig};
pub use settings::{LogFormat, Settings, SettingsError, SourceConfig};
pub use source::{create_source, DataSource};
