//! Model lifecycle service
//!
//! Owns the in-memory model. Loading is explicit: [`ModelService::ensure_loaded`]
//! loads the artifact, or trains and persists one when it is missing or
//! corrupt, and only then does [`ModelService::predict`] succeed. Training
//! across processes is serialized by the artifact lock; within a process
//! concurrent `ensure_loaded` callers share one load.

use crate::artifact::ArtifactStore;
use crate::error::{PipelineError, Result};
use crate::models::RawRecord;
use crate::observability::{ServiceMetrics, StructuredLogger};
use crate::pipeline::{TrainedModel, Trainer};
use crate::source::DataSource;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Default wait for another process's training lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(600);

/// How `ensure_loaded` obtained the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    AlreadyLoaded,
    LoadedExisting,
    TrainedAndLoaded,
}

impl LoadOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadOutcome::AlreadyLoaded => "already_loaded",
            LoadOutcome::LoadedExisting => "loaded_existing",
            LoadOutcome::TrainedAndLoaded => "trained_and_loaded",
        }
    }
}

impl fmt::Display for LoadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

enum ModelState {
    Unloaded,
    Loaded(Arc<TrainedModel>),
}

struct TrainingBackend {
    trainer: Trainer,
    source: Arc<dyn DataSource>,
}

pub struct ModelService {
    store: ArtifactStore,
    backend: Option<TrainingBackend>,
    lock_timeout: Duration,
    state: RwLock<ModelState>,
    load_guard: Mutex<()>,
    metrics: Option<ServiceMetrics>,
    logger: StructuredLogger,
}

impl ModelService {
    /// Service that trains from `source` whenever the artifact is unusable
    pub fn new(store: ArtifactStore, trainer: Trainer, source: Arc<dyn DataSource>) -> Self {
        Self::build(store, Some(TrainingBackend { trainer, source }))
    }

    /// Service that only ever loads an existing artifact
    pub fn serve_only(store: ArtifactStore) -> Self {
        Self::build(store, None)
    }

    fn build(store: ArtifactStore, backend: Option<TrainingBackend>) -> Self {
        Self {
            store,
            backend,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            state: RwLock::new(ModelState::Unloaded),
            load_guard: Mutex::new(()),
            metrics: None,
            logger: StructuredLogger::new("rent-predictor"),
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_metrics(mut self, metrics: ServiceMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn can_train(&self) -> bool {
        self.backend.is_some()
    }

    /// The loaded model, if any
    pub async fn model(&self) -> Option<Arc<TrainedModel>> {
        match &*self.state.read().await {
            ModelState::Loaded(model) => Some(Arc::clone(model)),
            ModelState::Unloaded => None,
        }
    }

    pub async fn is_loaded(&self) -> bool {
        matches!(*self.state.read().await, ModelState::Loaded(_))
    }

    /// Make sure a model is in memory, loading or training as needed
    pub async fn ensure_loaded(&self) -> Result<LoadOutcome> {
        if self.is_loaded().await {
            return Ok(LoadOutcome::AlreadyLoaded);
        }
        let _guard = self.load_guard.lock().await;
        if self.is_loaded().await {
            return Ok(LoadOutcome::AlreadyLoaded);
        }

        let backend = match self.load_artifact().await {
            Ok(model) => return Ok(self.install(model, LoadOutcome::LoadedExisting).await),
            Err(e) if e.is_missing_artifact() => match &self.backend {
                Some(backend) => {
                    if matches!(e, PipelineError::ArtifactCorrupt { .. }) {
                        warn!(error = %e, "Model artifact unusable, retraining");
                    } else {
                        info!(path = %self.store.path().display(), "Model artifact not found, training a new model");
                    }
                    backend
                }
                None => return Err(e),
            },
            Err(e) => return Err(e),
        };

        let _lock = self.store.lock(self.lock_timeout).await?;
        // Another process may have finished training while we waited
        match self.load_artifact().await {
            Ok(model) => return Ok(self.install(model, LoadOutcome::LoadedExisting).await),
            Err(e) if e.is_missing_artifact() => debug!(error = %e, "Artifact still unusable after lock"),
            Err(e) => return Err(e),
        }

        let model = self.train_and_save(backend).await?;
        Ok(self.install(model, LoadOutcome::TrainedAndLoaded).await)
    }

    /// Train a fresh model, persist it and swap it in
    pub async fn retrain(&self) -> Result<Arc<TrainedModel>> {
        let backend = self.backend.as_ref().ok_or(PipelineError::TrainingDisabled)?;
        let _guard = self.load_guard.lock().await;
        let _lock = self.store.lock(self.lock_timeout).await?;
        let model = self.train_and_save(backend).await?;
        self.install(model, LoadOutcome::TrainedAndLoaded).await;
        self.model().await.ok_or(PipelineError::ModelNotLoaded)
    }

    /// Predict from a vector already in the model's feature order
    pub async fn predict(&self, features: &[f64]) -> Result<f64> {
        let model = self.model().await.ok_or(PipelineError::ModelNotLoaded)?;
        self.observe(|| model.predict(features))
    }

    /// Encode a raw record with the model's schema, then predict
    pub async fn predict_record(&self, record: &RawRecord) -> Result<f64> {
        let model = self.model().await.ok_or(PipelineError::ModelNotLoaded)?;
        self.observe(|| model.predict_record(record))
    }

    fn observe(&self, predict: impl FnOnce() -> Result<f64>) -> Result<f64> {
        let started = Instant::now();
        let result = predict();
        let elapsed = started.elapsed();
        match &result {
            Ok(prediction) => {
                if let Some(metrics) = &self.metrics {
                    metrics.observe_prediction(elapsed.as_secs_f64());
                }
                self.logger.log_prediction(*prediction, elapsed.as_micros() as u64);
            }
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.inc_prediction_errors();
                }
                debug!(error = %e, "Prediction failed");
            }
        }
        result
    }

    async fn load_artifact(&self) -> Result<TrainedModel> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.load())
            .await
            .map_err(|e| PipelineError::TaskFailed(e.to_string()))?
    }

    async fn train_and_save(&self, backend: &TrainingBackend) -> Result<TrainedModel> {
        let started = Instant::now();
        let result = self.run_training(backend).await;
        let duration = started.elapsed().as_secs_f64();
        if let Some(metrics) = &self.metrics {
            metrics.record_training(result.is_ok(), duration);
        }
        match &result {
            Ok(model) => self.logger.log_training_completed(&model.summary(), duration),
            Err(e) => self.logger.log_training_failed(&e.to_string()),
        }
        result?;
        // Serve the model as persisted, so an unreadable artifact fails here
        self.load_artifact().await
    }

    async fn run_training(&self, backend: &TrainingBackend) -> Result<TrainedModel> {
        info!(source = %backend.source.describe(), "Fetching training data");
        let raw = backend.source.fetch().await?;

        let trainer = backend.trainer.clone();
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || -> Result<TrainedModel> {
            let outcome = trainer.train(&raw)?;
            store.save(&outcome.model)?;
            Ok(outcome.model)
        })
        .await
        .map_err(|e| PipelineError::TaskFailed(e.to_string()))?
    }

    async fn install(&self, model: TrainedModel, outcome: LoadOutcome) -> LoadOutcome {
        let summary = model.summary();
        *self.state.write().await = ModelState::Loaded(Arc::new(model));
        if let Some(metrics) = &self.metrics {
            metrics.set_model(&summary);
        }
        self.logger.log_model_loaded(
            &summary,
            &self.store.path().display().to_string(),
            outcome.as_str(),
        );
        outcome
    }
}
